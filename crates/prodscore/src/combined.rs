//! Roll-up of every audit result file in a report directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use prodscore_core::{percent, AspectCounter, StatusCounts};
use prodscore_criteria::{AuditAspect, AuditAspectResult, AuditStatus};

use crate::table::Table;

pub const AUDIT_RESULT_SUFFIX: &str = "_audit_result.csv";
const TOP_REASONS: usize = 10;
const REASON_WIDTH: usize = 150;
const ATTENTION: [AuditStatus; 2] = [AuditStatus::NeedsReview, AuditStatus::NeedsManualCheck];

/// One loaded audit result file
pub struct Source {
    /// File name without the audit result suffix
    pub name: String,
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AspectRates {
    pub aspect: AuditAspect,
    pub counts: StatusCounts,
    pub pass_percent: f64,
    pub review_percent: f64,
    pub manual_percent: f64,
}

/// How often a reason was given for one aspect and status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasonCount {
    pub aspect: AuditAspect,
    pub status: AuditStatus,
    pub reason: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileStats {
    pub source: String,
    pub products: usize,
    /// PASS rate per aspect, in summary aspect order
    pub pass_percent: Vec<(AuditAspect, f64)>,
}

/// A product with at least one aspect needing attention
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemItem {
    pub source: String,
    pub id: String,
    pub url: String,
    pub title: String,
    pub aspects: Vec<AuditAspectResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedSummary {
    pub sources: Vec<String>,
    pub total_products: usize,
    pub aspects: Vec<AspectRates>,
    pub issues: Vec<ReasonCount>,
    pub files: Vec<FileStats>,
    pub problems: Vec<ProblemItem>,
}

/// Status columns of an audit table: aspect, status index, reason index
fn audit_columns(table: &Table) -> Vec<(AuditAspect, usize, Option<usize>)> {
    table
        .headers
        .iter()
        .enumerate()
        .filter_map(|(i, header)| {
            let aspect = header.strip_suffix("_status")?.parse::<AuditAspect>().ok()?;
            let reason = table.column_index(&format!("{}_reason", aspect.as_str()));
            Some((aspect, i, reason))
        })
        .collect()
}

fn cell(table: &Table, record: &[String], name: &str) -> String {
    table
        .column_index(name)
        .map(|i| record[i].clone())
        .unwrap_or_default()
}

fn truncate_reason(reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        return "N/A".to_string();
    }
    reason.chars().take(REASON_WIDTH).collect()
}

#[derive(Default)]
struct ReasonCounter {
    entries: Vec<(AuditAspect, AuditStatus, String, usize)>,
    index: HashMap<(AuditAspect, AuditStatus, String), usize>,
}

impl ReasonCounter {
    fn add(&mut self, aspect: AuditAspect, status: AuditStatus, reason: String) {
        let key = (aspect, status, reason);
        match self.index.get(&key) {
            Some(&i) => self.entries[i].3 += 1,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key.0, key.1, key.2, 1));
            }
        }
    }

    /// Most frequent reasons first; ties keep first-seen order
    fn top(&self, aspect: AuditAspect, status: AuditStatus, total: usize) -> Vec<ReasonCount> {
        let mut matching: Vec<&(AuditAspect, AuditStatus, String, usize)> = self
            .entries
            .iter()
            .filter(|(a, s, _, _)| *a == aspect && *s == status)
            .collect();
        matching.sort_by(|a, b| b.3.cmp(&a.3));
        matching
            .into_iter()
            .take(TOP_REASONS)
            .map(|(aspect, status, reason, count)| ReasonCount {
                aspect: *aspect,
                status: *status,
                reason: reason.clone(),
                count: *count,
                percent: percent(*count, total),
            })
            .collect()
    }
}

pub fn summarize(sources: &[Source]) -> CombinedSummary {
    let total_products: usize = sources.iter().map(|s| s.table.len()).sum();
    let mut overall = AspectCounter::new();
    let mut reasons = ReasonCounter::default();
    let mut per_file: Vec<(String, usize, AspectCounter)> = Vec::new();
    let mut problems = Vec::new();

    for source in sources {
        let columns = audit_columns(&source.table);
        let mut file_counts = AspectCounter::new();
        for (aspect, _, _) in &columns {
            overall.entry(*aspect);
            file_counts.entry(*aspect);
        }

        for record in &source.table.records {
            let mut row_aspects = Vec::new();
            for (aspect, status_col, reason_col) in &columns {
                let Some(status) = AuditStatus::parse(&record[*status_col]) else {
                    continue;
                };
                let reason = reason_col.map(|i| record[i].clone()).unwrap_or_default();
                overall.add(*aspect, status);
                file_counts.add(*aspect, status);
                if ATTENTION.contains(&status) {
                    reasons.add(*aspect, status, truncate_reason(&reason));
                }
                row_aspects.push(AuditAspectResult::new(*aspect, status, reason));
            }

            if row_aspects.iter().any(|a| ATTENTION.contains(&a.status)) {
                problems.push(ProblemItem {
                    source: source.name.clone(),
                    id: cell(&source.table, record, "id"),
                    url: cell(&source.table, record, "url"),
                    title: cell(&source.table, record, "title"),
                    aspects: row_aspects,
                });
            }
        }
        per_file.push((source.name.clone(), source.table.len(), file_counts));
    }

    let aspect_order: Vec<AuditAspect> = overall.aspects().collect();

    let aspects = aspect_order
        .iter()
        .map(|&aspect| {
            let counts = overall.counts_for(aspect);
            AspectRates {
                aspect,
                counts,
                pass_percent: percent(counts.pass, total_products),
                review_percent: percent(counts.needs_review, total_products),
                manual_percent: percent(counts.needs_manual_check, total_products),
            }
        })
        .collect();

    let issues = aspect_order
        .iter()
        .flat_map(|&aspect| ATTENTION.into_iter().map(move |status| (aspect, status)))
        .flat_map(|(aspect, status)| reasons.top(aspect, status, total_products))
        .collect();

    let files = per_file
        .into_iter()
        .map(|(source, products, counts)| FileStats {
            pass_percent: aspect_order
                .iter()
                .map(|&aspect| (aspect, percent(counts.counts_for(aspect).pass, products)))
                .collect(),
            source,
            products,
        })
        .collect();

    CombinedSummary {
        sources: sources.iter().map(|s| s.name.clone()).collect(),
        total_products,
        aspects,
        issues,
        files,
        problems,
    }
}

/// Every `*_audit_result.csv` in `dir`, sorted by name
pub fn find_audit_results(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(AUDIT_RESULT_SUFFIX))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Load each file, skipping (and reporting) the ones that cannot be read
pub fn load_sources(paths: &[PathBuf]) -> Vec<Source> {
    paths
        .iter()
        .filter_map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().trim_end_matches(AUDIT_RESULT_SUFFIX).to_string())
                .unwrap_or_default();
            match Table::read(path) {
                Ok(table) => Some(Source { name, table }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable audit result");
                    None
                }
            }
        })
        .collect()
}

/// `<dir>/combined_summary_<YYYYmmdd_HHMMSS>`, the prefix of every report file
pub fn default_prefix(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("combined_summary_{}", now.format("%Y%m%d_%H%M%S")))
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "combined_summary".to_string());
    name.push_str(suffix);
    prefix.with_file_name(name)
}

fn rate(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Write the aspect, file, issue and problem reports. Returns their paths.
pub fn write_reports(prefix: &Path, summary: &CombinedSummary) -> Result<Vec<PathBuf>> {
    let aspects = Table {
        headers: [
            "aspect",
            "total",
            "pass",
            "pass_rate",
            "needs_review",
            "review_rate",
            "needs_manual_check",
            "manual_rate",
        ]
        .map(String::from)
        .to_vec(),
        records: summary
            .aspects
            .iter()
            .map(|a| {
                vec![
                    a.aspect.as_str().to_string(),
                    summary.total_products.to_string(),
                    a.counts.pass.to_string(),
                    rate(a.pass_percent),
                    a.counts.needs_review.to_string(),
                    rate(a.review_percent),
                    a.counts.needs_manual_check.to_string(),
                    rate(a.manual_percent),
                ]
            })
            .collect(),
    };

    let mut file_headers = vec!["source_file".to_string(), "products".to_string()];
    file_headers.extend(
        summary
            .aspects
            .iter()
            .map(|a| format!("{}_pass_rate", a.aspect.as_str())),
    );
    let files = Table {
        headers: file_headers,
        records: summary
            .files
            .iter()
            .map(|f| {
                let mut record = vec![f.source.clone(), f.products.to_string()];
                record.extend(f.pass_percent.iter().map(|(_, p)| rate(*p)));
                record
            })
            .collect(),
    };

    let issues = Table {
        headers: ["aspect", "status", "reason", "count", "percent"]
            .map(String::from)
            .to_vec(),
        records: summary
            .issues
            .iter()
            .map(|i| {
                vec![
                    i.aspect.as_str().to_string(),
                    i.status.to_string(),
                    i.reason.clone(),
                    i.count.to_string(),
                    rate(i.percent),
                ]
            })
            .collect(),
    };

    let mut problem_headers: Vec<String> = ["source_file", "id", "url", "title"].map(String::from).to_vec();
    for rates in &summary.aspects {
        problem_headers.push(format!("{}_status", rates.aspect.as_str()));
        problem_headers.push(format!("{}_reason", rates.aspect.as_str()));
    }
    let problems = Table {
        headers: problem_headers,
        records: summary
            .problems
            .iter()
            .map(|p| {
                let mut record = vec![p.source.clone(), p.id.clone(), p.url.clone(), p.title.clone()];
                for rates in &summary.aspects {
                    match p.aspects.iter().find(|a| a.aspect == rates.aspect) {
                        Some(a) => record.extend([a.status.to_string(), a.reason.clone()]),
                        None => record.extend([String::new(), String::new()]),
                    }
                }
                record
            })
            .collect(),
    };

    let mut written = Vec::new();
    for (suffix, table) in [
        ("_aspects.csv", aspects),
        ("_files.csv", files),
        ("_issues.csv", issues),
        ("_problems.csv", problems),
    ] {
        let path = with_suffix(prefix, suffix);
        table.write(&path)?;
        written.push(path);
    }
    Ok(written)
}

pub fn handle_summary_command(dir: &Path, output: Option<PathBuf>, json: bool) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Report directory not found: {}", dir.display());
    }
    let paths = find_audit_results(dir)?;
    if paths.is_empty() {
        anyhow::bail!("No *{} files found in {}", AUDIT_RESULT_SUFFIX, dir.display());
    }

    let sources = load_sources(&paths);
    if sources.is_empty() {
        anyhow::bail!("None of the audit result files in {} could be read", dir.display());
    }

    let summary = summarize(&sources);
    let prefix = output.unwrap_or_else(|| default_prefix(dir, Local::now()));
    let written = write_reports(&prefix, &summary)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &written);
    }
    Ok(())
}

fn print_summary(summary: &CombinedSummary, written: &[PathBuf]) {
    println!("{}", "=== Combined Audit Summary ===".bright_blue().bold());
    println!("{}  {}", "Files:".dimmed(), summary.sources.len());
    println!("{}  {}", "Products:".dimmed(), summary.total_products);
    println!(
        "{}  {}",
        "Needing attention:".dimmed(),
        summary.problems.len().to_string().bright_yellow()
    );

    println!();
    println!(
        "{:<26} {:>8} {:>8} {:>8}",
        "ASPECT".dimmed(),
        "PASS".dimmed(),
        "REVIEW".dimmed(),
        "MANUAL".dimmed()
    );
    for a in &summary.aspects {
        let pass = rate(a.pass_percent);
        let pass = if a.pass_percent >= 80.0 {
            pass.green()
        } else if a.pass_percent >= 60.0 {
            pass.yellow()
        } else {
            pass.red()
        };
        println!(
            "{:<26} {:>8} {:>8} {:>8}",
            a.aspect.label(),
            pass,
            rate(a.review_percent),
            rate(a.manual_percent)
        );
    }

    println!();
    for path in written {
        println!("{}  {}", "Wrote:".dimmed(), path.display());
    }
}
