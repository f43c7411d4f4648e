//! CSV input and report output.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use prodscore_core::input::columns;
use prodscore_core::{AuditRowResult, RowResult, UrlSummary};
use prodscore_criteria::{AuditProfile, FieldVerdict};

const BOM: char = '\u{feff}';

/// Columns appended to every evaluated row
pub const EVALUATION_COLUMNS: &[&str] = &[
    "title_score",
    "description_score",
    "overall_score",
    "title_must_have_score",
    "title_must_avoid_score",
    "description_must_have_score",
    "description_must_avoid_score",
    "title_evaluation",
    "description_evaluation",
    "candidates_count",
    "language",
    "failure",
];

/// A whole CSV file: header names and raw records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read header of {}", path.display()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if let Some(first) = headers.first_mut() {
            *first = first.trim_start_matches(BOM).to_string();
        }

        let mut records = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read row {} of {}", i + 1, path.display()))?;
            let mut values: Vec<String> = record.iter().map(str::to_string).collect();
            values.resize(headers.len(), String::new());
            records.push(values);
        }

        Ok(Self { headers, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Record `index` keyed by header name
    pub fn fields(&self, index: usize) -> HashMap<String, String> {
        self.headers
            .iter()
            .cloned()
            .zip(self.records[index].iter().cloned())
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = HashMap<String, String>> + '_ {
        (0..self.records.len()).map(|i| self.fields(i))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = create_writer(path)?;
        writer.write_record(&self.headers)?;
        for record in &self.records {
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn create_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

/// `results/<stem>_evaluated.csv`
pub fn default_evaluation_output(input: &Path) -> PathBuf {
    PathBuf::from("results").join(format!("{}_evaluated.csv", input_stem(input)))
}

/// `report/<stem>_audit_result.csv`
pub fn default_audit_output(input: &Path) -> PathBuf {
    PathBuf::from("report").join(format!("{}_audit_result.csv", input_stem(input)))
}

/// `<stem>_url_summary.csv` next to the audit output
pub fn url_summary_path(input: &Path, audit_output: &Path) -> PathBuf {
    let name = format!("{}_url_summary.csv", input_stem(input));
    match audit_output.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn score_cell(verdict: Option<&FieldVerdict>, pick: fn(&FieldVerdict) -> u8) -> String {
    verdict.map(|v| pick(v).to_string()).unwrap_or_default()
}

fn json_cell(verdict: Option<&FieldVerdict>) -> String {
    verdict.map(|v| v.to_json().to_string()).unwrap_or_default()
}

/// Original columns, with the optimized title replaced by the chosen one,
/// followed by [`EVALUATION_COLUMNS`]. Only rows present in `results` are written.
pub fn write_evaluation(path: &Path, table: &Table, results: &[RowResult]) -> Result<()> {
    let title_column = columns::OPTIMIZED_TITLE
        .iter()
        .find_map(|name| table.column_index(name));

    let mut writer = create_writer(path)?;
    let mut headers = table.headers.clone();
    headers.extend(EVALUATION_COLUMNS.iter().map(|c| c.to_string()));
    writer.write_record(&headers)?;

    for result in results {
        let mut record = table.records[result.row_index].clone();
        if let (Some(col), Some(chosen)) = (title_column, &result.chosen_title) {
            record[col] = chosen.clone();
        }

        let title = result.title_verdict.as_ref();
        let description = result.description_verdict.as_ref();
        record.extend([
            score_cell(title, |v| v.field_score().value()),
            score_cell(description, |v| v.field_score().value()),
            result.overall_score.map(|s| s.to_string()).unwrap_or_default(),
            score_cell(title, |v| v.must_have_score().value()),
            score_cell(title, |v| v.must_avoid_score().value()),
            score_cell(description, |v| v.must_have_score().value()),
            score_cell(description, |v| v.must_avoid_score().value()),
            json_cell(title),
            json_cell(description),
            result.candidates_count.to_string(),
            result.language.clone(),
            result.failure.as_ref().map(|f| f.to_string()).unwrap_or_default(),
        ]);
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn audit_headers(profile: AuditProfile) -> Vec<String> {
    let mut headers = vec!["id".to_string(), "url".to_string(), "title".to_string()];
    for aspect in profile.aspects() {
        headers.push(format!("{}_status", aspect.as_str()));
        headers.push(format!("{}_reason", aspect.as_str()));
    }
    headers.push("overall_status".to_string());
    headers.push("failure".to_string());
    headers
}

pub fn write_audit(path: &Path, profile: AuditProfile, results: &[AuditRowResult]) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(audit_headers(profile))?;

    for result in results {
        let mut record = vec![result.id.clone(), result.url.clone(), result.title.clone()];
        for aspect in profile.aspects() {
            match result.aspect(*aspect) {
                Some(a) => {
                    record.push(a.status.to_string());
                    record.push(a.reason.clone());
                }
                None => record.extend([String::new(), String::new()]),
            }
        }
        record.push(result.overall_status.to_string());
        record.push(result.failure.as_ref().map(|f| f.to_string()).unwrap_or_default());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Per-URL PASS counts and rates for every aspect of `profile`, followed
/// by the per-aspect manual-check counts
pub fn write_url_summary(path: &Path, profile: AuditProfile, summary: &[UrlSummary]) -> Result<()> {
    let aspects = profile.aspects();
    let mut writer = create_writer(path)?;

    let mut headers = vec!["url".to_string(), "products".to_string()];
    for aspect in aspects {
        headers.push(format!("{}_pass", aspect.as_str()));
        headers.push(format!("{}_pass_percent", aspect.as_str()));
    }
    headers.extend(aspects.iter().map(|a| format!("{}_needs_manual_check", a.as_str())));
    writer.write_record(&headers)?;

    for entry in summary {
        let mut record = vec![entry.url.clone(), entry.products.to_string()];
        for aspect in aspects {
            record.push(entry.counts_for(*aspect).pass.to_string());
            record.push(format!("{:.2}%", entry.pass_percent(*aspect)));
        }
        record.extend(
            aspects
                .iter()
                .map(|a| entry.counts_for(*a).needs_manual_check.to_string()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
