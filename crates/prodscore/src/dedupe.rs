//! Drop repeated titles within each URL.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::table::Table;

const TOP_URLS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlCounts {
    pub url: String,
    pub total: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupeStats {
    pub total: usize,
    pub kept: usize,
    pub removed: usize,
    /// Every URL, most rows first; ties keep first-seen order
    pub by_url: Vec<UrlCounts>,
}

impl DedupeStats {
    pub fn retention_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.kept as f64 / self.total as f64 * 100.0
    }
}

/// Keep the first row of every (url, title) pair, preserving order
pub fn dedupe(table: &Table) -> Result<(Table, DedupeStats)> {
    let (Some(url_col), Some(title_col)) = (table.column_index("url"), table.column_index("title")) else {
        anyhow::bail!("Input must contain 'title' and 'url' columns");
    };

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut by_url: Vec<UrlCounts> = Vec::new();
    let mut url_index: HashMap<String, usize> = HashMap::new();
    let mut records = Vec::new();

    for record in &table.records {
        let url = record[url_col].trim().to_string();
        let title = record[title_col].trim().to_string();

        let index = match url_index.get(&url) {
            Some(&i) => i,
            None => {
                by_url.push(UrlCounts {
                    url: url.clone(),
                    total: 0,
                    kept: 0,
                });
                url_index.insert(url.clone(), by_url.len() - 1);
                by_url.len() - 1
            }
        };
        by_url[index].total += 1;

        if seen.insert((url, title)) {
            by_url[index].kept += 1;
            records.push(record.clone());
        }
    }

    // Stable sort keeps first-seen order among equal totals
    by_url.sort_by(|a, b| b.total.cmp(&a.total));

    let stats = DedupeStats {
        total: table.len(),
        kept: records.len(),
        removed: table.len() - records.len(),
        by_url,
    };
    let filtered = Table {
        headers: table.headers.clone(),
        records,
    };
    Ok((filtered, stats))
}

/// `<dir>/<stem>_filtered_<YYYYmmdd_HHMMSS>.csv`
pub fn default_output(input: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let name = format!("{}_filtered_{}.csv", stem, now.format("%Y%m%d_%H%M%S"));
    match input.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

pub fn handle_dedupe_command(input: &Path, output: Option<PathBuf>, json: bool) -> Result<()> {
    let table = Table::read(input).with_context(|| format!("Failed to load {}", input.display()))?;
    let (filtered, stats) = dedupe(&table)?;

    let output = output.unwrap_or_else(|| default_output(input, Local::now()));
    filtered.write(&output)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats, &output);
    }
    Ok(())
}

fn print_stats(stats: &DedupeStats, output: &Path) {
    println!("{}", "=== Duplicate Filter ===".bright_blue().bold());
    println!("{}  {}", "Rows read:".dimmed(), stats.total);
    println!("{}  {}", "Rows kept:".dimmed(), stats.kept.to_string().bright_green());
    println!("{}  {}", "Removed:".dimmed(), stats.removed);
    println!("{}  {:.2}%", "Retention:".dimmed(), stats.retention_percent());
    println!("{}  {}", "Output:".dimmed(), output.display());

    if !stats.by_url.is_empty() {
        println!();
        println!("{}", format!("Top {} URLs:", TOP_URLS).dimmed());
        for u in stats.by_url.iter().take(TOP_URLS) {
            let url: String = u.url.chars().take(60).collect();
            println!("  {}", url);
            println!(
                "      total {}, kept {}, removed {}",
                u.total,
                u.kept,
                u.total - u.kept
            );
        }
    }
}
