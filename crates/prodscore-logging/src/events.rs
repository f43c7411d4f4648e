use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured log events for a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        input: PathBuf,
        mode: String,
        model: String,
        concurrency: usize,
    },
    RowStarted {
        row_index: usize,
        row_id: String,
    },
    CandidateScored {
        row_index: usize,
        candidate_index: usize,
        /// None when the candidate's evaluation failed
        field_score: Option<u8>,
    },
    RowCompleted {
        row_index: usize,
        row_id: String,
        /// Row-level outcome, e.g. an overall score or an audit status
        outcome: String,
        partial: bool,
        duration_secs: f64,
    },
    RowFailed {
        row_index: usize,
        row_id: String,
        kind: String,
        error: String,
    },
    RunCompleted {
        rows_seen: usize,
        fully_evaluated: usize,
        partially_evaluated: usize,
        failed: usize,
        duration_secs: f64,
    },
    RunInterrupted {
        rows_seen: usize,
    },
    RunAborted {
        row_index: usize,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Run event logger: console output plus an optional append-only JSON file
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let _ = writeln!(file, "{}", event.with_timestamp());
            }
        }

        let line = match self.format {
            LogFormat::Json => serde_json::to_string(event).ok(),
            LogFormat::Pretty => Self::render_pretty(event),
            LogFormat::Compact => Self::render_compact(event),
        };
        if let Some(line) = line {
            let _ = writeln!(std::io::stderr(), "{}", line);
        }
    }

    fn render_pretty(event: &LogEvent) -> Option<String> {
        let line = match event {
            LogEvent::RunStarted {
                input,
                mode,
                model,
                concurrency,
            } => format!(
                "\n{} {} {}\n  {} {}  {} {}  {} {}\n",
                "▶".bright_blue(),
                "prodscore".bold().bright_white(),
                mode.bright_blue(),
                "Input:".dimmed(),
                input.display(),
                "Model:".dimmed(),
                model,
                "Concurrency:".dimmed(),
                concurrency
            ),
            LogEvent::RowStarted { .. } | LogEvent::CandidateScored { .. } => return None,
            LogEvent::RowCompleted {
                row_index,
                row_id,
                outcome,
                partial,
                duration_secs,
            } => {
                let mark = if *partial {
                    "◐".bright_yellow()
                } else {
                    "✓".bright_green()
                };
                format!(
                    "  {} row {} {} {} {}",
                    mark,
                    row_index + 1,
                    truncate(row_id, 40).dimmed(),
                    outcome,
                    format!("({:.1}s)", duration_secs).dimmed()
                )
            }
            LogEvent::RowFailed {
                row_index,
                row_id,
                kind,
                error,
            } => format!(
                "  {} row {} {} {}: {}",
                "✗".bright_red(),
                row_index + 1,
                truncate(row_id, 40).dimmed(),
                kind.bright_red(),
                truncate(error, 120)
            ),
            // Final summary is printed by the binary
            LogEvent::RunCompleted { .. } => return None,
            LogEvent::RunInterrupted { rows_seen } => format!(
                "\n{} Interrupted after {} rows",
                "⚠".bright_yellow(),
                rows_seen
            ),
            LogEvent::RunAborted { row_index, error } => format!(
                "\n{} Aborted at row {}: {}",
                "✗".bright_red(),
                row_index + 1,
                error.bright_red()
            ),
        };
        Some(line)
    }

    fn render_compact(event: &LogEvent) -> Option<String> {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted { mode, .. } => format!("[{}] run:start:{}", timestamp, mode),
            LogEvent::RowStarted { row_index, .. } => {
                format!("[{}] row:start:{}", timestamp, row_index + 1)
            }
            LogEvent::CandidateScored {
                row_index,
                candidate_index,
                field_score,
            } => format!(
                "[{}] candidate:{}.{} score={}",
                timestamp,
                row_index + 1,
                candidate_index + 1,
                field_score.map(|s| s.to_string()).unwrap_or_else(|| "-".into())
            ),
            LogEvent::RowCompleted {
                row_index,
                outcome,
                partial,
                duration_secs,
                ..
            } => format!(
                "[{}] row:done:{} {}{} {:.1}s",
                timestamp,
                row_index + 1,
                outcome,
                if *partial { " partial" } else { "" },
                duration_secs
            ),
            LogEvent::RowFailed {
                row_index, kind, ..
            } => format!("[{}] row:fail:{} {}", timestamp, row_index + 1, kind),
            LogEvent::RunCompleted {
                rows_seen,
                failed,
                duration_secs,
                ..
            } => format!(
                "[{}] run:done rows={} failed={} {:.1}s",
                timestamp, rows_seen, failed, duration_secs
            ),
            LogEvent::RunInterrupted { rows_seen } => {
                format!("[{}] run:interrupted rows={}", timestamp, rows_seen)
            }
            LogEvent::RunAborted { row_index, error } => {
                format!("[{}] run:aborted:{} {}", timestamp, row_index + 1, error)
            }
        };
        Some(msg)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_tag() {
        let event = LogEvent::RowFailed {
            row_index: 2,
            row_id: "sku-9".into(),
            kind: "transport".into(),
            error: "HTTP 503".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "row_failed");
        assert_eq!(json["row_index"], 2);
    }

    #[test]
    fn test_compact_hides_nothing_pretty_hides_progress() {
        let started = LogEvent::RowStarted {
            row_index: 0,
            row_id: "a".into(),
        };
        assert!(Logger::render_pretty(&started).is_none());
        assert_eq!(
            Logger::render_compact(&started).map(|s| s.ends_with("row:start:1")),
            Some(true)
        );
    }

    #[test]
    fn test_file_output_is_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();
        logger.log(&LogEvent::RunInterrupted { rows_seen: 4 });
        logger.log(&LogEvent::RunAborted {
            row_index: 1,
            error: "bad key".into(),
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "run_interrupted");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Größenangabe", 6), "Grö...");
    }
}
