use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

const MAX_NAME_ATTEMPTS: u32 = 100;

/// Each line type in the run journal
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalLine {
    RunStart {
        timestamp: DateTime<Utc>,
        input: PathBuf,
        mode: String,
        model: String,
    },
    Row {
        row_index: usize,
        result: Value,
        timestamp: DateTime<Utc>,
    },
    RunEnd {
        status: String,
        summary: Value,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Append-only JSONL record of a run, written as rows complete so that an
/// interrupted run still leaves its finished rows behind.
pub struct RunJournal {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RunJournal {
    /// Open a journal under `<data_dir>/prodscore/runs/`
    pub fn new(input: &Path) -> io::Result<Self> {
        Self::create_in(&Self::runs_dir()?, input)
    }

    /// Open a journal in `dir`, named `<UTC timestamp>_<short input hash>.jsonl`
    pub fn create_in(dir: &Path, input: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string();
        let mut hasher = Sha256::new();
        hasher.update(input.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let stem = format!("{}_{}", timestamp, &hash[..6]);

        // Never truncate an existing journal
        let mut attempt = 0u32;
        loop {
            let path = match attempt {
                0 => dir.join(format!("{stem}.jsonl")),
                n => dir.join(format!("{stem}-{n}.jsonl")),
            };
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok(Self {
                        file: Mutex::new(BufWriter::new(file)),
                        path,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(&self, input: &Path, mode: &str, model: &str) {
        self.write_line(&JournalLine::RunStart {
            timestamp: Utc::now(),
            input: input.to_path_buf(),
            mode: mode.to_string(),
            model: model.to_string(),
        });
    }

    pub fn write_row<T: Serialize>(&self, row_index: usize, result: &T) {
        let result = serde_json::to_value(result).unwrap_or(Value::Null);
        self.write_line(&JournalLine::Row {
            row_index,
            result,
            timestamp: Utc::now(),
        });
    }

    pub fn write_end<T: Serialize>(&self, status: &str, summary: &T, duration_secs: f64) {
        let summary = serde_json::to_value(summary).unwrap_or(Value::Null);
        self.write_line(&JournalLine::RunEnd {
            status: status.to_string(),
            summary,
            duration_secs,
            timestamp: Utc::now(),
        });
    }

    fn write_line(&self, line: &JournalLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn runs_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not determine data directory")
        })?;
        Ok(data_dir.join("prodscore").join("runs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_journal_lines() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RunJournal::create_in(dir.path(), Path::new("input/products.csv")).unwrap();

        journal.write_start(Path::new("input/products.csv"), "evaluate", "qwen-plus");
        journal.write_row(0, &json!({"overall_score": 2}));
        journal.write_end("completed", &json!({"rows_seen": 1}), 1.5);

        let name = journal.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(".jsonl"));
        let hash = name.trim_end_matches(".jsonl").rsplit('_').next().unwrap();
        assert_eq!(hash.len(), 6);

        let content = fs::read_to_string(journal.path()).unwrap();
        let types: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types, vec!["run_start", "row", "run_end"]);
    }

    #[test]
    fn test_rows_are_flushed_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RunJournal::create_in(dir.path(), Path::new("a.csv")).unwrap();
        journal.write_row(3, &json!({"failure": "transport"}));

        // Readable before the journal is dropped
        let content = fs::read_to_string(journal.path()).unwrap();
        assert!(content.contains("\"row_index\":3"));
    }

    #[test]
    fn test_same_input_twice_keeps_both_journals() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunJournal::create_in(dir.path(), Path::new("a.csv")).unwrap();
        first.write_row(0, &json!({"overall_score": 1}));
        let second = RunJournal::create_in(dir.path(), Path::new("a.csv")).unwrap();

        assert_ne!(first.path(), second.path());
        let content = fs::read_to_string(first.path()).unwrap();
        assert!(content.contains("\"row_index\":0"));
    }
}
