//! Append-only log of answered questions
//!
//! One JSON object per line, so appends never rewrite earlier entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// One logged interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub dataset: u8,
    pub question: String,
    pub response: Value,
}

pub struct InteractionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append an entry. Failures are logged and swallowed.
    pub fn record(&self, dataset: u8, question: &str, response: Value) {
        let entry = Interaction {
            timestamp: Utc::now(),
            dataset,
            question: question.to_string(),
            response,
        };
        if let Err(e) = self.append(&entry) {
            warn!(
                "Failed to write interaction log {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn append(&self, entry: &Interaction) -> io::Result<()> {
        let line = serde_json::to_string(entry)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        debug!("Logged interaction to {}", self.path.display());
        Ok(())
    }

    /// The last `limit` entries, oldest first. A missing file has no entries;
    /// unreadable lines are skipped.
    pub fn recent(&self, limit: usize) -> io::Result<Vec<Interaction>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Interaction>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "Skipping malformed interaction log line {}: {}",
                    number + 1,
                    e
                ),
            }
        }

        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_record_and_read_back() {
        let dir = TempDir::new().unwrap();
        let log = InteractionLog::new(dir.path().join("logs").join("interactions.jsonl"));

        log.record(1, "List factories", json!({"status": "success"}));
        log.record(3, "Average efficiency", json!({"status": "error"}));

        let entries = log.recent(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question, "List factories");
        assert_eq!(entries[1].dataset, 3);
        assert_eq!(entries[1].response, json!({"status": "error"}));
    }

    #[test]
    fn test_recent_returns_last_entries() {
        let dir = TempDir::new().unwrap();
        let log = InteractionLog::new(dir.path().join("interactions.jsonl"));
        for i in 0..5 {
            log.record(1, &format!("question {i}"), Value::Null);
        }

        let entries = log.recent(2).unwrap();
        let questions: Vec<_> = entries.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["question 3", "question 4"]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = InteractionLog::new(dir.path().join("absent.jsonl"));
        assert!(log.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("interactions.jsonl");
        fs::write(&path, "not json\n\n").unwrap();
        let log = InteractionLog::new(&path);
        log.record(2, "Stock levels", Value::Null);

        let entries = log.recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].question, "Stock levels");
    }

    #[test]
    fn test_write_failure_does_not_panic() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending
        let log = InteractionLog::new(dir.path());
        log.record(1, "question", Value::Null);
    }
}
