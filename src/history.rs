//! Append-only execution history.
//!
//! One record per completed (or cancelled) execution, stored as JSON lines
//! under the config directory. History is observational: nothing in the
//! pipeline reads it to make decisions.

use crate::providers::{SystemTimeProvider, TimeProvider};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    pub query: String,
    pub command: String,
    pub success: bool,
    pub timestamp: u64,
}

pub struct CommandHistory {
    path: PathBuf,
    time: Box<dyn TimeProvider>,
}

impl CommandHistory {
    /// Opens the history file under the given directory.
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join("history.jsonl"),
            time: Box::new(SystemTimeProvider),
        })
    }

    /// Builds a record stamped with the current time.
    pub fn record(&self, query: &str, command: &str, success: bool) -> HistoryRecord {
        HistoryRecord {
            query: query.to_string(),
            command: command.to_string(),
            success,
            timestamp: self.time.now(),
        }
    }

    /// Appends one record.
    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        debug!("Recorded history entry for command: {}", record.command);
        Ok(())
    }

    /// Returns up to `limit` records, most recent first.
    ///
    /// Unreadable lines are skipped rather than failing the whole listing.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let mut records: Vec<HistoryRecord> = content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }
}
