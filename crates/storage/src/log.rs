// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL event log, sharded per message author.
//!
//! Layout inside the log directory:
//!
//! ```text
//! events.jsonl              non-message events
//! messages/{author}.jsonl   message events, one shard per author
//! ```
//!
//! Sharding keeps concurrent authors on different machines from
//! rewriting each other's history when logs sync by file copy.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use thrum_core::LogRecord;
use tracing::warn;

/// Shard file for non-message events.
const EVENTS_FILE: &str = "events.jsonl";

/// Subdirectory holding per-author message shards.
const MESSAGES_DIR: &str = "messages";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A line parsed as JSON but not as a known record: the closed event
    /// set rejects it, which aborts projection rather than dropping data.
    #[error("malformed record in {file} line {line}: {source}")]
    MalformedRecord {
        file: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// The append-only event log.
pub struct EventLog {
    dir: PathBuf,
}

impl EventLog {
    /// Open (creating directories as needed) the log at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LogError> {
        let dir = dir.into();
        std::fs::create_dir_all(dir.join(MESSAGES_DIR))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one record to its shard and flush to disk before returning.
    ///
    /// The flush must complete before the projection is updated; an
    /// append failure aborts the enclosing RPC with no state change.
    pub fn append(&self, record: &LogRecord) -> Result<(), LogError> {
        let path = self.shard_path(record);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn shard_path(&self, record: &LogRecord) -> PathBuf {
        match record.event.message_shard() {
            Some(author) => self.dir.join(MESSAGES_DIR).join(format!("{author}.jsonl")),
            None => self.dir.join(EVENTS_FILE),
        }
    }

    /// Paths of all shard files that currently exist, events file first.
    pub fn shard_files(&self) -> Result<Vec<PathBuf>, LogError> {
        let mut shards = Vec::new();
        let events = self.dir.join(EVENTS_FILE);
        if events.exists() {
            shards.push(events);
        }
        let messages_dir = self.dir.join(MESSAGES_DIR);
        if messages_dir.is_dir() {
            let mut message_shards: Vec<PathBuf> = std::fs::read_dir(&messages_dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
                .collect();
            message_shards.sort();
            shards.extend(message_shards);
        }
        Ok(shards)
    }

    /// Read every record from every shard, merged and sorted by
    /// `event_id` (ULIDs sort by creation time, recovering commit order
    /// across shards).
    ///
    /// Lines that are not valid JSON are skipped with a warning. Lines
    /// that are valid JSON but not a valid record abort with
    /// [`LogError::MalformedRecord`].
    pub fn read_all(&self) -> Result<Vec<LogRecord>, LogError> {
        let mut records = Vec::new();
        for path in self.shard_files()? {
            self.read_shard(&path, &mut records)?;
        }
        records.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        Ok(records)
    }

    fn read_shard(&self, path: &Path, out: &mut Vec<LogRecord>) -> Result<(), LogError> {
        let reader = BufReader::new(File::open(path)?);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: serde_json::Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(e) => {
                    warn!(file = %path.display(), line = idx + 1, error = %e, "skipping corrupt log line");
                    continue;
                }
            };
            let record: LogRecord =
                serde_json::from_value(value).map_err(|source| LogError::MalformedRecord {
                    file: path.to_path_buf(),
                    line: idx + 1,
                    source,
                })?;
            out.push(record);
        }
        Ok(())
    }

    /// Byte size of each shard, keyed by file name relative to the log
    /// dir. Used by `sync.status`.
    pub fn shard_offsets(&self) -> Result<Vec<(String, u64)>, LogError> {
        let mut offsets = Vec::new();
        for path in self.shard_files()? {
            let len = path.metadata()?.len();
            let name = path
                .strip_prefix(&self.dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            offsets.push((name, len));
        }
        Ok(offsets)
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
