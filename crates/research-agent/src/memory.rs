//! Cross-run memory
//!
//! An append-only record of [`MemoryEntry`] items, optionally backed by a
//! JSON-lines log. The log is loaded in full when the store is opened and
//! each record appends exactly one line; it is never rewritten.

use std::io;
use std::path::{Path, PathBuf};

use research_core::{MemoryEntry, ResearchError};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Memory persistence errors
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("I/O error on memory log {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Run {0} is already recorded")]
    DuplicateRun(Uuid),

    #[error("Failed to serialize memory entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<MemoryError> for ResearchError {
    fn from(err: MemoryError) -> Self {
        ResearchError::Memory(err.to_string())
    }
}

struct LogFile {
    path: PathBuf,
    file: File,
}

/// Append-only store of memory entries
///
/// Reads go through an `RwLock`; appends are serialised by a single mutex
/// that also guards the log file.
pub struct MemoryStore {
    entries: RwLock<Vec<MemoryEntry>>,
    append: Mutex<Option<LogFile>>,
}

impl MemoryStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            append: Mutex::new(None),
        }
    }

    /// Open (or create) a JSON-lines log and load every entry in it
    ///
    /// Unreadable lines are skipped with a warning.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| MemoryError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(e)),
        };

        let mut entries = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), line = index + 1, error = %e, "Skipping unreadable memory entry"),
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        info!(path = %path.display(), entries = entries.len(), "Memory log loaded");
        Ok(Self {
            entries: RwLock::new(entries),
            append: Mutex::new(Some(LogFile { path, file })),
        })
    }

    /// Append an entry; a run id can only be recorded once
    pub async fn record(&self, entry: MemoryEntry) -> Result<(), MemoryError> {
        let mut append = self.append.lock().await;

        if self
            .entries
            .read()
            .await
            .iter()
            .any(|e| e.run_id == entry.run_id)
        {
            return Err(MemoryError::DuplicateRun(entry.run_id));
        }

        if let Some(log) = append.as_mut() {
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            let io_err = |source| MemoryError::Io {
                path: log.path.clone(),
                source,
            };
            log.file.write_all(line.as_bytes()).await.map_err(io_err)?;
            log.file.flush().await.map_err(io_err)?;
        }

        debug!(run_id = %entry.run_id, topic = %entry.topic, "Memory entry recorded");
        self.entries.write().await.push(entry);
        Ok(())
    }

    /// Entries for `topic` (case-insensitive, trimmed), most recent first
    pub async fn recall(&self, topic: &str) -> Vec<MemoryEntry> {
        self.entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.matches_topic(topic))
            .cloned()
            .collect()
    }

    /// Running average of quality scores for `topic`
    pub async fn average_quality(&self, topic: &str) -> Option<f64> {
        let entries = self.entries.read().await;
        let scores: Vec<f64> = entries
            .iter()
            .filter(|e| e.matches_topic(topic))
            .map(|e| e.quality_score)
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Backing log path, if persistent
    pub async fn path(&self) -> Option<PathBuf> {
        self.append.lock().await.as_ref().map(|log| log.path.clone())
    }
}
