// 📜 Audit Log - append-only trail of every ledger mutation
// Plain text, one line per record, never rewritten

use crate::error::Result;
use crate::parser::DamageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// First line of a fresh log file
pub const LOG_HEADER: &str = "=== Upload Log ===";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f UTC";

/// One applied record: who uploaded which image, and what it set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    /// Image filename the record came from
    pub source: String,
    pub name: String,
    pub damage: u64,
}

impl AuditEntry {
    pub fn new(actor: &str, source: &str, record: &DamageRecord) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            source: source.to_string(),
            name: record.name.clone(),
            damage: record.damage,
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} | {} uploaded {} → {}: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.actor,
            self.source,
            self.name,
            self.damage
        )
    }
}

/// Marker line written when the event is wiped
pub fn reset_line(actor: &str, at: DateTime<Utc>) -> String {
    format!("[{}] EVENT RESET by {}", at.format(TIMESTAMP_FORMAT), actor)
}

/// Destination for audit lines
pub trait AuditSink: Send {
    /// Append one entry to the end of the trail
    fn append(&mut self, entry: &AuditEntry) -> Result<()>;

    /// Append a reset marker
    fn record_reset(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()>;
}

// ============================================================================
// FILE LOG
// ============================================================================

/// Audit trail stored as a human-readable text file
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    path: PathBuf,
}

/// Lines of the log at `path` without creating it; a missing log reads as empty
pub fn read_log_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let text = fs::read_to_string(path)?;
    Ok(text.lines().map(str::to_string).collect())
}

impl FileAuditLog {
    /// Use `path` as the log, writing the header if the file is new
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            fs::write(path, format!("{}\n\n", LOG_HEADER))?;
            debug!(path = %path.display(), "created audit log");
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every line currently in the file, header included
    pub fn read_lines(&self) -> Result<Vec<String>> {
        read_log_lines(&self.path)
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.write_all(text.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

impl AuditSink for FileAuditLog {
    fn append(&mut self, entry: &AuditEntry) -> Result<()> {
        self.write_text(&format!("{}\n", entry.to_line()))
    }

    fn record_reset(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()> {
        self.write_text(&format!("\n{}\n\n", reset_line(actor, at)))
    }
}

// ============================================================================
// MEMORY LOG
// ============================================================================

/// Audit trail kept in memory (embedding and tests)
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    pub entries: Vec<AuditEntry>,
    pub lines: Vec<String>,
}

impl AuditSink for MemoryAuditLog {
    fn append(&mut self, entry: &AuditEntry) -> Result<()> {
        self.lines.push(entry.to_line());
        self.entries.push(entry.clone());
        Ok(())
    }

    fn record_reset(&mut self, actor: &str, at: DateTime<Utc>) -> Result<()> {
        self.lines.push(reset_line(actor, at));
        Ok(())
    }
}
