//! # ID ledger
//!
//! Side channel that hands entity identifiers from one workflow step to a
//! later, otherwise independent one. Two backends:
//!
//! - [`FileLedger`]: flat text file of `Label: id` lines, appended; lookups
//!   return the first line that starts with the requested label.
//! - [`SqliteLedger`]: key-value table with last-write-wins upserts.
//!
//! A single runner is assumed; neither backend locks.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::{HarnessError, Result};

pub trait IdLedger {
    fn record(&self, label: &str, id: &str) -> Result<()>;
    fn lookup(&self, label: &str) -> Result<String>;
    /// Forget every entry. Called once a run has new IDs to record.
    fn reset(&self) -> Result<()>;
}

fn normalize_label(label: &str) -> &str {
    label.trim().trim_end_matches(':').trim_end()
}

#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|err| HarnessError::io(parent, err))
            }
            _ => Ok(()),
        }
    }
}

impl IdLedger for FileLedger {
    fn record(&self, label: &str, id: &str) -> Result<()> {
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| HarnessError::io(&self.path, err))?;
        writeln!(file, "{}: {}", normalize_label(label), id.trim())
            .map_err(|err| HarnessError::io(&self.path, err))?;
        debug!(label = %label, id = %id, "recorded ID in ledger file");
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.ensure_parent()?;
        fs::write(&self.path, "").map_err(|err| HarnessError::io(&self.path, err))
    }

    /// Linear scan; a missing file reads as an empty ledger.
    fn lookup(&self, label: &str) -> Result<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(HarnessError::io(&self.path, err)),
        };

        raw.lines()
            .filter(|line| line.starts_with(label))
            .find_map(|line| line.split_once(':').map(|(_, value)| value.trim().to_string()))
            .ok_or_else(|| HarnessError::LabelNotFound(label.to_string()))
    }
}

/// Look a label up in the default ledger file.
pub fn extract_id_from_file(path: &Path, label: &str) -> Result<String> {
    FileLedger::new(path).lookup(label)
}

pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| HarnessError::io(parent, err))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS id_ledger (
               label TEXT PRIMARY KEY,
               entity_id TEXT NOT NULL,
               updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
             );",
        )?;
        Ok(Self { conn })
    }
}

impl IdLedger for SqliteLedger {
    fn record(&self, label: &str, id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO id_ledger (label, entity_id, updated_at)
             VALUES (?1, ?2, strftime('%s','now'))
             ON CONFLICT(label)
             DO UPDATE SET
               entity_id = excluded.entity_id,
               updated_at = excluded.updated_at;",
            params![normalize_label(label), id.trim()],
        )?;
        debug!(label = %label, id = %id, "recorded ID in ledger store");
        Ok(())
    }

    fn lookup(&self, label: &str) -> Result<String> {
        self.conn
            .query_row(
                "SELECT entity_id FROM id_ledger WHERE label = ?1 LIMIT 1;",
                params![normalize_label(label)],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| HarnessError::LabelNotFound(label.to_string()))
    }

    fn reset(&self) -> Result<()> {
        self.conn.execute("DELETE FROM id_ledger;", [])?;
        Ok(())
    }
}
