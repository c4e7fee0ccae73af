//! File persistence for ledger state
//!
//! The whole ledger lives in one JSON snapshot document. Writes go to a
//! temporary file in the same directory which is then renamed over the
//! target, so readers never see a half-written state.

use crate::error::{LedgerError, Result};
use crate::ledger::LedgerSnapshot;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Replaces `path` with `contents` in one rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| {
        LedgerError::Io(format!("failed to replace {}: {}", path.display(), e.error))
    })?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no state has been saved yet.
    pub fn load(&self) -> Result<Option<LedgerSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        import_snapshot(&self.path).map(Some)
    }

    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        export_snapshot(&self.path, snapshot)?;
        debug!(
            path = %self.path.display(),
            transactions = snapshot.transactions.len(),
            "saved ledger state"
        );
        Ok(())
    }
}

pub fn export_snapshot(path: &Path, snapshot: &LedgerSnapshot) -> Result<()> {
    let json = snapshot.to_json_pretty()?;
    write_atomic(path, json.as_bytes())
}

pub fn import_snapshot(path: &Path) -> Result<LedgerSnapshot> {
    let contents = fs::read_to_string(path)
        .map_err(|e| LedgerError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    LedgerSnapshot::from_json(&contents)
}
