//! Checkpoint ledger: which source files were fully ingested in earlier runs.
//!
//! The ledger is a line-oriented text file, one source name per line, only
//! ever appended to. Each append is synced before returning. Duplicate lines
//! are harmless; the loaded set absorbs them.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Durable record of completed source files.
#[derive(Debug)]
pub struct CheckpointLedger {
    /// `None` for a memory-only ledger.
    path: Option<PathBuf>,
    processed: HashSet<String>,
}

impl CheckpointLedger {
    /// Open the ledger at `path`, loading every recorded name.
    ///
    /// A missing file is an empty ledger; it is created on the first record.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        let mut ledger = Self {
            path: Some(path.to_path_buf()),
            processed: HashSet::new(),
        };
        ledger.processed = ledger.load()?;
        Ok(ledger)
    }

    /// A ledger that persists nothing and starts empty.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            processed: HashSet::new(),
        }
    }

    /// Read all recorded names from durable storage.
    pub fn load(&self) -> LedgerResult<HashSet<String>> {
        let Some(path) = &self.path else {
            return Ok(self.processed.clone());
        };
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => {
                return Err(LedgerError::Read {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Append `name` to the ledger and sync it to disk.
    pub fn record(&mut self, name: &str) -> LedgerResult<()> {
        if let Some(path) = &self.path {
            let append_err = |source| LedgerError::Append {
                path: path.display().to_string(),
                name: name.to_string(),
                source,
            };
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(append_err)?;
            writeln!(file, "{name}").map_err(append_err)?;
            file.sync_all().map_err(append_err)?;
        }
        self.processed.insert(name.to_string());
        Ok(())
    }

    /// Whether `name` was recorded in this or an earlier run.
    pub fn contains(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    /// Names loaded at open plus those recorded since.
    pub fn processed(&self) -> &HashSet<String> {
        &self.processed
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}
