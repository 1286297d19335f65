//! Source tables: handles to the files the extractor streams, and their discovery.

use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::SourceError;

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Where a source table's bytes come from.
#[derive(Debug, Clone)]
pub enum SourceOrigin {
    /// Local filesystem path.
    Path(PathBuf),
    /// Bytes held in memory.
    Memory(Vec<u8>),
}

/// One tabular source, named for checkpointing.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Stable name recorded in the checkpoint ledger.
    pub name: String,
    pub origin: SourceOrigin,
}

impl SourceFile {
    pub fn from_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            origin: SourceOrigin::Path(path.into()),
        }
    }

    pub fn in_memory(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            origin: SourceOrigin::Memory(data.into()),
        }
    }

    /// Open the source for streaming.
    pub fn open(&self) -> SourceResult<Box<dyn Read + '_>> {
        match &self.origin {
            SourceOrigin::Path(path) => {
                let file = std::fs::File::open(path).map_err(|e| SourceError::Open {
                    name: self.name.clone(),
                    source: e,
                })?;
                Ok(Box::new(std::io::BufReader::new(file)))
            }
            SourceOrigin::Memory(data) => Ok(Box::new(data.as_slice())),
        }
    }
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.origin {
            SourceOrigin::Path(path) => write!(f, "{}", path.display()),
            SourceOrigin::Memory(_) => write!(f, "{} (memory)", self.name),
        }
    }
}

/// Find every file under `root` with the given extension (case-insensitive).
///
/// Hidden entries are skipped. Files come back in sorted path order, which
/// is the discovery order used by `fileLimit`. Each file is named by its path
/// relative to `root`, with `/` separators.
pub fn discover_sources(root: &Path, extension: &str) -> SourceResult<Vec<SourceFile>> {
    fn is_hidden(entry: &DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
    }

    if !root.is_dir() {
        return Err(SourceError::RootMissing {
            path: root.display().to_string(),
        });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry.map_err(|e| SourceError::Walk {
            path: e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| root.display().to_string()),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            paths.push(entry.into_path());
        }
    }
    paths.sort_by(|a, b| a.components().cmp(b.components()));

    Ok(paths
        .into_iter()
        .map(|path| {
            let name = relative_name(root, &path);
            SourceFile::from_path(name, path)
        })
        .collect())
}

fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
