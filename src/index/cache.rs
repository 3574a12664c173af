//! Index snapshot persistence
//!
//! The last good index is written as JSON so the first query after startup
//! has results before any scan has run. The file is replaced as a whole on
//! every successful refresh.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::Index;
use crate::error::CacheError;
use crate::logging::log_cache;
use crate::record::AppRecord;

/// Bumped whenever the snapshot layout changes incompatibly
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format_version: u32,
    written_at: DateTime<Utc>,
    steam_roots: &'a [PathBuf],
    records: &'a [AppRecord],
}

#[derive(Deserialize)]
struct Snapshot {
    format_version: u32,
    #[allow(dead_code)]
    written_at: DateTime<Utc>,
    #[serde(default)]
    steam_roots: Vec<PathBuf>,
    records: Vec<AppRecord>,
}

#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. `Ok(None)` when none has been written yet.
    pub fn load(&self) -> Result<Option<Index>, CacheError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::Corrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        let snapshot: Snapshot =
            serde_json::from_slice(&content).map_err(|e| CacheError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if snapshot.format_version != FORMAT_VERSION {
            return Err(CacheError::Corrupt {
                path: self.path.clone(),
                reason: format!(
                    "format version {} (expected {})",
                    snapshot.format_version, FORMAT_VERSION
                ),
            });
        }

        log_cache(&format!(
            "Loaded {} record(s) from {}",
            snapshot.records.len(),
            self.path.display()
        ));
        Ok(Some(Index::from_records(snapshot.records, snapshot.steam_roots)))
    }

    /// Replace the snapshot with `index` (write to a temp file, then rename)
    pub fn save(&self, index: &Index) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(io_err)?;

        let snapshot = SnapshotRef {
            format_version: FORMAT_VERSION,
            written_at: Utc::now(),
            steam_roots: index.steam_roots(),
            records: index.records(),
        };
        let json = serde_json::to_vec(&snapshot)?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        log_cache(&format!(
            "Saved {} record(s) to {}",
            index.len(),
            self.path.display()
        ));
        Ok(())
    }
}
