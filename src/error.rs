//! Error types
//!
//! Only discovery failure and launch failure ever reach a caller. Parse
//! problems are carried as [`ParseSkip`] values and logged where they happen.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// No Steam library root could be found.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("No Steam installation found (searched {} location(s))", searched.len())]
    NotFound { searched: Vec<PathBuf> },
}

/// A selected result could not be started.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Executable no longer exists: {path}")]
    MissingExecutable { path: PathBuf },

    #[error("Failed to start {target}: {source}")]
    Spawn {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No URI handler available to open {uri}")]
    NoUriOpener { uri: String },

    #[error("{id} is not in the index")]
    NotLaunchable { id: String },
}

/// The persisted index snapshot could not be used.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Index cache {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Index cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize index cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A refresh that produced no new index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Why a single manifest or shortcut entry was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unreadable(String),
    Malformed,
    MissingField(&'static str),
    InvalidAppId(String),
    EmptyName,
    NotInstalled,
    Hidden,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(e) => write!(f, "unreadable ({})", e),
            SkipReason::Malformed => write!(f, "malformed"),
            SkipReason::MissingField(field) => write!(f, "missing required field \"{}\"", field),
            SkipReason::InvalidAppId(raw) => write!(f, "invalid app id \"{}\"", raw),
            SkipReason::EmptyName => write!(f, "name is empty after normalization"),
            SkipReason::NotInstalled => write!(f, "not fully installed"),
            SkipReason::Hidden => write!(f, "hidden shortcut"),
        }
    }
}

/// One excluded entry, recorded for the refresh report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSkip {
    pub source_path: PathBuf,
    pub reason: SkipReason,
}

impl ParseSkip {
    pub fn new(source_path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        Self {
            source_path: source_path.into(),
            reason,
        }
    }
}

impl fmt::Display for ParseSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_path.display(), self.reason)
    }
}
