//! steam-search - Steam library search for launcher hosts
//!
//! Library crate: finds Steam libraries and non-Steam shortcuts, keeps an
//! index of them fresh in the background, and fuzzy-matches queries
//! against it. The `steam-search` binary is a small CLI host on top.

pub mod config;
pub mod error;
pub mod icons;
pub mod index;
pub mod launch;
pub mod logging;
pub mod paths;
pub mod plugin;
pub mod record;
pub mod scanner;
pub mod search;
pub mod steam;

pub use config::PluginConfig;
pub use error::{CacheError, DiscoveryError, LaunchError, ParseSkip, RefreshError, SkipReason};
pub use index::{Index, IndexHandle, RefreshOutcome, RefreshReport, Refresher};
pub use plugin::{ActionToken, ResultItem, SteamSearch};
pub use record::{AppId, AppRecord, LaunchKind, LaunchTarget};
pub use search::{search, Match, MatchKind};
