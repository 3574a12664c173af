use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data_path;

// ============================================================================
// Plugin Config
// ============================================================================

/// Settings handed over by the launcher host.
///
/// Every field has a default, so a partial or older config file still loads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PluginConfig {
    /// Steam installation to use before probing the well-known locations
    pub steam_path: Option<PathBuf>,
    /// Library folders Steam itself does not list; append-only
    pub extra_library_paths: Vec<PathBuf>,
    /// Directory searched for icons instead of `<steam>/appcache/librarycache`
    pub icon_cache_dir: Option<PathBuf>,
    /// Where the index snapshot lives; defaults to the data directory
    pub index_cache_path: Option<PathBuf>,
    pub include_shortcuts: bool,
    /// Index shortcuts of every Steam profile, not just the most recent one
    pub shortcuts_all_users: bool,
    /// Skip manifests whose StateFlags say the app is not fully installed
    pub installed_only: bool,
    pub show_on_empty_query: bool,
    pub max_results: Option<usize>,
    /// Background refresh period; 0 disables the timer
    pub refresh_interval_secs: u64,
    /// Roots whose scan takes longer than this are skipped for the refresh
    pub root_scan_timeout_ms: u64,
    pub debug: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            steam_path: None,
            extra_library_paths: Vec::new(),
            icon_cache_dir: None,
            index_cache_path: None,
            include_shortcuts: true,
            shortcuts_all_users: false,
            installed_only: true,
            show_on_empty_query: true,
            max_results: None,
            refresh_interval_secs: 300,
            root_scan_timeout_ms: 10_000,
            debug: false,
        }
    }
}

impl PluginConfig {
    /// `config.json` in the data directory
    pub fn default_path() -> PathBuf {
        data_path!("config.json")
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => crate::logging::log_warning(&format!(
                        "Ignoring unreadable config {}: {}",
                        path.display(),
                        e
                    )),
                }
            }
        }
        Self::default()
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Add a library folder unless it is already listed. Returns true if added.
    pub fn add_extra_library_path(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.extra_library_paths.contains(&path) {
            return false;
        }
        self.extra_library_paths.push(path);
        true
    }

    pub fn cache_path(&self) -> PathBuf {
        self.index_cache_path
            .clone()
            .unwrap_or_else(|| data_path!("index_cache.json"))
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn root_scan_timeout(&self) -> Duration {
        Duration::from_millis(self.root_scan_timeout_ms.max(1))
    }
}
