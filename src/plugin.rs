//! Launcher host facade
//!
//! The host hands over a query string and gets back display-ready
//! [`ResultItem`]s. Selecting an item gives its [`ActionToken`] back to
//! [`SteamSearch::activate`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::PluginConfig;
use crate::error::{CacheError, LaunchError, RefreshError};
use crate::icons::IconResolver;
use crate::index::{Index, IndexHandle, RefreshOutcome, RefreshWorker, Refresher};
use crate::launch::{self, SteamPage};
use crate::logging::{log_info, log_warning, set_debug};
use crate::record::{AppId, AppRecord};
use crate::search::{search, Match};

/// What the host should do when an item is selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionToken {
    Launch { id: AppId },
    SteamPage { app_id: u32, page: SteamPage },
    Refresh,
}

/// One row in the host's result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub title: String,
    pub subtitle: String,
    pub icon_path: Option<String>,
    pub score: u32,
    pub action: ActionToken,
}

impl ResultItem {
    fn for_match(m: &Match, icons: &IconResolver) -> Self {
        let record = m.record;
        Self {
            title: record.name.clone(),
            subtitle: subtitle(record),
            icon_path: icons.icon_for(record).map(|p| p.display().to_string()),
            score: m.score,
            action: ActionToken::Launch { id: record.id },
        }
    }

    fn library_not_found() -> Self {
        Self {
            title: "Steam library not found".to_string(),
            subtitle: "Set steam_path or extra_library_paths in the settings, then select to retry"
                .to_string(),
            icon_path: None,
            score: 0,
            action: ActionToken::Refresh,
        }
    }
}

/// Install path when known, otherwise what kind of entry it is
fn subtitle(record: &AppRecord) -> String {
    match &record.install_dir {
        Some(dir) => dir.display().to_string(),
        None => record.kind().display_name().to_string(),
    }
}

pub struct SteamSearch {
    config: PluginConfig,
    refresher: Arc<Refresher>,
    worker: Option<RefreshWorker>,
}

impl SteamSearch {
    /// Load the cached index and start refreshing in the background
    pub fn start(config: PluginConfig) -> std::io::Result<Self> {
        let plugin = Self::without_worker(config);
        let worker = RefreshWorker::spawn(
            Arc::clone(&plugin.refresher),
            plugin.config.refresh_interval(),
            true,
        )?;
        Ok(Self {
            worker: Some(worker),
            ..plugin
        })
    }

    /// Load the cached index only; refreshes happen through [`SteamSearch::refresh_blocking`]
    pub fn without_worker(config: PluginConfig) -> Self {
        let refresher = Refresher::new(config.clone(), IndexHandle::default());
        Self::with_refresher(config, refresher)
    }

    fn with_refresher(config: PluginConfig, refresher: Refresher) -> Self {
        if config.debug {
            set_debug(true);
        }

        match refresher.cache().load() {
            Ok(Some(index)) => {
                refresher.handle().swap(index);
            }
            Ok(None) => log_info("No index cache yet; waiting for the first scan"),
            Err(e @ CacheError::Corrupt { .. }) => {
                log_warning(&format!("{}; starting with an empty index", e))
            }
            Err(e) => log_warning(&format!("Index cache unavailable: {}", e)),
        }

        Self {
            config,
            refresher: Arc::new(refresher),
            worker: None,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// The index queries currently run against
    pub fn index(&self) -> Arc<Index> {
        self.refresher.handle().snapshot()
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    pub fn query(&self, query: &str) -> Vec<ResultItem> {
        let index = self.index();

        if index.is_empty() {
            if let Some(RefreshError::Discovery(_)) = self.refresher.last_error() {
                return vec![ResultItem::library_not_found()];
            }
        }
        if query.is_empty() && !self.config.show_on_empty_query {
            return Vec::new();
        }

        let icons = IconResolver::new(self.config.icon_cache_dir.as_deref(), index.steam_roots());
        let matches = search(query, &index);
        let limit = self.config.max_results.unwrap_or(matches.len());

        matches
            .iter()
            .take(limit)
            .map(|m| ResultItem::for_match(m, &icons))
            .collect()
    }

    /// Secondary actions for a result; only Steam apps have any
    pub fn context_menu(&self, action: &ActionToken) -> Vec<ResultItem> {
        let ActionToken::Launch { id } = action else {
            return Vec::new();
        };
        let index = self.index();
        let Some(app_id) = index.get(id).and_then(AppRecord::steam_app_id) else {
            return Vec::new();
        };

        SteamPage::ALL
            .iter()
            .map(|&page| ResultItem {
                title: page.title().to_string(),
                subtitle: page.description().to_string(),
                icon_path: None,
                score: 0,
                action: ActionToken::SteamPage { app_id, page },
            })
            .collect()
    }

    pub fn activate(&self, action: &ActionToken) -> Result<(), LaunchError> {
        match action {
            ActionToken::Launch { id } => {
                let index = self.index();
                let record = index.get(id).ok_or_else(|| LaunchError::NotLaunchable {
                    id: id.to_string(),
                })?;
                launch::launch(record)
            }
            ActionToken::SteamPage { app_id, page } => launch::open_steam_page(*app_id, *page),
            ActionToken::Refresh => {
                self.refresh_now();
                Ok(())
            }
        }
    }

    /// Rescan now. A scan already in progress restarts instead.
    pub fn refresh_now(&self) {
        if self.refresher.request_restart() {
            return;
        }
        match &self.worker {
            Some(worker) if worker.trigger() => {}
            _ => {
                let _ = self.refresh_blocking();
            }
        }
    }

    /// Refresh on the calling thread
    pub fn refresh_blocking(&self) -> Result<RefreshOutcome, RefreshError> {
        self.refresher.refresh()
    }

    /// Stop the background worker, waiting for a running refresh
    pub fn shutdown(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        log_info("steam-search stopped");
    }
}
