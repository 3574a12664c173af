//! Icon lookup
//!
//! Steam keeps artwork for installed apps in `appcache/librarycache`, either
//! flat (`<appid>_icon.jpg`) or, since 2024 clients, in a per-app folder.
//! Shortcuts use their declared icon, falling back to the executable itself.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::record::{AppRecord, LaunchTarget};

/// Flat librarycache file names, best first
const FLAT_ICON_NAMES: &[&str] = &["{id}_icon.jpg", "{id}_library_600x900.jpg", "{id}_header.jpg"];

/// Per-app folder file names, best first
const FOLDER_ICON_NAMES: &[&str] = &["library_600x900.jpg", "header.jpg", "logo.png"];

#[derive(Debug, Clone, Default)]
pub struct IconResolver {
    cache_dirs: Vec<PathBuf>,
}

impl IconResolver {
    /// `icon_cache_dir` replaces the Steam librarycache folders when set
    pub fn new(icon_cache_dir: Option<&Path>, steam_roots: &[PathBuf]) -> Self {
        let cache_dirs = match icon_cache_dir {
            Some(dir) => vec![dir.to_path_buf()],
            None => steam_roots
                .iter()
                .flat_map(|root| {
                    [
                        root.join("appcache/librarycache"),
                        root.join("steam/appcache/librarycache"),
                    ]
                })
                .collect(),
        };
        Self { cache_dirs }
    }

    /// Resolve a record's icon, memoized in its [`crate::record::IconSlot`]
    pub fn icon_for<'a>(&self, record: &'a AppRecord) -> Option<&'a Path> {
        record.icon.get_or_resolve(|hint| self.lookup(record, hint))
    }

    fn lookup(&self, record: &AppRecord, hint: Option<&Path>) -> Option<PathBuf> {
        match &record.launch {
            LaunchTarget::SteamApp { app_id } => self.steam_icon(*app_id),
            LaunchTarget::Shortcut { exe, .. } => hint
                .filter(|h| h.is_file())
                .map(Path::to_path_buf)
                .or_else(|| exe.is_file().then(|| exe.clone())),
        }
    }

    fn steam_icon(&self, app_id: u32) -> Option<PathBuf> {
        let id = app_id.to_string();

        for dir in &self.cache_dirs {
            for pattern in FLAT_ICON_NAMES {
                let candidate = dir.join(pattern.replace("{id}", &id));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }

            let app_dir = dir.join(&id);
            if !app_dir.is_dir() {
                continue;
            }
            for name in FOLDER_ICON_NAMES {
                let candidate = app_dir.join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
            // The small icon is stored under its content hash
            let hashed = WalkDir::new(&app_dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .find(|p| p.extension().is_some_and(|ext| ext == "jpg"));
            if hashed.is_some() {
                return hashed;
            }
        }

        None
    }
}
