//! Steam library discovery
//!
//! Finds Steam installations and every library folder registered with them.

use std::fs;
use std::path::{Path, PathBuf};

use super::vdf::parse_library_folders;
use crate::config::PluginConfig;
use crate::error::DiscoveryError;
use crate::logging::{log_debug, log_scan, log_warning};

/// Steam installation paths relative to `$HOME` on Linux
#[cfg(all(unix, not(target_os = "macos")))]
const HOME_STEAM_PATHS: &[&str] = &[
    ".local/share/Steam",
    ".steam/debian-installation",
    ".steam/steam",
    ".var/app/com.valvesoftware.Steam/data/Steam",
    ".var/app/com.valvesoftware.Steam/.local/share/Steam",
    "snap/steam/common/.local/share/Steam",
];

#[cfg(target_os = "macos")]
const HOME_STEAM_PATHS: &[&str] = &["Library/Application Support/Steam"];

#[cfg(windows)]
const HOME_STEAM_PATHS: &[&str] = &[];

/// How a library root was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootSource {
    /// The Steam installation directory itself
    Install,
    /// Listed in the installation's libraryfolders.vdf
    LibraryFolders,
    /// Added through `extra_library_paths`
    Configured,
}

/// A directory containing a `steamapps` manifest directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryRoot {
    pub path: PathBuf,
    /// Installation this library belongs to, when one was found
    pub steam_root: Option<PathBuf>,
    pub source: RootSource,
}

impl LibraryRoot {
    pub fn steamapps(&self) -> PathBuf {
        self.path.join("steamapps")
    }

    /// Installation roots also carry the users' shortcuts
    pub fn is_install(&self) -> bool {
        self.source == RootSource::Install
    }
}

// ============================================================================
// Installation Detection
// ============================================================================

/// Locations checked for a Steam installation, in priority order.
///
/// A configured `steam_path` replaces the platform defaults.
pub fn candidate_install_paths(config: &PluginConfig) -> Vec<PathBuf> {
    if let Some(path) = &config.steam_path {
        return vec![path.clone()];
    }

    let mut candidates = Vec::new();

    if let Some(home) = dirs::home_dir() {
        candidates.extend(HOME_STEAM_PATHS.iter().map(|rel| home.join(rel)));
    }

    #[cfg(windows)]
    {
        for var in ["ProgramFiles(x86)", "ProgramFiles"] {
            if let Some(dir) = std::env::var_os(var) {
                candidates.push(PathBuf::from(dir).join("Steam"));
            }
        }
        candidates.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
    }

    candidates
}

/// A Steam installation is any directory with a `steamapps` folder
pub fn is_valid_steam_path(path: &Path) -> bool {
    path.join("steamapps").is_dir()
}

/// Find all Steam installations among the candidates, without duplicates
pub fn find_steam_installations(candidates: &[PathBuf]) -> Vec<PathBuf> {
    let mut installs: Vec<PathBuf> = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();

    for path in candidates {
        if !is_valid_steam_path(path) {
            log_debug(&format!("No Steam installation at {}", path.display()));
            continue;
        }
        // Symlinks (~/.steam/steam -> ~/.local/share/Steam) point at the same install
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if seen.contains(&canonical) {
            continue;
        }
        log_scan(&format!("Found Steam installation: {}", path.display()));
        seen.push(canonical);
        installs.push(path.clone());
    }

    installs
}

// ============================================================================
// Library Discovery
// ============================================================================

/// Library folders listed by an installation (current and legacy locations)
pub fn library_folders(steam_path: &Path) -> Vec<PathBuf> {
    let mut folders = Vec::new();

    for vdf_path in [
        steam_path.join("steamapps/libraryfolders.vdf"),
        steam_path.join("config/libraryfolders.vdf"),
    ] {
        let Ok(content) = fs::read_to_string(&vdf_path) else {
            continue;
        };
        for path_str in parse_library_folders(&content) {
            let path = PathBuf::from(path_str);
            if !folders.contains(&path) {
                folders.push(path);
            }
        }
    }

    folders
}

/// A library root must have a `steamapps` directory we can list
fn is_readable_library(path: &Path) -> bool {
    fs::read_dir(path.join("steamapps")).is_ok()
}

/// Discover every library root for the configured environment.
///
/// Missing or unreadable library folders are skipped with a warning. Fails
/// only when not a single root is usable.
pub fn discover(config: &PluginConfig) -> Result<Vec<LibraryRoot>, DiscoveryError> {
    let candidates = candidate_install_paths(config);
    discover_from(&candidates, &config.extra_library_paths)
}

/// [`discover`] over an explicit candidate list
pub fn discover_from(
    candidates: &[PathBuf],
    extra_library_paths: &[PathBuf],
) -> Result<Vec<LibraryRoot>, DiscoveryError> {
    let mut roots: Vec<LibraryRoot> = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();

    let mut push_root = |root: LibraryRoot, roots: &mut Vec<LibraryRoot>| {
        let canonical = root.path.canonicalize().unwrap_or_else(|_| root.path.clone());
        if !seen.contains(&canonical) {
            seen.push(canonical);
            roots.push(root);
        }
    };

    let installs = find_steam_installations(candidates);

    for install in &installs {
        push_root(
            LibraryRoot {
                path: install.clone(),
                steam_root: Some(install.clone()),
                source: RootSource::Install,
            },
            &mut roots,
        );

        for folder in library_folders(install) {
            if !is_readable_library(&folder) {
                log_warning(&format!(
                    "Skipping library folder {} (missing or unreadable)",
                    folder.display()
                ));
                continue;
            }
            push_root(
                LibraryRoot {
                    path: folder,
                    steam_root: Some(install.clone()),
                    source: RootSource::LibraryFolders,
                },
                &mut roots,
            );
        }
    }

    for extra in extra_library_paths {
        if !is_readable_library(extra) {
            log_warning(&format!(
                "Skipping configured library {} (missing or unreadable)",
                extra.display()
            ));
            continue;
        }
        push_root(
            LibraryRoot {
                path: extra.clone(),
                steam_root: installs.first().cloned(),
                source: RootSource::Configured,
            },
            &mut roots,
        );
    }

    if roots.is_empty() {
        let mut searched = candidates.to_vec();
        searched.extend(extra_library_paths.iter().cloned());
        return Err(DiscoveryError::NotFound { searched });
    }

    log_scan(&format!("Discovered {} library root(s)", roots.len()));
    Ok(roots)
}
