//! App manifest and shortcut scanning
//!
//! Turns one library root into [`AppRecord`]s. Manifests and shortcuts are
//! parsed into a [`ParsedEntry`] first and normalized by a single conversion,
//! so both sources follow the same naming and identity rules.
//!
//! Nothing in here fails for a whole root: every unreadable or malformed
//! file, and every unusable entry, becomes a [`ParseSkip`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::PluginConfig;
use crate::error::{ParseSkip, SkipReason};
use crate::logging::{log_debug, log_warning};
use crate::record::{AppId, AppRecord, IconSlot, LaunchTarget};
use crate::steam::users::shortcut_profiles;
use crate::steam::{AppManifest, LibraryRoot, Shortcut, ShortcutsVdf};

/// Scan behaviour taken from the plugin config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub installed_only: bool,
    pub include_shortcuts: bool,
    pub shortcuts_all_users: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&PluginConfig::default())
    }
}

impl From<&PluginConfig> for ScanOptions {
    fn from(config: &PluginConfig) -> Self {
        Self {
            installed_only: config.installed_only,
            include_shortcuts: config.include_shortcuts,
            shortcuts_all_users: config.shortcuts_all_users,
        }
    }
}

// ============================================================================
// Parsed Entries
// ============================================================================

/// An appmanifest_*.acf entry and the steamapps folder it was found in
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub manifest: AppManifest,
    pub steamapps: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ShortcutEntry {
    pub shortcut: Shortcut,
}

/// One entry read from any of Steam's files
#[derive(Debug, Clone)]
pub enum ParsedEntry {
    Manifest(ManifestEntry),
    Shortcut(ShortcutEntry),
}

impl ParsedEntry {
    /// Normalize into an index record; the only place records are created
    pub fn into_record(self) -> Result<AppRecord, SkipReason> {
        match self {
            ParsedEntry::Manifest(entry) => {
                let name = normalize_name(&entry.manifest.name).ok_or(SkipReason::EmptyName)?;
                let app_id = entry.manifest.app_id;
                Ok(AppRecord {
                    id: AppId::Steam(app_id),
                    name,
                    install_dir: entry
                        .manifest
                        .install_dir
                        .map(|dir| entry.steamapps.join("common").join(dir)),
                    icon: IconSlot::default(),
                    launch: LaunchTarget::SteamApp { app_id },
                })
            }
            ParsedEntry::Shortcut(entry) => {
                let shortcut = entry.shortcut;
                let name = normalize_name(&shortcut.app_name).ok_or(SkipReason::EmptyName)?;
                let exe = strip_quotes(&shortcut.exe);
                if exe.is_empty() {
                    return Err(SkipReason::MissingField("Exe"));
                }
                let start_dir = Some(strip_quotes(&shortcut.start_dir))
                    .filter(|d| !d.is_empty())
                    .map(PathBuf::from);
                let icon = Some(strip_quotes(&shortcut.icon))
                    .filter(|i| !i.is_empty())
                    .map(PathBuf::from);
                let options = split_launch_options(&shortcut.launch_options);

                Ok(AppRecord {
                    id: AppId::Shortcut(shortcut_id(&name, &exe)),
                    install_dir: start_dir.clone(),
                    name,
                    icon: IconSlot::with_hint(icon),
                    launch: LaunchTarget::Shortcut {
                        exe: PathBuf::from(exe),
                        wrapper: options.wrapper,
                        args: options.args,
                        env: options.env,
                        start_dir,
                    },
                })
            }
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Display name cleanup: drop control characters and trim. Escapes were
/// already decoded by the VDF reader. Returns `None` when nothing is left.
pub fn normalize_name(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Steam stores shortcut paths wrapped in quotes
fn strip_quotes(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

/// Stable shortcut identity: the first 8 bytes of SHA-256(name NUL exe)
pub fn shortcut_id(name: &str, exe: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(exe.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Split a command line into words, honoring single and double quotes
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => match chars.next() {
                Some(next @ ('"' | '\\')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }

    words
}

fn is_env_assignment(word: &str) -> Option<(String, String)> {
    let (key, value) = word.split_once('=')?;
    let valid_key = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid_key.then(|| (key.to_string(), value.to_string()))
}

/// A shortcut's launch options, split up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Program and arguments placed in front of the executable
    pub wrapper: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Split a shortcut's launch options.
///
/// Without `%command%` the options are plain arguments. With it, leading
/// `KEY=VALUE` words become environment, any other words before it wrap the
/// executable (`gamemoderun %command%`), and words after it are arguments.
pub fn split_launch_options(options: &str) -> LaunchOptions {
    let words = split_words(options);

    let Some(pos) = words.iter().position(|w| w == "%command%") else {
        return LaunchOptions {
            args: words,
            ..Default::default()
        };
    };

    let mut env = Vec::new();
    let mut wrapper = Vec::new();
    for word in &words[..pos] {
        match is_env_assignment(word) {
            Some(pair) if wrapper.is_empty() => env.push(pair),
            _ => wrapper.push(word.clone()),
        }
    }

    LaunchOptions {
        wrapper,
        args: words[pos + 1..].to_vec(),
        env,
    }
}

// ============================================================================
// Source Memo
// ============================================================================

/// Identifies one version of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

#[derive(Debug, Clone)]
struct MemoEntry {
    fingerprint: Fingerprint,
    records: Vec<AppRecord>,
    skipped: Vec<ParseSkip>,
}

/// Records produced by each source file on the previous scan.
///
/// A file whose modification time and size are unchanged reuses its records
/// as a whole; any change reparses the file and replaces all of them.
#[derive(Debug, Clone, Default)]
pub struct SourceMemo {
    files: HashMap<PathBuf, MemoEntry>,
}

impl SourceMemo {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Keep only the files under `root`
    pub fn for_root(&self, root: &LibraryRoot) -> SourceMemo {
        let steam_root = root.steam_root.as_deref();
        SourceMemo {
            files: self
                .files
                .iter()
                .filter(|(path, _)| {
                    path.starts_with(&root.path) || steam_root.is_some_and(|s| path.starts_with(s))
                })
                .map(|(path, entry)| (path.clone(), entry.clone()))
                .collect(),
        }
    }

    pub fn merge(&mut self, other: SourceMemo) {
        self.files.extend(other.files);
    }
}

// ============================================================================
// Root Scanning
// ============================================================================

/// Everything one root produced
#[derive(Debug, Clone, Default)]
pub struct RootScan {
    /// Records in scan order: manifests by file name, then shortcuts
    pub records: Vec<AppRecord>,
    pub skipped: Vec<ParseSkip>,
    /// Source files read from disk this time (not served from the memo)
    pub reparsed: usize,
    pub memo: SourceMemo,
}

/// Parse one library root from scratch
pub fn parse(root: &LibraryRoot, options: &ScanOptions) -> Vec<AppRecord> {
    scan_root(root, options, &SourceMemo::default()).records
}

/// Parse one library root, reusing `previous` for unchanged files
pub fn scan_root(root: &LibraryRoot, options: &ScanOptions, previous: &SourceMemo) -> RootScan {
    let mut scan = RootScan::default();

    for manifest_path in manifest_files(&root.steamapps()) {
        scan_source(&mut scan, previous, &manifest_path, |path| {
            parse_manifest_file(path, &root.steamapps(), options)
        });
    }

    if options.include_shortcuts && root.is_install() {
        if let Some(steam_root) = &root.steam_root {
            for profile in shortcut_profiles(steam_root, options.shortcuts_all_users) {
                let shortcuts_path = profile.join("config/shortcuts.vdf");
                if !shortcuts_path.is_file() {
                    continue;
                }
                scan_source(&mut scan, previous, &shortcuts_path, parse_shortcuts_file);
            }
        }
    }

    scan
}

fn scan_source<F>(scan: &mut RootScan, previous: &SourceMemo, path: &Path, parse_file: F)
where
    F: FnOnce(&Path) -> (Vec<AppRecord>, Vec<ParseSkip>),
{
    let fingerprint = Fingerprint::of(path);

    let entry = match (fingerprint, previous.files.get(path)) {
        (Some(fp), Some(memo)) if memo.fingerprint == fp => memo.clone(),
        _ => {
            let (records, skipped) = parse_file(path);
            scan.reparsed += 1;
            for skip in &skipped {
                log_warning(&format!("Skipped {}", skip));
            }
            match fingerprint {
                Some(fingerprint) => MemoEntry {
                    fingerprint,
                    records,
                    skipped,
                },
                // Vanished while scanning; use the result but do not memoize it
                None => {
                    scan.records.extend(records);
                    scan.skipped.extend(skipped);
                    return;
                }
            }
        }
    };

    scan.records.extend(entry.records.iter().cloned());
    scan.skipped.extend(entry.skipped.iter().cloned());
    scan.memo.files.insert(path.to_path_buf(), entry);
}

/// appmanifest_*.acf files in a steamapps folder, sorted by name
fn manifest_files(steamapps: &Path) -> Vec<PathBuf> {
    WalkDir::new(steamapps)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with("appmanifest_") && n.ends_with(".acf"))
        })
        .map(|e| e.into_path())
        .collect()
}

fn parse_manifest_file(
    path: &Path,
    steamapps: &Path,
    options: &ScanOptions,
) -> (Vec<AppRecord>, Vec<ParseSkip>) {
    let skip = |reason: SkipReason| -> (Vec<AppRecord>, Vec<ParseSkip>) {
        (Vec::new(), vec![ParseSkip::new(path, reason)])
    };

    let content = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => return skip(SkipReason::Unreadable(e.to_string())),
    };
    let manifest = match AppManifest::from_vdf(&content) {
        Ok(manifest) => manifest,
        Err(reason) => return skip(reason),
    };
    if options.installed_only && !manifest.is_installed() {
        log_debug(&format!("{} is not fully installed", manifest.name));
        return skip(SkipReason::NotInstalled);
    }

    let entry = ParsedEntry::Manifest(ManifestEntry {
        manifest,
        steamapps: steamapps.to_path_buf(),
    });
    match entry.into_record() {
        Ok(record) => (vec![record], Vec::new()),
        Err(reason) => skip(reason),
    }
}

fn parse_shortcuts_file(path: &Path) -> (Vec<AppRecord>, Vec<ParseSkip>) {
    let vdf = match ShortcutsVdf::load(path) {
        Ok(vdf) => vdf,
        Err(e) => {
            return (
                Vec::new(),
                vec![ParseSkip::new(path, SkipReason::Unreadable(e.to_string()))],
            )
        }
    };

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for shortcut in vdf.shortcuts {
        if shortcut.is_hidden {
            skipped.push(ParseSkip::new(path, SkipReason::Hidden));
            continue;
        }
        match ParsedEntry::Shortcut(ShortcutEntry { shortcut }).into_record() {
            Ok(record) => records.push(record),
            Err(reason) => skipped.push(ParseSkip::new(path, reason)),
        }
    }
    if vdf.truncated {
        skipped.push(ParseSkip::new(path, SkipReason::Malformed));
    }

    (records, skipped)
}
