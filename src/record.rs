//! App records
//!
//! One [`AppRecord`] per launchable entity, whatever file it came from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Stable identifier of a record, unique within an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppId {
    /// Steam app id from the manifest
    Steam(u32),
    /// Synthesized from the shortcut's name and executable
    Shortcut(u64),
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppId::Steam(id) => write!(f, "steam:{}", id),
            AppId::Shortcut(id) => write!(f, "shortcut:{:016x}", id),
        }
    }
}

impl FromStr for AppId {
    type Err = String;

    /// Accepts `steam:<n>`, `shortcut:<hex>` and a bare Steam app id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(id) = s.strip_prefix("steam:") {
            return id
                .parse()
                .map(AppId::Steam)
                .map_err(|_| format!("invalid Steam app id: {}", id));
        }
        if let Some(id) = s.strip_prefix("shortcut:") {
            return u64::from_str_radix(id, 16)
                .map(AppId::Shortcut)
                .map_err(|_| format!("invalid shortcut id: {}", id));
        }
        s.parse()
            .map(AppId::Steam)
            .map_err(|_| format!("unrecognized app id: {}", s))
    }
}

/// How a record is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaunchKind {
    SteamApp,
    Shortcut,
}

impl LaunchKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            LaunchKind::SteamApp => "Steam game",
            LaunchKind::Shortcut => "Non-Steam shortcut",
        }
    }
}

/// What [`crate::launch`] needs to start a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LaunchTarget {
    SteamApp {
        app_id: u32,
    },
    Shortcut {
        exe: PathBuf,
        /// Program the executable runs under, e.g. `gamemoderun`
        #[serde(default)]
        wrapper: Vec<String>,
        args: Vec<String>,
        /// `KEY=VALUE` assignments that preceded `%command%`
        env: Vec<(String, String)>,
        start_dir: Option<PathBuf>,
    },
}

// ============================================================================
// Icon Slot
// ============================================================================

/// Per-record icon path, resolved at most once.
///
/// `hint` is the icon the source file declared (shortcuts only). The resolved
/// value is filled on first use by [`IconSlot::get_or_resolve`] and kept for
/// the lifetime of the record. A refresh carries it over with
/// [`IconSlot::adopt`]. Equality looks at the hint only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "IconSlotRepr", into = "IconSlotRepr")]
pub struct IconSlot {
    hint: Option<PathBuf>,
    resolved: OnceLock<Option<PathBuf>>,
}

#[derive(Clone, Serialize, Deserialize)]
struct IconSlotRepr {
    #[serde(default)]
    hint: Option<PathBuf>,
    #[serde(default)]
    resolved: Resolved,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Resolved {
    #[default]
    Pending,
    Missing,
    Found(PathBuf),
}

impl From<IconSlotRepr> for IconSlot {
    fn from(repr: IconSlotRepr) -> Self {
        let resolved = OnceLock::new();
        match repr.resolved {
            Resolved::Pending => {}
            Resolved::Missing => {
                let _ = resolved.set(None);
            }
            Resolved::Found(path) => {
                let _ = resolved.set(Some(path));
            }
        }
        Self {
            hint: repr.hint,
            resolved,
        }
    }
}

impl From<IconSlot> for IconSlotRepr {
    fn from(slot: IconSlot) -> Self {
        let resolved = match slot.resolved.into_inner() {
            None => Resolved::Pending,
            Some(None) => Resolved::Missing,
            Some(Some(path)) => Resolved::Found(path),
        };
        Self {
            hint: slot.hint,
            resolved,
        }
    }
}

impl PartialEq for IconSlot {
    fn eq(&self, other: &Self) -> bool {
        self.hint == other.hint
    }
}

impl Eq for IconSlot {}

impl IconSlot {
    pub fn with_hint(hint: Option<PathBuf>) -> Self {
        Self {
            hint,
            resolved: OnceLock::new(),
        }
    }

    pub fn hint(&self) -> Option<&Path> {
        self.hint.as_deref()
    }

    /// The resolved icon, if resolution has already happened
    pub fn resolved(&self) -> Option<Option<&Path>> {
        self.resolved.get().map(|p| p.as_deref())
    }

    /// Take over the icon `previous` found, if it declared the same hint and
    /// the file is still there. Misses are not taken over.
    pub fn adopt(&self, previous: &IconSlot) {
        if self.hint != previous.hint || self.resolved.get().is_some() {
            return;
        }
        if let Some(Some(path)) = previous.resolved.get() {
            if path.is_file() {
                let _ = self.resolved.set(Some(path.clone()));
            }
        }
    }

    /// Resolve once with `resolve`, then return the memoized result
    pub fn get_or_resolve<F>(&self, resolve: F) -> Option<&Path>
    where
        F: FnOnce(Option<&Path>) -> Option<PathBuf>,
    {
        self.resolved
            .get_or_init(|| resolve(self.hint.as_deref()))
            .as_deref()
    }
}

// ============================================================================
// App Record
// ============================================================================

/// One launchable entity in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    pub id: AppId,
    /// Display name; never empty once in an index
    pub name: String,
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub icon: IconSlot,
    pub launch: LaunchTarget,
}

impl AppRecord {
    pub fn kind(&self) -> LaunchKind {
        match self.launch {
            LaunchTarget::SteamApp { .. } => LaunchKind::SteamApp,
            LaunchTarget::Shortcut { .. } => LaunchKind::Shortcut,
        }
    }

    /// The Steam app id, for records Steam itself can open pages for
    pub fn steam_app_id(&self) -> Option<u32> {
        match self.launch {
            LaunchTarget::SteamApp { app_id } => Some(app_id),
            LaunchTarget::Shortcut { .. } => None,
        }
    }
}
