//! Steam on-disk state
//!
//! Locates Steam installations and library folders, and reads the files
//! Steam keeps about installed apps, login users and non-Steam shortcuts.

pub mod paths;
pub mod shortcuts;
pub mod users;
pub mod vdf;

pub use paths::{
    candidate_install_paths, discover, discover_from, find_steam_installations, is_valid_steam_path,
    library_folders, LibraryRoot, RootSource,
};
pub use shortcuts::{Shortcut, ShortcutsVdf};
pub use users::{login_users, shortcut_profiles, LoginUser};
pub use vdf::{parse_library_folders, parse_vdf, AppManifest, VdfValue};
