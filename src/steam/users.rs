//! Steam login users
//!
//! Maps the accounts in config/loginusers.vdf to their userdata folders so
//! shortcuts can be read for the right profile.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::vdf::parse_vdf;

/// SteamID64 of account id 0 in the public universe
const STEAMID64_BASE: u64 = 76_561_197_960_265_728;

/// A Steam account that has logged in on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginUser {
    pub steam_id64: u64,
    pub most_recent: bool,
    pub timestamp: u64,
}

impl LoginUser {
    /// The 32-bit account id, which names the userdata folder
    pub fn account_id(&self) -> u32 {
        (self.steam_id64.wrapping_sub(STEAMID64_BASE) & 0xFFFF_FFFF) as u32
    }
}

/// Parse loginusers.vdf content
pub fn parse_login_users(content: &str) -> Vec<LoginUser> {
    let Some(root) = parse_vdf(content) else {
        return Vec::new();
    };
    let Some(users) = root.get("users") else {
        return Vec::new();
    };

    users
        .entries()
        .iter()
        .filter_map(|(id, user)| {
            let steam_id64 = id.parse::<u64>().ok()?;
            let flag = |key: &str| user.get_str(key).is_some_and(|v| v.trim() == "1");
            Some(LoginUser {
                steam_id64,
                // get() is case-insensitive, covering the lowercase "mostrecent" some clients write
                most_recent: flag("MostRecent"),
                timestamp: user
                    .get_str("Timestamp")
                    .and_then(|t| t.trim().parse().ok())
                    .unwrap_or(0),
            })
        })
        .collect()
}

/// Read loginusers.vdf from a Steam installation
pub fn login_users(steam_root: &Path) -> Vec<LoginUser> {
    fs::read_to_string(steam_root.join("config/loginusers.vdf"))
        .map(|content| parse_login_users(&content))
        .unwrap_or_default()
}

/// All numeric userdata/<account id> directories of an installation
pub fn userdata_dirs(steam_root: &Path) -> Vec<PathBuf> {
    let userdata = steam_root.join("userdata");

    let mut dirs: Vec<PathBuf> = WalkDir::new(&userdata)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) && name != "0"
        })
        .map(|e| e.into_path())
        .collect();

    dirs.sort();
    dirs
}

/// Pick the userdata directories whose shortcuts should be indexed
///
/// With `all_users` every profile is returned. Otherwise the most recent
/// login from loginusers.vdf that has a userdata directory wins; without
/// one, the most recently modified userdata directory is used.
pub fn shortcut_profiles(steam_root: &Path, all_users: bool) -> Vec<PathBuf> {
    let dirs = userdata_dirs(steam_root);
    if all_users || dirs.len() <= 1 {
        return dirs;
    }

    let userdata = steam_root.join("userdata");
    let preferred = login_users(steam_root)
        .into_iter()
        .map(|user| (userdata.join(user.account_id().to_string()), user))
        .filter(|(dir, _)| dirs.contains(dir))
        .max_by_key(|(_, user)| (user.most_recent, user.timestamp));

    if let Some((account_dir, _)) = preferred {
        return vec![account_dir];
    }

    let mut by_mtime = dirs;
    by_mtime.sort_by(|a, b| {
        let a_time = fs::metadata(a).and_then(|m| m.modified()).ok();
        let b_time = fs::metadata(b).and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });
    by_mtime.into_iter().take(1).collect()
}
