//! Starting records
//!
//! Steam apps are handed to the Steam client through a `steam://` URI;
//! shortcuts are spawned directly. Nothing here waits for a game to exit.

use std::io::ErrorKind;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::LaunchError;
use crate::logging::{log_debug, log_launch};
use crate::record::{AppRecord, LaunchTarget};

/// Platform URI openers, tried in order: (program, leading args)
#[cfg(all(unix, not(target_os = "macos")))]
const URI_OPENERS: &[(&str, &[&str])] = &[("xdg-open", &[]), ("gio", &["open"])];

#[cfg(target_os = "macos")]
const URI_OPENERS: &[(&str, &[&str])] = &[("open", &[])];

#[cfg(windows)]
const URI_OPENERS: &[(&str, &[&str])] = &[("cmd", &["/C", "start", ""])];

/// Steam client pages reachable for an installed app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteamPage {
    Store,
    News,
    Uninstall,
}

impl SteamPage {
    pub const ALL: [SteamPage; 3] = [SteamPage::Store, SteamPage::News, SteamPage::Uninstall];

    pub fn title(&self) -> &'static str {
        match self {
            SteamPage::Store => "Show in Steam store",
            SteamPage::News => "Show news",
            SteamPage::Uninstall => "Uninstall game",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SteamPage::Store => "Opens the game's Steam store page",
            SteamPage::News => "Opens the game's news page in Steam",
            SteamPage::Uninstall => "Uninstall this game from your Steam library",
        }
    }

    fn uri_path(&self) -> &'static str {
        match self {
            SteamPage::Store => "store",
            SteamPage::News => "appnews",
            SteamPage::Uninstall => "uninstall",
        }
    }
}

/// `steam://rungameid/<id>`
pub fn run_uri(app_id: u32) -> String {
    format!("steam://rungameid/{}", app_id)
}

pub fn page_uri(app_id: u32, page: SteamPage) -> String {
    format!("steam://{}/{}", page.uri_path(), app_id)
}

/// Start a record
pub fn launch(record: &AppRecord) -> Result<(), LaunchError> {
    match &record.launch {
        LaunchTarget::SteamApp { app_id } => {
            log_launch(&format!("Launching {} via Steam", record.name));
            open_uri(&run_uri(*app_id))
        }
        LaunchTarget::Shortcut {
            exe,
            wrapper,
            args,
            env,
            start_dir,
        } => {
            log_launch(&format!("Launching shortcut {}: {}", record.name, exe.display()));
            spawn_shortcut(exe, wrapper, args, env, start_dir.as_deref())
        }
    }
}

/// Open one of Steam's pages for `app_id`
pub fn open_steam_page(app_id: u32, page: SteamPage) -> Result<(), LaunchError> {
    log_launch(&format!("Opening Steam {:?} page for app {}", page, app_id));
    open_uri(&page_uri(app_id, page))
}

/// An executable is either a path to a file or a bare program name on `PATH`
fn executable_exists(exe: &Path) -> bool {
    if exe.components().count() > 1 || exe.is_absolute() {
        return exe.is_file();
    }
    exe.is_file() || which_on_path(exe)
}

fn which_on_path(program: &Path) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

/// Runs `wrapper.. exe args..`; the executable itself must exist either way
fn spawn_shortcut(
    exe: &Path,
    wrapper: &[String],
    args: &[String],
    env: &[(String, String)],
    start_dir: Option<&Path>,
) -> Result<(), LaunchError> {
    if !executable_exists(exe) {
        return Err(LaunchError::MissingExecutable {
            path: exe.to_path_buf(),
        });
    }

    let mut command = match wrapper.split_first() {
        Some((program, leading)) => {
            let mut command = Command::new(program);
            command.args(leading).arg(exe);
            command
        }
        None => Command::new(exe),
    };
    command
        .args(args)
        .envs(env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    match start_dir.filter(|dir| dir.is_dir()) {
        Some(dir) => {
            command.current_dir(dir);
        }
        None => {
            if let Some(parent) = exe.parent().filter(|p| p.is_dir()) {
                command.current_dir(parent);
            }
        }
    }

    let target = match wrapper.first() {
        Some(program) => format!("{} {}", program, exe.display()),
        None => exe.display().to_string(),
    };
    let child = command.spawn().map_err(|source| LaunchError::Spawn {
        target,
        source,
    })?;
    reap(child);
    Ok(())
}

fn open_uri(uri: &str) -> Result<(), LaunchError> {
    for (program, leading) in URI_OPENERS {
        let spawned = Command::new(program)
            .args(*leading)
            .arg(uri)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                log_debug(&format!("Opened {} with {}", uri, program));
                reap(child);
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log_debug(&format!("{} not available", program));
            }
            Err(source) => {
                return Err(LaunchError::Spawn {
                    target: uri.to_string(),
                    source,
                })
            }
        }
    }

    Err(LaunchError::NoUriOpener {
        uri: uri.to_string(),
    })
}

/// Wait for a child on a detached thread so it does not linger as a zombie
fn reap(mut child: Child) {
    let _ = thread::Builder::new()
        .name("steam-search-reap".to_string())
        .spawn(move || {
            let _ = child.wait();
        });
}
