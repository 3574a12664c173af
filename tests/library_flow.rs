//! Discovery, refresh, search and launch over a fake Steam tree

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use steam_search::steam::{Shortcut, ShortcutsVdf};
use steam_search::{
    search, ActionToken, AppId, IndexHandle, LaunchError, LaunchTarget, MatchKind, PluginConfig,
    RefreshOutcome, Refresher, SteamSearch,
};
use tempfile::TempDir;

struct FakeSteam {
    tmp: TempDir,
}

impl FakeSteam {
    fn new() -> Self {
        let fake = Self {
            tmp: TempDir::new().unwrap(),
        };
        fs::create_dir_all(fake.steam().join("steamapps")).unwrap();
        fs::create_dir_all(fake.library().join("steamapps")).unwrap();
        fs::write(
            fake.steam().join("steamapps/libraryfolders.vdf"),
            format!(
                "\"libraryfolders\"\n{{\n\t\"0\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n\t\"1\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n}}\n",
                fake.steam().display(),
                fake.library().display()
            ),
        )
        .unwrap();
        fake
    }

    fn steam(&self) -> PathBuf {
        self.tmp.path().join("Steam")
    }

    fn library(&self) -> PathBuf {
        self.tmp.path().join("Games")
    }

    fn config(&self) -> PluginConfig {
        PluginConfig {
            steam_path: Some(self.steam()),
            index_cache_path: Some(self.tmp.path().join("data/index_cache.json")),
            refresh_interval_secs: 0,
            ..Default::default()
        }
    }

    fn add_manifest(&self, library: &Path, app_id: u32, name: &str) {
        fs::write(
            library.join(format!("steamapps/appmanifest_{}.acf", app_id)),
            format!(
                "\"AppState\"\n{{\n\t\"appid\"\t\t\"{}\"\n\t\"Universe\"\t\t\"1\"\n\t\"name\"\t\t\"{}\"\n\t\"StateFlags\"\t\t\"4\"\n\t\"installdir\"\t\t\"{}\"\n}}\n",
                app_id, name, name
            ),
        )
        .unwrap();
    }

    fn set_shortcuts(&self, shortcuts: &[Shortcut]) {
        let config_dir = self.steam().join("userdata/31337/config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("shortcuts.vdf"), ShortcutsVdf::encode(shortcuts)).unwrap();
    }

    fn tool_exe(&self) -> PathBuf {
        let exe = self.tmp.path().join("tools/editor.sh");
        fs::create_dir_all(exe.parent().unwrap()).unwrap();
        fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
        exe
    }
}

fn shortcut(name: &str, exe: &Path) -> Shortcut {
    Shortcut {
        app_name: name.to_string(),
        exe: format!("\"{}\"", exe.display()),
        ..Default::default()
    }
}

fn refreshed(config: PluginConfig) -> Refresher {
    let refresher = Refresher::new(config, IndexHandle::default());
    match refresher.refresh().unwrap() {
        RefreshOutcome::Completed(_) => refresher,
        RefreshOutcome::Coalesced => panic!("nothing else is refreshing"),
    }
}

fn is_subsequence(query: &str, name: &str) -> bool {
    let mut name_chars = name.chars().flat_map(char::to_lowercase);
    query
        .chars()
        .flat_map(char::to_lowercase)
        .all(|qc| name_chars.any(|nc| nc == qc))
}

#[test]
fn discover_refresh_search_launch() {
    let fake = FakeSteam::new();
    fake.add_manifest(&fake.steam(), 400, "Portal");
    fake.add_manifest(&fake.library(), 620, "Portal 2");
    fake.add_manifest(&fake.library(), 70, "Half-Life");
    fs::write(
        fake.library().join("steamapps/appmanifest_999.acf"),
        "\"AppState\"\n{\n\t\"name\"\t\t\"Broken\"\n}\n",
    )
    .unwrap();
    let exe = fake.tool_exe();
    fake.set_shortcuts(&[shortcut("Level Editor", &exe)]);

    let plugin = SteamSearch::without_worker(fake.config());
    let report = match plugin.refresh_blocking().unwrap() {
        RefreshOutcome::Completed(report) => report,
        RefreshOutcome::Coalesced => panic!("nothing else is refreshing"),
    };
    assert_eq!(report.roots, 2);
    assert_eq!(report.records, 4);
    assert_eq!(report.skipped.len(), 1);

    let index = plugin.index();
    assert!(index.get(&AppId::Steam(999)).is_none());

    let matches = search("portal", &index);
    let names: Vec<_> = matches.iter().map(|m| m.record.name.as_str()).collect();
    assert_eq!(names, vec!["Portal", "Portal 2"]);
    assert_eq!(matches[0].kind, MatchKind::Exact);

    let editor = search("lvl ed", &index)
        .first()
        .map(|m| m.record.clone())
        .unwrap();
    assert_eq!(editor.name, "Level Editor");
    assert!(matches!(&editor.launch, LaunchTarget::Shortcut { exe: e, .. } if *e == exe));

    // The shortcut's executable disappears between indexing and launch
    fs::remove_file(&exe).unwrap();
    let err = plugin
        .activate(&ActionToken::Launch { id: editor.id })
        .unwrap_err();
    assert!(matches!(err, LaunchError::MissingExecutable { .. }));
}

#[test]
fn wrapped_shortcut_with_deleted_executable_fails_to_launch() {
    let fake = FakeSteam::new();
    let exe = fake.tool_exe();
    fake.set_shortcuts(&[Shortcut {
        launch_options: "env %command%".to_string(),
        ..shortcut("Wrapped Tool", &exe)
    }]);

    let plugin = SteamSearch::without_worker(fake.config());
    plugin.refresh_blocking().unwrap();
    let items = plugin.query("wrapped");
    assert_eq!(items.len(), 1);

    fs::remove_file(&exe).unwrap();
    let err = plugin.activate(&items[0].action).unwrap_err();
    assert!(matches!(err, LaunchError::MissingExecutable { path } if path == exe));
}

#[test]
fn icons_found_by_a_query_survive_refresh() {
    let fake = FakeSteam::new();
    fake.add_manifest(&fake.steam(), 400, "Portal");
    let librarycache = fake.steam().join("appcache/librarycache");
    fs::create_dir_all(&librarycache).unwrap();
    fs::write(librarycache.join("400_icon.jpg"), b"jpg").unwrap();

    let plugin = SteamSearch::without_worker(fake.config());
    plugin.refresh_blocking().unwrap();
    let before = plugin.index();
    let icon = plugin.query("portal")[0].icon_path.clone();
    assert!(icon.as_deref().is_some_and(|p| p.ends_with("400_icon.jpg")));

    plugin.refresh_blocking().unwrap();
    let after = plugin.index();
    assert_eq!(*before, *after);
    let resolved = after.get(&AppId::Steam(400)).unwrap().icon.resolved();
    assert_eq!(
        resolved.flatten().map(|p| p.display().to_string()),
        icon
    );
}

#[test]
fn refresh_twice_gives_equal_index() {
    let fake = FakeSteam::new();
    fake.add_manifest(&fake.steam(), 400, "Portal");
    fake.add_manifest(&fake.library(), 620, "Portal 2");
    fake.set_shortcuts(&[shortcut("Editor", &fake.tool_exe())]);

    let refresher = refreshed(fake.config());
    let first = refresher.handle().snapshot();
    refresher.refresh().unwrap();
    let second = refresher.handle().snapshot();

    assert_eq!(*first, *second);
    assert_eq!(second.len(), 3);
}

#[test]
fn shortcut_ids_survive_reordering() {
    let fake = FakeSteam::new();
    let exe = fake.tool_exe();
    let a = shortcut("Alpha", &exe);
    let b = shortcut("Beta", &exe);

    fake.set_shortcuts(&[a.clone(), b.clone()]);
    let mut before: Vec<AppId> = refreshed(fake.config())
        .handle()
        .snapshot()
        .records()
        .iter()
        .map(|r| r.id)
        .collect();

    fake.set_shortcuts(&[b, a]);
    let mut after: Vec<AppId> = refreshed(fake.config())
        .handle()
        .snapshot()
        .records()
        .iter()
        .map(|r| r.id)
        .collect();

    before.sort();
    after.sort();
    assert_eq!(before, after);
    assert_eq!(before.len(), 2);
}

#[test]
fn every_match_contains_the_query_in_order() {
    let fake = FakeSteam::new();
    for (i, name) in [
        "Portal",
        "Portal 2",
        "Half-Life 2: Episode One",
        "The Elder Scrolls V: Skyrim",
        "Counter-Strike 2",
        "Stardew Valley",
        "RimWorld",
    ]
    .iter()
    .enumerate()
    {
        fake.add_manifest(&fake.steam(), 100 + i as u32, name);
    }
    let refresher = refreshed(fake.config());
    let index = refresher.handle().snapshot();

    for query in ["p", "po2", "hl2", "tesv", "cs", "sv", "rw", "e", "ky", "zz", " "] {
        for m in search(query, &index) {
            assert!(
                is_subsequence(query, &m.record.name),
                "{:?} matched {:?}",
                query,
                m.record.name
            );
        }
    }
    assert_eq!(search("", &index).len(), index.len());
}

#[test]
fn searches_never_see_a_partial_index() {
    let fake = FakeSteam::new();
    for app_id in 1..=20 {
        fake.add_manifest(&fake.steam(), app_id, &format!("Game {}", app_id));
    }
    let refresher = Arc::new(refreshed(fake.config()));
    let old_ids: Vec<AppId> = (1..=20).map(AppId::Steam).collect();
    let new_ids: Vec<AppId> = (1..=60).map(AppId::Steam).collect();
    for app_id in 21..=60 {
        fake.add_manifest(&fake.library(), app_id, &format!("Game {}", app_id));
    }

    let readers: Vec<_> = (0..10)
        .map(|_| {
            let handle = refresher.handle().clone();
            thread::spawn(move || {
                (0..10)
                    .map(|_| {
                        let snapshot = handle.snapshot();
                        let mut ids: Vec<AppId> =
                            search("game", &snapshot).iter().map(|m| m.record.id).collect();
                        ids.sort();
                        thread::yield_now();
                        ids
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    refresher.refresh().unwrap();

    for reader in readers {
        for ids in reader.join().unwrap() {
            assert!(ids == old_ids || ids == new_ids, "saw {} records", ids.len());
        }
    }
    assert_eq!(refresher.handle().snapshot().len(), 60);
}

#[test]
fn corrupt_cache_is_replaced_after_refresh() {
    let fake = FakeSteam::new();
    fake.add_manifest(&fake.steam(), 400, "Portal");
    let config = fake.config();
    fs::create_dir_all(config.cache_path().parent().unwrap()).unwrap();
    fs::write(config.cache_path(), "{ truncated").unwrap();

    let plugin = SteamSearch::without_worker(config.clone());
    assert!(plugin.index().is_empty());
    plugin.refresh_blocking().unwrap();

    let restarted = SteamSearch::without_worker(config);
    assert_eq!(restarted.query("portal").len(), 1);
}

#[test]
fn background_worker_serves_queries() {
    let fake = FakeSteam::new();
    fake.add_manifest(&fake.steam(), 400, "Portal");

    let plugin = SteamSearch::start(fake.config()).unwrap();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while plugin.index().is_empty() && std::time::Instant::now() < deadline {
        thread::sleep(std::time::Duration::from_millis(10));
    }
    assert_eq!(plugin.query("port").len(), 1);
    plugin.shutdown();
}
