//! App index
//!
//! The [`Index`] is an immutable collection of records. The live one sits
//! behind an [`IndexHandle`]; a refresh builds a complete new index on the
//! side and replaces the handle's `Arc` in one step, so a search always runs
//! against a single consistent snapshot.

mod cache;
mod worker;

pub use cache::SnapshotCache;
pub use worker::RefreshWorker;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::{Mutex, RwLock};

use crate::config::PluginConfig;
use crate::error::{ParseSkip, RefreshError};
use crate::logging::{log_debug, log_error, log_scan, log_warning};
use crate::record::{AppId, AppRecord};
use crate::scanner::{scan_root, RootScan, ScanOptions, SourceMemo};
use crate::steam::{self, LibraryRoot};

// ============================================================================
// Index
// ============================================================================

/// All discovered records, in scan order
#[derive(Debug, Clone, Default)]
pub struct Index {
    records: Vec<AppRecord>,
    positions: HashMap<AppId, usize>,
    steam_roots: Vec<PathBuf>,
    generation: u64,
}

impl Index {
    /// Build from records in scan order. When an id repeats, the first wins.
    pub fn from_records(records: Vec<AppRecord>, steam_roots: Vec<PathBuf>) -> Self {
        let mut kept = Vec::with_capacity(records.len());
        let mut positions = HashMap::with_capacity(records.len());

        for record in records {
            if positions.contains_key(&record.id) {
                log_debug(&format!(
                    "Duplicate {} (\"{}\") ignored; already indexed",
                    record.id, record.name
                ));
                continue;
            }
            positions.insert(record.id, kept.len());
            kept.push(record);
        }

        Self {
            records: kept,
            positions,
            steam_roots,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in scan order
    pub fn records(&self) -> &[AppRecord] {
        &self.records
    }

    pub fn get(&self, id: &AppId) -> Option<&AppRecord> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    /// Steam installations the records were read from
    pub fn steam_roots(&self) -> &[PathBuf] {
        &self.steam_roots
    }

    /// Keep icons already resolved in `previous` for records present in both
    pub fn adopt_icons(&self, previous: &Index) {
        for record in &self.records {
            if let Some(old) = previous.get(&record.id) {
                record.icon.adopt(&old.icon);
            }
        }
    }

    /// Number of swaps that preceded this index in its handle
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

// ============================================================================
// Index Handle
// ============================================================================

/// Shared, atomically replaceable reference to the current index
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<Index>>>,
}

impl IndexHandle {
    pub fn new(index: Index) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The index as of now; unaffected by later swaps
    pub fn snapshot(&self) -> Arc<Index> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current index and return the installed one
    pub fn swap(&self, mut index: Index) -> Arc<Index> {
        let mut current = self.current.write();
        index.generation = current.generation + 1;
        let installed = Arc::new(index);
        *current = Arc::clone(&installed);
        installed
    }
}

// ============================================================================
// Refresh
// ============================================================================

/// Scans one library root; swapped out in tests
pub trait RootScanner: Send + Sync + 'static {
    fn scan(&self, root: &LibraryRoot, options: &ScanOptions, previous: &SourceMemo) -> RootScan;
}

/// Reads manifests and shortcuts from disk
#[derive(Debug, Default)]
pub struct FsScanner;

impl RootScanner for FsScanner {
    fn scan(&self, root: &LibraryRoot, options: &ScanOptions, previous: &SourceMemo) -> RootScan {
        scan_root(root, options, previous)
    }
}

/// What a completed refresh did
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub roots: usize,
    pub records: usize,
    pub skipped: Vec<ParseSkip>,
    /// Roots left out because their scan exceeded the timeout
    pub timed_out: Vec<PathBuf>,
    /// Source files read from disk rather than reused
    pub reparsed: usize,
    /// Times the scan was abandoned and restarted on host request
    pub restarts: usize,
    pub generation: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// Another refresh was already running and will cover this request
    Coalesced,
}

/// Result of scanning every root, before it becomes an index
struct Built {
    index: Index,
    memo: SourceMemo,
    report: RefreshReport,
}

/// Marks a root as being scanned until dropped
struct BusyRoot {
    roots: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl BusyRoot {
    /// `None` while an earlier scan of the same root is still running
    fn claim(roots: &Arc<Mutex<HashSet<PathBuf>>>, path: &Path) -> Option<Self> {
        if !roots.lock().insert(path.to_path_buf()) {
            return None;
        }
        Some(Self {
            roots: Arc::clone(roots),
            path: path.to_path_buf(),
        })
    }
}

impl Drop for BusyRoot {
    fn drop(&mut self) {
        self.roots.lock().remove(&self.path);
    }
}

/// Clears the in-flight flag however the refresh ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builds indexes and installs them into an [`IndexHandle`].
///
/// At most one refresh runs at a time; a concurrent call returns
/// [`RefreshOutcome::Coalesced`] immediately.
pub struct Refresher {
    config: PluginConfig,
    handle: IndexHandle,
    cache: SnapshotCache,
    scanner: Arc<dyn RootScanner>,
    memo: Mutex<SourceMemo>,
    in_flight: AtomicBool,
    restart: AtomicBool,
    scans_started: AtomicUsize,
    /// Roots whose scan thread has not returned yet, including abandoned ones
    busy_roots: Arc<Mutex<HashSet<PathBuf>>>,
    last_error: Mutex<Option<RefreshError>>,
}

impl Refresher {
    pub fn new(config: PluginConfig, handle: IndexHandle) -> Self {
        Self::with_scanner(config, handle, Arc::new(FsScanner))
    }

    pub fn with_scanner(config: PluginConfig, handle: IndexHandle, scanner: Arc<dyn RootScanner>) -> Self {
        let cache = SnapshotCache::new(config.cache_path());
        Self {
            config,
            handle,
            cache,
            scanner,
            memo: Mutex::new(SourceMemo::default()),
            in_flight: AtomicBool::new(false),
            restart: AtomicBool::new(false),
            scans_started: AtomicUsize::new(0),
            busy_roots: Arc::new(Mutex::new(HashSet::new())),
            last_error: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Error of the most recent refresh, cleared by the next success
    pub fn last_error(&self) -> Option<RefreshError> {
        self.last_error.lock().clone()
    }

    /// Ask a running refresh to drop its partial scan and start over.
    ///
    /// Returns false when no refresh is running. A refresh that has already
    /// finished scanning completes its swap regardless.
    pub fn request_restart(&self) -> bool {
        if !self.is_refreshing() {
            return false;
        }
        self.restart.store(true, Ordering::Release);
        true
    }

    /// Rebuild the index from disk and swap it in.
    ///
    /// On failure the current index and snapshot are left untouched.
    pub fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log_debug("Refresh already running; request coalesced");
            return Ok(RefreshOutcome::Coalesced);
        }
        let _in_flight = InFlight(&self.in_flight);

        let started = Instant::now();
        let mut restarts = 0;

        let built = loop {
            self.restart.store(false, Ordering::Release);
            match self.build() {
                Ok(Some(built)) => break built,
                Ok(None) => {
                    restarts += 1;
                    log_scan("Refresh superseded by a newer request; restarting scan");
                }
                Err(e) => {
                    log_warning(&format!("Refresh failed, keeping previous index: {}", e));
                    *self.last_error.lock() = Some(e.clone());
                    return Err(e);
                }
            }
        };

        // Past this point the refresh always completes
        let Built {
            index,
            memo,
            mut report,
        } = built;
        index.adopt_icons(&self.handle.snapshot());
        let installed = self.handle.swap(index);
        *self.memo.lock() = memo;
        *self.last_error.lock() = None;

        if let Err(e) = self.cache.save(&installed) {
            log_error(&format!("Failed to persist index cache: {}", e));
        }

        report.generation = installed.generation();
        report.restarts = restarts;
        report.duration = started.elapsed();
        log_scan(&format!(
            "Indexed {} record(s) from {} root(s) in {:?} ({} skipped, {} timed out)",
            report.records,
            report.roots,
            report.duration,
            report.skipped.len(),
            report.timed_out.len()
        ));

        Ok(RefreshOutcome::Completed(report))
    }

    /// Scan everything into a new index. `Ok(None)` means a restart was requested.
    fn build(&self) -> Result<Option<Built>, RefreshError> {
        let roots = steam::discover(&self.config)?;
        let options = ScanOptions::from(&self.config);
        let previous = self.memo.lock().clone();

        let mut records = Vec::new();
        let mut memo = SourceMemo::default();
        let mut report = RefreshReport {
            roots: roots.len(),
            ..Default::default()
        };

        for root in &roots {
            if self.restart.load(Ordering::Acquire) {
                return Ok(None);
            }

            match self.scan_with_timeout(root, &options, previous.for_root(root)) {
                Some(scan) => {
                    report.reparsed += scan.reparsed;
                    report.skipped.extend(scan.skipped);
                    records.extend(scan.records);
                    memo.merge(scan.memo);
                }
                None => {
                    log_warning(&format!(
                        "Scanning {} did not finish within {:?}; skipped for this refresh",
                        root.path.display(),
                        self.config.root_scan_timeout()
                    ));
                    report.timed_out.push(root.path.clone());
                    memo.merge(previous.for_root(root));
                }
            }
        }

        if self.restart.load(Ordering::Acquire) {
            return Ok(None);
        }

        let steam_roots = roots
            .iter()
            .filter(|r| r.is_install())
            .filter_map(|r| r.steam_root.clone())
            .collect();
        let index = Index::from_records(records, steam_roots);
        report.records = index.len();

        Ok(Some(Built {
            index,
            memo,
            report,
        }))
    }

    /// Scan a root on its own thread, giving up after the configured timeout.
    /// A root whose last scan thread is still running is not scanned again.
    fn scan_with_timeout(
        &self,
        root: &LibraryRoot,
        options: &ScanOptions,
        previous: SourceMemo,
    ) -> Option<RootScan> {
        let Some(busy) = BusyRoot::claim(&self.busy_roots, &root.path) else {
            log_debug(&format!(
                "Earlier scan of {} still running; not starting another",
                root.path.display()
            ));
            return None;
        };
        self.scans_started.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        let scanner = Arc::clone(&self.scanner);
        let thread_root = root.clone();
        let thread_options = *options;

        let spawned = thread::Builder::new()
            .name("steam-search-scan".to_string())
            .spawn(move || {
                let scan = scanner.scan(&thread_root, &thread_options, &previous);
                drop(busy);
                // The receiver is gone if the scan already timed out
                let _ = tx.send(scan);
            });

        if let Err(e) = spawned {
            log_warning(&format!("Could not spawn scan thread ({}); scanning inline", e));
            let previous = self.memo.lock().for_root(root);
            return Some(self.scanner.scan(root, options, &previous));
        }

        match rx.recv_timeout(self.config.root_scan_timeout()) {
            Ok(scan) => Some(scan),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Root scans started since creation (including timed out ones)
    pub fn scans_started(&self) -> usize {
        self.scans_started.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoveryError;
    use crate::icons::IconResolver;
    use crate::record::{IconSlot, LaunchTarget};
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn record(app_id: u32, name: &str) -> AppRecord {
        AppRecord {
            id: AppId::Steam(app_id),
            name: name.to_string(),
            install_dir: None,
            icon: IconSlot::default(),
            launch: LaunchTarget::SteamApp { app_id },
        }
    }

    fn write_manifest(steamapps: &Path, app_id: u32, name: &str) {
        fs::write(
            steamapps.join(format!("appmanifest_{}.acf", app_id)),
            format!(
                "\"AppState\"\n{{\n\t\"appid\"\t\t\"{}\"\n\t\"name\"\t\t\"{}\"\n\t\"StateFlags\"\t\t\"4\"\n\t\"installdir\"\t\t\"{}\"\n}}\n",
                app_id, name, name
            ),
        )
        .unwrap();
    }

    /// A Steam install with two manifests, and a config pointing at it
    fn fixture() -> (TempDir, PluginConfig) {
        let tmp = TempDir::new().unwrap();
        let steam = tmp.path().join("Steam");
        fs::create_dir_all(steam.join("steamapps")).unwrap();
        write_manifest(&steam.join("steamapps"), 400, "Portal");
        write_manifest(&steam.join("steamapps"), 620, "Portal 2");

        let config = PluginConfig {
            steam_path: Some(steam),
            index_cache_path: Some(tmp.path().join("cache/index_cache.json")),
            refresh_interval_secs: 0,
            ..Default::default()
        };
        (tmp, config)
    }

    fn completed(outcome: RefreshOutcome) -> RefreshReport {
        match outcome {
            RefreshOutcome::Completed(report) => report,
            RefreshOutcome::Coalesced => panic!("expected a completed refresh"),
        }
    }

    /// Blocks each scan until released, announcing when it starts
    struct GatedScanner {
        started: Sender<()>,
        release: Receiver<()>,
    }

    impl RootScanner for GatedScanner {
        fn scan(&self, root: &LibraryRoot, options: &ScanOptions, previous: &SourceMemo) -> RootScan {
            let _ = self.started.send(());
            let _ = self.release.recv();
            scan_root(root, options, previous)
        }
    }

    #[test]
    fn test_index_first_duplicate_wins() {
        let index = Index::from_records(
            vec![record(1, "First"), record(2, "Other"), record(1, "Second")],
            Vec::new(),
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&AppId::Steam(1)).unwrap().name, "First");
        assert_eq!(index.records()[1].name, "Other");
    }

    #[test]
    fn test_handle_swap_keeps_old_snapshots() {
        let handle = IndexHandle::default();
        let before = handle.snapshot();
        let installed = handle.swap(Index::from_records(vec![record(1, "A")], Vec::new()));

        assert!(before.is_empty());
        assert_eq!(installed.generation(), 1);
        assert_eq!(handle.snapshot().len(), 1);
        assert!(Arc::ptr_eq(&installed, &handle.snapshot()));
    }

    #[test]
    fn test_refresh_builds_and_persists() {
        let (_tmp, config) = fixture();
        let refresher = Refresher::new(config, IndexHandle::default());

        let report = completed(refresher.refresh().unwrap());
        assert_eq!(report.roots, 1);
        assert_eq!(report.records, 2);
        assert_eq!(report.generation, 1);

        let cached = refresher.cache().load().unwrap().unwrap();
        assert_eq!(cached, *refresher.handle().snapshot());
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let (_tmp, config) = fixture();
        let refresher = Refresher::new(config, IndexHandle::default());

        completed(refresher.refresh().unwrap());
        let first = refresher.handle().snapshot();
        let report = completed(refresher.refresh().unwrap());
        let second = refresher.handle().snapshot();

        assert_eq!(*first, *second);
        assert_eq!(report.reparsed, 0);
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_resolved_icons_survive_refresh() {
        let (tmp, config) = fixture();
        let librarycache = tmp.path().join("Steam/appcache/librarycache");
        fs::create_dir_all(&librarycache).unwrap();
        fs::write(librarycache.join("400_icon.jpg"), b"jpg").unwrap();
        let refresher = Refresher::new(config, IndexHandle::default());

        completed(refresher.refresh().unwrap());
        let first = refresher.handle().snapshot();
        let icons = IconResolver::new(None, first.steam_roots());
        let expected = first.steam_roots()[0].join("appcache/librarycache/400_icon.jpg");
        let portal = first.get(&AppId::Steam(400)).unwrap();
        assert_eq!(icons.icon_for(portal), Some(expected.as_path()));

        completed(refresher.refresh().unwrap());
        let second = refresher.handle().snapshot();
        assert_eq!(*first, *second);
        assert_eq!(
            second.get(&AppId::Steam(400)).unwrap().icon.resolved(),
            Some(Some(expected.as_path()))
        );
        assert_eq!(second.get(&AppId::Steam(620)).unwrap().icon.resolved(), None);

        let cached = refresher.cache().load().unwrap().unwrap();
        assert_eq!(
            cached.get(&AppId::Steam(400)).unwrap().icon.resolved(),
            Some(Some(expected.as_path()))
        );
    }

    #[test]
    fn test_failed_discovery_keeps_previous_index() {
        let (tmp, config) = fixture();
        let refresher = Refresher::new(config.clone(), IndexHandle::default());
        completed(refresher.refresh().unwrap());
        let before = refresher.handle().snapshot();

        fs::remove_dir_all(config.steam_path.as_ref().unwrap()).unwrap();
        let err = refresher.refresh().unwrap_err();

        assert!(matches!(err, RefreshError::Discovery(DiscoveryError::NotFound { .. })));
        assert_eq!(refresher.last_error(), Some(err));
        assert!(Arc::ptr_eq(&before, &refresher.handle().snapshot()));
        assert_eq!(refresher.cache().load().unwrap().unwrap().len(), 2);
        drop(tmp);
    }

    #[test]
    fn test_concurrent_refresh_is_coalesced() {
        let (_tmp, config) = fixture();
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let scanner = Arc::new(GatedScanner {
            started: started_tx,
            release: release_rx,
        });
        let refresher = Arc::new(Refresher::with_scanner(config, IndexHandle::default(), scanner));

        let background = {
            let refresher = Arc::clone(&refresher);
            thread::spawn(move || refresher.refresh())
        };
        started_rx.recv().unwrap();

        assert!(matches!(refresher.refresh().unwrap(), RefreshOutcome::Coalesced));

        release_tx.send(()).unwrap();
        let report = completed(background.join().unwrap().unwrap());
        assert_eq!(report.records, 2);
        assert!(!refresher.is_refreshing());
    }

    #[test]
    fn test_restart_abandons_partial_scan() {
        let (_tmp, config) = fixture();
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let scanner = Arc::new(GatedScanner {
            started: started_tx,
            release: release_rx,
        });
        let refresher = Arc::new(Refresher::with_scanner(config, IndexHandle::default(), scanner));
        assert!(!refresher.request_restart());

        let background = {
            let refresher = Arc::clone(&refresher);
            thread::spawn(move || refresher.refresh())
        };
        started_rx.recv().unwrap();
        assert!(refresher.request_restart());
        release_tx.send(()).unwrap();

        // The restarted scan blocks again until released
        started_rx.recv().unwrap();
        release_tx.send(()).unwrap();

        let report = completed(background.join().unwrap().unwrap());
        assert_eq!(report.restarts, 1);
        assert_eq!(report.records, 2);
        assert_eq!(refresher.scans_started(), 2);
        assert_eq!(refresher.handle().snapshot().generation(), 1);
    }

    #[test]
    fn test_slow_root_times_out() {
        struct SlowScanner;
        impl RootScanner for SlowScanner {
            fn scan(&self, root: &LibraryRoot, options: &ScanOptions, previous: &SourceMemo) -> RootScan {
                if root.path.ends_with("Slow") {
                    thread::sleep(Duration::from_secs(2));
                }
                scan_root(root, options, previous)
            }
        }

        let (tmp, mut config) = fixture();
        let slow = tmp.path().join("Slow");
        fs::create_dir_all(slow.join("steamapps")).unwrap();
        write_manifest(&slow.join("steamapps"), 70, "Half-Life");
        config.add_extra_library_path(&slow);
        config.root_scan_timeout_ms = 300;

        let refresher = Refresher::with_scanner(config, IndexHandle::default(), Arc::new(SlowScanner));
        let report = completed(refresher.refresh().unwrap());

        assert_eq!(report.roots, 2);
        assert_eq!(report.timed_out, vec![slow.clone()]);
        assert_eq!(report.records, 2);
        assert!(refresher.handle().snapshot().get(&AppId::Steam(70)).is_none());

        // The abandoned thread still holds the slow root; no second thread is started
        let report = completed(refresher.refresh().unwrap());
        assert_eq!(report.timed_out, vec![slow]);
        assert_eq!(report.records, 2);
        assert_eq!(refresher.scans_started(), 3);
    }
}
