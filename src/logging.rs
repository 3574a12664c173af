//! steam-search logging
//!
//! Session log file with a short environment header, mirrored to stderr so
//! the CLI's stdout stays machine-readable.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::data_path;

static LOGGER: OnceLock<Arc<Mutex<SearchLogger>>> = OnceLock::new();
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

// ============================================================================
// Session Header
// ============================================================================

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub app_version: String,
    pub os: String,
    pub arch: String,
    pub data_dir: String,
}

impl SessionInfo {
    pub fn detect() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            data_dir: data_path!().display().to_string(),
        }
    }

    pub fn to_log_header(&self) -> String {
        format!(
r#"================================================================================
steam-search Log - {}
================================================================================
Application:   steam-search v{}
Platform:      {} ({})
Data Dir:      {}
================================================================================"#,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.app_version,
            self.os,
            self.arch,
            self.data_dir,
        )
    }
}

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Info,
    Scan,   // Library discovery and manifest parsing
    Launch, // Games started from a result
    Cache,  // Snapshot load/save
    Warning,
    Error,
    Debug,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Scan => "[SCAN]",
            LogLevel::Launch => "[LAUNCH]",
            LogLevel::Cache => "[CACHE]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Error => "[ERROR]",
            LogLevel::Debug => "[DEBUG]",
        }
    }
}

// ============================================================================
// Logger
// ============================================================================

pub struct SearchLogger {
    log_file: Option<File>,
}

impl SearchLogger {
    pub fn new() -> Self {
        let log_dir = data_path!("logs");
        let _ = fs::create_dir_all(&log_dir);

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("steam_search_{}.log", timestamp));

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok();

        let mut logger = Self { log_file };
        logger.write_raw(&SessionInfo::detect().to_log_header());
        logger
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.log_file {
            let _ = writeln!(file, "{}", msg);
            let _ = file.flush();
        }

        eprintln!("{}", msg);
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        let formatted = format!("[{}] {} {}", timestamp, level.prefix(), message);
        self.write_raw(&formatted);
    }
}

impl Default for SearchLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Global Logger Access
// ============================================================================

/// Initialize the global logger (call once at startup)
pub fn init_logger() {
    LOGGER.get_or_init(|| Arc::new(Mutex::new(SearchLogger::new())));
}

/// Enable or disable `[DEBUG]` lines (the `debug` config flag)
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

fn logger() -> Arc<Mutex<SearchLogger>> {
    LOGGER
        .get_or_init(|| Arc::new(Mutex::new(SearchLogger::new())))
        .clone()
}

fn log(level: LogLevel, message: &str) {
    if let Ok(mut log) = logger().lock() {
        log.log(level, message);
    }
}

// ============================================================================
// Convenience Logging Functions
// ============================================================================

pub fn log_info(message: &str) {
    log(LogLevel::Info, message);
}

pub fn log_scan(message: &str) {
    log(LogLevel::Scan, message);
}

pub fn log_launch(message: &str) {
    log(LogLevel::Launch, message);
}

pub fn log_cache(message: &str) {
    log(LogLevel::Cache, message);
}

pub fn log_warning(message: &str) {
    log(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    log(LogLevel::Error, message);
}

pub fn log_debug(message: &str) {
    if debug_enabled() {
        log(LogLevel::Debug, message);
    }
}
