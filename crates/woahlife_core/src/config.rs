//! Configuration loading from environment variables.

use crate::cipher::MasterKeyRef;
use crate::constants::*;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for woahlife.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub port: u16,
    pub max_entry_size: usize,
    pub max_document_bytes: usize,
    pub encrypt_entries: bool,
    pub master_key: MasterKeyRef,
    pub sync_interval_ms: u64,
    pub sync_batch_size: usize,
    pub io_timeout_ms: u64,
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    // Windows USERPROFILE
    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolve which master-key reference the cipher should use.
///
/// `MASTER_KEY_FILE` wins over `MASTER_KEY_ENV`; without either, the key is
/// read from [`DEFAULT_MASTER_KEY_ENV`].
fn master_key_ref_from_env() -> MasterKeyRef {
    if let Some(path) = env_non_empty("MASTER_KEY_FILE") {
        return MasterKeyRef::File(PathBuf::from(expand_tilde(path)));
    }
    let var = env_non_empty("MASTER_KEY_ENV").unwrap_or_else(|| DEFAULT_MASTER_KEY_ENV.to_string());
    MasterKeyRef::Env(var)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("DB_PATH").map(expand_tilde).unwrap_or_else(|_| {
                let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
                let cache_dir = home.join(".cache").join("woahlife");
                cache_dir.join("db").to_string_lossy().to_string()
            }),
            port: env_parsed("PORT").unwrap_or(DEFAULT_PORT),
            max_entry_size: env_parsed("MAX_ENTRY_SIZE").unwrap_or(DEFAULT_MAX_ENTRY_SIZE),
            max_document_bytes: env_parsed("MAX_DOCUMENT_BYTES")
                .filter(|bytes: &usize| *bytes > 0)
                .unwrap_or(DEFAULT_MAX_DOCUMENT_BYTES),
            encrypt_entries: env_flag_enabled("ENCRYPT_ENTRIES"),
            master_key: master_key_ref_from_env(),
            sync_interval_ms: env_parsed("SYNC_INTERVAL_MS")
                .filter(|ms: &u64| *ms > 0)
                .unwrap_or(DEFAULT_SYNC_INTERVAL_MS),
            sync_batch_size: env_parsed("SYNC_BATCH_SIZE")
                .filter(|size: &usize| *size > 0)
                .unwrap_or(DEFAULT_SYNC_BATCH_SIZE),
            io_timeout_ms: env_parsed("IO_TIMEOUT_MS")
                .filter(|ms: &u64| *ms > 0)
                .unwrap_or(DEFAULT_IO_TIMEOUT_MS),
        }
    }

    /// Configuration rooted at `db_path` with every other field at its default.
    ///
    /// Used by tests and embedders that do not read the process environment.
    pub fn with_db_path(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            port: DEFAULT_PORT,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            encrypt_entries: false,
            master_key: MasterKeyRef::Env(DEFAULT_MASTER_KEY_ENV.to_string()),
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            sync_batch_size: DEFAULT_SYNC_BATCH_SIZE,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
        }
    }

    /// Per-call I/O bound for store, cipher, and index work.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Interval between change-log sync passes.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}
