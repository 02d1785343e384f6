//! Shared constants used across woahlife crates.

/// Default API port for the woahlife server.
pub const DEFAULT_PORT: u16 = 38412;

/// Default maximum size of a single submitted entry, in bytes.
pub const DEFAULT_MAX_ENTRY_SIZE: usize = 1024 * 1024;

/// Default ceiling for a serialized search document, in bytes.
///
/// Same as the per-record limit of the hosted search index the documents are
/// compatible with.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10_000;

/// Default polling interval for the change-log sync worker, in milliseconds.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 1_000;

/// Default number of change events drained per sync pass.
pub const DEFAULT_SYNC_BATCH_SIZE: usize = 64;

/// Default bound on a single store/cipher/index call, in milliseconds.
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 5_000;

/// Result count when a search does not ask for one.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
/// Upper bound applied to caller-supplied search limits.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Environment variable holding the base64 master key when no override is configured.
pub const DEFAULT_MASTER_KEY_ENV: &str = "WOAHLIFE_MASTER_KEY";

/// Default base URL for CLI/API clients.
pub const DEFAULT_CLI_SERVER_URL: &str = "http://127.0.0.1:38412";
