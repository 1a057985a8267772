/// Default configuration constants used across the system.

/// Default origin port.
pub const DEFAULT_PORT: u16 = 8787;

/// Default bind host.
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";

/// Default SQLite database file name, relative to the state directory.
pub const DEFAULT_DB_FILE: &str = "chatwidget.db";

/// Public cache lifetime advertised on the config endpoint.
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 60;

/// Window in which intermediaries may serve a stale config copy.
pub const DEFAULT_STALE_WHILE_REVALIDATE_SECS: u64 = 300;

/// Client-side cache TTL (30 seconds).
pub const DEFAULT_CLIENT_CACHE_TTL_MS: u64 = 30_000;

/// Client-side config fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 3_000;

/// Accepted range for the fetch timeout.
pub const MIN_FETCH_TIMEOUT_MS: u64 = 1_000;
pub const MAX_FETCH_TIMEOUT_MS: u64 = 5_000;

/// Default URLs the client talks to.
pub const DEFAULT_CONFIG_URL: &str = "http://127.0.0.1:8787/whatsapp/config";
pub const DEFAULT_TRACK_URL: &str = "http://127.0.0.1:8787/whatsapp/track";

/// Default log directive.
pub const DEFAULT_LOG_LEVEL: &str = "chatwidget=info";
