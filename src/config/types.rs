use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND_HOST.to_string(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// SQLite file. Defaults to `<state_dir>/chatwidget.db`.
    pub db_path: Option<PathBuf>,
}

// ============================================================================
// Cache-Control
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheControlConfig {
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
    #[serde(default = "default_stale_while_revalidate")]
    pub stale_while_revalidate_secs: u64,
}

impl CacheControlConfig {
    /// The `Cache-Control` value for the config endpoint.
    pub fn header_value(&self) -> String {
        format!(
            "public, max-age={}, s-maxage={}, stale-while-revalidate={}",
            self.max_age_secs, self.max_age_secs, self.stale_while_revalidate_secs
        )
    }
}

impl Default for CacheControlConfig {
    fn default() -> Self {
        Self {
            max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
            stale_while_revalidate_secs: DEFAULT_STALE_WHILE_REVALIDATE_SECS,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default = "default_config_url")]
    pub config_url: String,
    #[serde(default = "default_track_url")]
    pub track_url: String,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Directory for the persistent config cache; in-memory when unset.
    pub storage_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            config_url: DEFAULT_CONFIG_URL.to_string(),
            track_url: DEFAULT_TRACK_URL.to_string(),
            cache_ttl_ms: DEFAULT_CLIENT_CACHE_TTL_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            storage_dir: None,
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

// ============================================================================
// Serde default helpers
// ============================================================================

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> String {
    DEFAULT_BIND_HOST.to_string()
}

fn default_max_age() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

fn default_stale_while_revalidate() -> u64 {
    DEFAULT_STALE_WHILE_REVALIDATE_SECS
}

fn default_config_url() -> String {
    DEFAULT_CONFIG_URL.to_string()
}

fn default_track_url() -> String {
    DEFAULT_TRACK_URL.to_string()
}

fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CLIENT_CACHE_TTL_MS
}

fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
