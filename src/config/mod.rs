mod defaults;
mod io;
mod types;
mod validation;

pub use defaults::*;
pub use io::*;
pub use types::*;
pub use validation::*;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Top-level chatwidget configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache_control: CacheControlConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    /// State directory for persistent data.
    #[serde(skip)]
    pub state_dir: PathBuf,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path.map(PathBuf::from).or_else(find_config_file) {
            Some(config_path) => {
                info!("Loading config from {}", config_path.display());
                load_config_file(&config_path)?
            }
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        };

        config.state_dir = resolve_state_dir();
        config.apply_env_overrides();

        Ok(config)
    }

    /// Write default configuration to a file.
    pub fn write_default(path: &str) -> Result<()> {
        write_config_file(std::path::Path::new(path), &Config::default())
    }

    /// Resolved SQLite database path.
    pub fn db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| self.state_dir.join(DEFAULT_DB_FILE))
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CHATWIDGET_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Ok(bind) = std::env::var("CHATWIDGET_BIND") {
            self.server.bind = bind;
        }

        if let Ok(path) = std::env::var("CHATWIDGET_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("CHATWIDGET_CONFIG_URL") {
            self.client.config_url = url;
        }

        if let Ok(url) = std::env::var("CHATWIDGET_TRACK_URL") {
            self.client.track_url = url;
        }
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("chatwidget.json"),
        PathBuf::from("chatwidget.json5"),
        PathBuf::from("chatwidget.yaml"),
        PathBuf::from("chatwidget.yml"),
        PathBuf::from("chatwidget.toml"),
    ];

    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        return Some(found.clone());
    }

    dirs::home_dir()
        .map(|home| home.join(".chatwidget").join("config.json"))
        .filter(|p| p.exists())
}

/// Resolve the state directory for persistent data.
fn resolve_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHATWIDGET_STATE_DIR") {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .map(|h| h.join(".chatwidget"))
        .unwrap_or_else(|| PathBuf::from(".chatwidget"))
}
