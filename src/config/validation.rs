use super::defaults::{MAX_FETCH_TIMEOUT_MS, MIN_FETCH_TIMEOUT_MS};
use super::Config;
use anyhow::Result;

/// Validation errors for configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn error(path: &str, message: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(error("server.port", "Port must be greater than 0"));
    }

    let bind = config.server.bind.as_str();
    if bind != "localhost" && bind.parse::<std::net::IpAddr>().is_err() {
        errors.push(error("server.bind", "Bind host must be an IP address"));
    }

    if config.client.cache_ttl_ms == 0 {
        errors.push(error("client.cacheTtlMs", "Cache TTL must be greater than 0"));
    }

    let timeout = config.client.fetch_timeout_ms;
    if !(MIN_FETCH_TIMEOUT_MS..=MAX_FETCH_TIMEOUT_MS).contains(&timeout) {
        errors.push(error(
            "client.fetchTimeoutMs",
            format!("Fetch timeout must be between {MIN_FETCH_TIMEOUT_MS} and {MAX_FETCH_TIMEOUT_MS} ms"),
        ));
    }

    for (path, value) in [
        ("client.configUrl", &config.client.config_url),
        ("client.trackUrl", &config.client.track_url),
    ] {
        match url::Url::parse(value) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            _ => errors.push(error(path, "Must be an absolute http(s) URL")),
        }
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
