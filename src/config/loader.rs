//! Configuration loading from disk.

use std::path::Path;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Semantic validation; serde already covered the syntactic layer.
pub fn validate_config(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "invalid bind address: {}",
            config.server.bind_address
        )));
    }

    if config.server.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request timeout must be greater than zero".to_string(),
        ));
    }

    if config.database.refresh_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "refresh interval must be greater than zero".to_string(),
        ));
    }

    // Scheme support is checked by the factories at startup; here only the
    // descriptor shape.
    for (field, dsn) in [
        ("database.dsn", &config.database.dsn),
        ("storage.dsn", &config.storage.dsn),
    ] {
        if Url::parse(dsn).is_err() {
            return Err(ConfigError::Validation(format!("invalid {field}: {dsn}")));
        }
    }

    Ok(())
}
