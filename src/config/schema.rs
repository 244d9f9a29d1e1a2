//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration.
    pub server: ServerConfig,

    /// Definition backend (selected by DSN scheme).
    pub database: DatabaseConfig,

    /// Counter storage for rate limiting (selected by DSN scheme).
    pub storage: StorageConfig,

    /// Cluster notification settings.
    pub cluster: ClusterConfig,

    /// Organization auth settings.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Definition backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection descriptor; the scheme selects the backend
    /// (mongodb, file, postgres).
    pub dsn: String,

    /// Poll interval for backends that watch by re-signalling.
    pub refresh_interval_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: "file:///etc/api-gateway".to_string(),
            refresh_interval_secs: 60,
        }
    }
}

/// Counter storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Connection descriptor; the scheme selects the store
    /// (redis, memory).
    pub dsn: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: "memory://localhost".to_string(),
        }
    }
}

/// Cluster notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Pub/sub channel shared by all instances.
    pub channel: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            channel: crate::notifier::DEFAULT_CHANNEL.to_string(),
        }
    }
}

/// Organization auth configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// JSON file with the gateway user set. The organization plugin is
    /// registered only when this is set; fleets with an identity store
    /// register their own repository instead.
    pub users_file: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
