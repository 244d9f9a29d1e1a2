//! API definitions and their repositories.
//!
//! # Data Flow
//! ```text
//! backend (file / mongodb / postgres)
//!     → repository.rs (find_all: full snapshot)
//!     → Definition (declarative, immutable once fetched)
//!     → gateway manager (wraps into Spec, builds chains)
//!
//! On change:
//!     backend watch loop → ConfigurationChanged signal
//!     → manager re-fetches the entire set and swaps the table
//! ```

pub mod file_repository;
pub mod mongo_repository;
pub mod postgres_repository;
pub mod repository;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::oauth::OAuthSpec;

/// Declarative description of one proxied API.
///
/// Owned by the repository; the manager only ever holds immutable
/// snapshots, never patches one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    /// Unique API name within a snapshot.
    pub name: String,

    /// Inbound path prefix this API listens on.
    pub listen_path: String,

    /// Upstream target requests are forwarded to.
    pub upstream_url: String,

    /// Inactive definitions are fetched but never routed.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Ordered plugin references; chain stages run in this order.
    #[serde(default)]
    pub plugins: Vec<PluginReference>,

    /// OAuth server whose client secrets this API injects, if any.
    #[serde(default)]
    pub oauth_server_name: Option<String>,

    /// Update marker set by the management surface.
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Reference to a plugin plus its loosely-typed parameters.
///
/// Parameters stay raw here; each plugin decodes them into its own typed
/// configuration when the chain is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginReference {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

/// Runtime wrapper consumed by the chain builder.
///
/// Pairs a definition with its resolved OAuth spec. Rebuilt wholesale on
/// every reload.
#[derive(Clone)]
pub struct Spec {
    pub definition: Arc<Definition>,
    pub oauth: Option<Arc<OAuthSpec>>,
}

impl Definition {
    /// Semantic validation; serde covers the syntactic layer.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("definition name must not be empty".to_string());
        }
        if !self.listen_path.starts_with('/') {
            return Err(format!(
                "listen_path must start with '/': {}",
                self.listen_path
            ));
        }
        if url::Url::parse(&self.upstream_url).is_err() {
            return Err(format!("upstream_url is not a valid URL: {}", self.upstream_url));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_defaults() {
        let def: Definition = serde_json::from_str(
            r#"{"name": "users", "listen_path": "/users", "upstream_url": "http://users:8080"}"#,
        )
        .unwrap();

        assert!(def.active);
        assert!(def.plugins.is_empty());
        assert!(def.oauth_server_name.is_none());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_paths_and_urls() {
        let mut def: Definition = serde_json::from_str(
            r#"{"name": "users", "listen_path": "/users", "upstream_url": "http://users:8080"}"#,
        )
        .unwrap();

        def.listen_path = "users".to_string();
        assert!(def.validate().is_err());

        def.listen_path = "/users".to_string();
        def.upstream_url = "not a url".to_string();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_plugin_reference_keeps_raw_config() {
        let def: Definition = serde_json::from_str(
            r#"{
                "name": "users",
                "listen_path": "/users",
                "upstream_url": "http://users:8080",
                "plugins": [
                    {"name": "rate_limit", "config": {"limit": "10-S", "policy": "local"}}
                ]
            }"#,
        )
        .unwrap();

        let plugin = &def.plugins[0];
        assert!(plugin.enabled);
        assert_eq!(plugin.config["limit"], "10-S");
    }
}
