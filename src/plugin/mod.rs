//! Plugin system.
//!
//! # Data Flow
//! ```text
//! Definition.plugins (ordered, loosely-typed params)
//!     → Registry::get(name)
//!     → Plugin::middlewares(raw, spec) (decode, validate, construct)
//!     → ordered middleware constructors
//!     → middleware::chain (fold into one handler per API)
//! ```
//!
//! # Design Decisions
//! - `middlewares` must be deterministic for identical inputs; all
//!   validation happens here at build time, never per request.
//! - A malformed per-API configuration fails that API's build only; the
//!   manager excludes it and the rest of the table is unaffected.

pub mod oauth2_secret;
pub mod organization;
pub mod rate_limit;
pub mod registry;
pub mod request_transformer;

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::Spec;
use crate::middleware::Constructor;

pub use registry::Registry;

/// Loosely-typed per-API plugin parameters, straight off the definition.
pub type PluginConfig = HashMap<String, serde_json::Value>;

/// Errors produced while building middleware chains.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No plugin registered under the referenced name.
    #[error("unknown plugin: {0}")]
    Unknown(String),

    /// The raw parameter mapping did not decode into the plugin's config.
    #[error("invalid plugin configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// Malformed rate descriptor.
    #[error("invalid rate descriptor: {0}")]
    InvalidRate(String),

    /// Distributed policy requested without a distributed store.
    #[error("the distributed rate limit policy requires a distributed store")]
    InvalidStorage,

    /// Unrecognized rate limit policy string.
    #[error("invalid rate limit policy: {0}")]
    InvalidPolicy(String),

    /// A transform references a header name that cannot exist on the wire.
    #[error("invalid header in transform: {0}")]
    InvalidHeader(String),

    /// The API references no OAuth server to take secrets from.
    #[error("no OAuth server associated with this API")]
    MissingOAuthSpec,
}

/// A pluggable unit contributing middleware stages to an API's chain.
///
/// The registry is open for extension; anything implementing this trait can
/// be registered under its name.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decode and validate the raw parameters, then return the ordered
    /// middleware constructors for this API.
    fn middlewares(&self, raw: &PluginConfig, spec: &Spec) -> Result<Vec<Constructor>, PluginError>;
}

/// Decode a loose parameter mapping into a typed plugin configuration.
pub(crate) fn decode_config<T: DeserializeOwned>(raw: &PluginConfig) -> Result<T, PluginError> {
    let value = serde_json::Value::Object(raw.clone().into_iter().collect());
    Ok(serde_json::from_value(value)?)
}
