//! OAuth server specs and their repositories.

pub mod repository;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declarative description of one OAuth server's registered client secrets.
///
/// Immutable snapshot per reload; the oauth2_secret plugin resolves client
/// IDs against `secrets` and injects the matching Basic credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSpec {
    /// Unique OAuth server name within a snapshot.
    pub name: String,

    /// Client ID → client secret.
    #[serde(default)]
    pub secrets: HashMap<String, String>,

    /// Update marker set by the management surface.
    #[serde(default)]
    pub updated_at: Option<String>,
}
