//! Organization auth plugin.
//!
//! Per-request state machine: unauthenticated → lookup → authorized or
//! rejected. Missing Basic-Auth credentials reject immediately, before any
//! repository call. On a match the user's organization is written into a
//! forwarded header, overwriting whatever the caller supplied.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::Spec;
use crate::middleware::{reject, Constructor, Handler};
use crate::plugin::{Plugin, PluginConfig, PluginError};

/// Header carrying the authorized organization to the upstream.
pub const ORGANIZATION_HEADER: &str = "X-Organization";

/// A gateway user able to authorize requests for an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,

    /// Password hash; never a plaintext.
    pub password: String,

    pub organization: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credentials did not match")]
    InvalidCredentials,

    #[error("user repository error: {0}")]
    Repository(String),

    #[error("hash comparison failed: {0}")]
    Hash(String),
}

/// External source of users; consumed only by this plugin.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<User>, AuthError>;
}

/// Hash comparison capability. Implementations must compare through the
/// hash algorithm, never by string equality.
pub trait HashComparer: Send + Sync {
    fn compare(&self, hash: &str, plaintext: &str) -> Result<(), AuthError>;
}

/// Default comparer over bcrypt hashes.
pub struct BcryptHash;

impl HashComparer for BcryptHash {
    fn compare(&self, hash: &str, plaintext: &str) -> Result<(), AuthError> {
        match bcrypt::verify(plaintext, hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::InvalidCredentials),
            Err(e) => Err(AuthError::Hash(e.to_string())),
        }
    }
}

/// A static, in-memory user set. Useful for file-driven deployments and
/// tests; production fleets point the trait at their identity store.
pub struct StaticUserRepository {
    users: Vec<User>,
}

impl StaticUserRepository {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserRepository for StaticUserRepository {
    async fn find_all(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.clone())
    }
}

pub struct Organization {
    repository: Arc<dyn UserRepository>,
    hasher: Arc<dyn HashComparer>,
}

impl Organization {
    pub fn new(repository: Arc<dyn UserRepository>, hasher: Arc<dyn HashComparer>) -> Self {
        Self { repository, hasher }
    }
}

impl Plugin for Organization {
    fn name(&self) -> &'static str {
        "organization"
    }

    /// Takes no per-API parameters; driven entirely by the user repository.
    fn middlewares(&self, _raw: &PluginConfig, _spec: &Spec) -> Result<Vec<Constructor>, PluginError> {
        Ok(vec![auth_stage(
            self.repository.clone(),
            self.hasher.clone(),
        )])
    }
}

fn auth_stage(repository: Arc<dyn UserRepository>, hasher: Arc<dyn HashComparer>) -> Constructor {
    Arc::new(move |next: Handler| {
        let repository = repository.clone();
        let hasher = hasher.clone();
        Arc::new(move |mut req: Request<Body>| {
            let repository = repository.clone();
            let hasher = hasher.clone();
            let next = next.clone();
            Box::pin(async move {
                tracing::debug!("Starting organization auth middleware");

                // No credentials: reject before touching the repository.
                let Some((username, password)) = basic_credentials(&req) else {
                    return reject(StatusCode::UNAUTHORIZED, "Authorization required");
                };

                let users = match repository.find_all().await {
                    Ok(users) => users,
                    Err(e) => {
                        tracing::error!(error = %e, "Error when getting all users");
                        return reject(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "there was an error when looking for users",
                        );
                    }
                };

                let mut organization = None;
                for user in &users {
                    if username == user.username
                        && hasher.compare(&user.password, &password).is_ok()
                    {
                        organization = Some(user.organization.clone());
                        break;
                    }
                }

                let Some(organization) = organization else {
                    tracing::debug!(username = %username, "Invalid user/password provided");
                    return reject(StatusCode::UNAUTHORIZED, "Authorization failed");
                };

                // Overwrite anything the caller supplied; the header is
                // trusted downstream.
                match HeaderValue::from_str(&organization) {
                    Ok(value) if !organization.is_empty() => {
                        req.headers_mut().insert(ORGANIZATION_HEADER, value);
                    }
                    _ => {
                        tracing::debug!("No forwardable organization associated with user");
                        req.headers_mut().remove(ORGANIZATION_HEADER);
                    }
                }

                next(req).await
            })
        })
    })
}

/// Extract `(username, password)` from a Basic Authorization header.
fn basic_credentials(req: &Request<Body>) -> Option<(String, String)> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
