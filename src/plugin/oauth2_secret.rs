//! OAuth2 client-secret injection plugin.
//!
//! If a request already carries an Authorization header it passes through
//! untouched. Otherwise a `client_id` query parameter is resolved against
//! the API's OAuth spec: a known client gets Basic credentials
//! synthesized, an unknown one is rejected and never forwarded, and a
//! request with neither signal is forwarded unmodified for the upstream to
//! judge.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::api::Spec;
use crate::middleware::{reject, Constructor, Handler};
use crate::oauth::OAuthSpec;
use crate::plugin::{Plugin, PluginConfig, PluginError};

pub struct Oauth2Secret;

impl Oauth2Secret {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Oauth2Secret {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for Oauth2Secret {
    fn name(&self) -> &'static str {
        "oauth2_secret"
    }

    /// Takes no per-API parameters; driven entirely by the referenced
    /// OAuth spec. An API without one is a configuration error.
    fn middlewares(&self, _raw: &PluginConfig, spec: &Spec) -> Result<Vec<Constructor>, PluginError> {
        let oauth = spec.oauth.clone().ok_or(PluginError::MissingOAuthSpec)?;
        Ok(vec![secret_stage(oauth)])
    }
}

fn secret_stage(oauth: Arc<OAuthSpec>) -> Constructor {
    Arc::new(move |next: Handler| {
        let oauth = oauth.clone();
        Arc::new(move |mut req: Request<Body>| {
            let oauth = oauth.clone();
            let next = next.clone();
            Box::pin(async move {
                tracing::debug!("Starting Oauth2Secret middleware");

                if req.headers().contains_key(AUTHORIZATION) {
                    tracing::debug!("Authorization is set, proxying");
                    return next(req).await;
                }

                let Some(client_id) = query_param(&req, "client_id") else {
                    tracing::debug!("ClientID not set, proxying");
                    return next(req).await;
                };

                let Some(secret) = oauth.secrets.get(&client_id) else {
                    tracing::warn!(client_id = %client_id, "Unknown OAuth client");
                    return reject(StatusCode::UNAUTHORIZED, "client_id not found");
                };

                let token = BASE64.encode(format!("{client_id}:{secret}"));
                match HeaderValue::from_str(&format!("Basic {token}")) {
                    Ok(value) => {
                        req.headers_mut().insert(AUTHORIZATION, value);
                    }
                    Err(_) => {
                        // Secrets come from the management surface; one that
                        // can't sit in a header is a hard rejection too.
                        tracing::error!(client_id = %client_id, "Client secret is not header-safe");
                        return reject(StatusCode::UNAUTHORIZED, "client_id not found");
                    }
                }

                next(req).await
            })
        })
    })
}

fn query_param(req: &Request<Body>, name: &str) -> Option<String> {
    let query = req.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_query_param_extraction() {
        let req = request("http://gw/users?client_id=abc&scope=all");
        assert_eq!(query_param(&req, "client_id"), Some("abc".to_string()));
        assert_eq!(query_param(&req, "missing"), None);
        assert_eq!(query_param(&request("http://gw/users"), "client_id"), None);
    }
}
