//! Request transformer plugin.
//!
//! Applies declarative header transforms to a request before it reaches
//! the upstream. Removals run before additions so a transform can replace
//! a header in one pass.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Request;
use serde::Deserialize;

use crate::api::Spec;
use crate::middleware::{Constructor, Handler};
use crate::plugin::{decode_config, Plugin, PluginConfig, PluginError};

#[derive(Debug, Default, Deserialize)]
struct RequestTransformerConfig {
    #[serde(default)]
    add: AddSet,
    #[serde(default)]
    remove: RemoveSet,
}

#[derive(Debug, Default, Deserialize)]
struct AddSet {
    #[serde(default)]
    headers: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoveSet {
    #[serde(default)]
    headers: Vec<String>,
}

pub struct RequestTransformer;

impl RequestTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequestTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for RequestTransformer {
    fn name(&self) -> &'static str {
        "request_transformer"
    }

    fn middlewares(&self, raw: &PluginConfig, _spec: &Spec) -> Result<Vec<Constructor>, PluginError> {
        let config: RequestTransformerConfig = decode_config(raw)?;

        // Validate header names and values at build time; a bad transform
        // excludes the API instead of surfacing per request.
        let mut add = Vec::with_capacity(config.add.headers.len());
        for (name, value) in &config.add.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| PluginError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| PluginError::InvalidHeader(value.clone()))?;
            add.push((name, value));
        }

        let mut remove = Vec::with_capacity(config.remove.headers.len());
        for name in &config.remove.headers {
            remove.push(
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| PluginError::InvalidHeader(name.clone()))?,
            );
        }

        Ok(vec![transform_stage(add, remove)])
    }
}

fn transform_stage(
    add: Vec<(HeaderName, HeaderValue)>,
    remove: Vec<HeaderName>,
) -> Constructor {
    let add = Arc::new(add);
    let remove = Arc::new(remove);

    Arc::new(move |next: Handler| {
        let add = add.clone();
        let remove = remove.clone();
        Arc::new(move |mut req: Request<Body>| {
            for name in remove.iter() {
                req.headers_mut().remove(name);
            }
            for (name, value) in add.iter() {
                req.headers_mut().insert(name.clone(), value.clone());
            }
            next(req)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Response;
    use crate::middleware::{chain, handler};

    fn make_spec() -> Spec {
        Spec {
            definition: Arc::new(crate::api::Definition {
                name: "users".into(),
                listen_path: "/users".into(),
                upstream_url: "http://users:8080".into(),
                active: true,
                plugins: Vec::new(),
                oauth_server_name: None,
                updated_at: None,
            }),
            oauth: None,
        }
    }

    fn raw(json: serde_json::Value) -> PluginConfig {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_adds_and_removes_headers() {
        let plugin = RequestTransformer::new();
        let stages = plugin
            .middlewares(
                &raw(serde_json::json!({
                    "add": {"headers": {"X-Env": "staging"}},
                    "remove": {"headers": ["X-Internal"]}
                })),
                &make_spec(),
            )
            .unwrap();

        let inner = handler(|req: Request<Body>| async move {
            assert_eq!(req.headers().get("X-Env").unwrap(), "staging");
            assert!(req.headers().get("X-Internal").is_none());
            Response::new(Body::empty())
        });

        let composed = chain(&stages, inner);
        composed(
            Request::builder()
                .header("X-Internal", "secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    }

    #[test]
    fn test_invalid_header_name_fails_the_build() {
        let plugin = RequestTransformer::new();
        let result = plugin.middlewares(
            &raw(serde_json::json!({"add": {"headers": {"bad header": "x"}}})),
            &make_spec(),
        );

        assert!(matches!(result, Err(PluginError::InvalidHeader(_))));
    }

    #[test]
    fn test_empty_config_is_a_no_op_transform() {
        let plugin = RequestTransformer::new();
        let stages = plugin.middlewares(&PluginConfig::new(), &make_spec()).unwrap();
        assert_eq!(stages.len(), 1);
    }
}
