//! Upstream forwarding: the terminal stage of every chain.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{Request, StatusCode, Uri};
use axum::response::Response;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::api::Definition;
use crate::middleware::{reject, Handler};

/// Produces the terminal stage of an API's chain.
///
/// The HTTP dispatch mechanism is a collaborator of the control plane;
/// embedders (and tests) substitute their own implementation.
pub trait Forwarder: Send + Sync {
    fn handler(&self, definition: &Definition) -> Handler;
}

/// Default forwarder over hyper's pooled client.
pub struct UpstreamForwarder {
    client: Client<HttpConnector, Body>,
}

impl UpstreamForwarder {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }
}

impl Default for UpstreamForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl Forwarder for UpstreamForwarder {
    fn handler(&self, definition: &Definition) -> Handler {
        let client = self.client.clone();
        let upstream = definition.upstream_url.clone();
        let api = definition.name.clone();

        Arc::new(move |req: Request<Body>| {
            let client = client.clone();
            let upstream = upstream.clone();
            let api = api.clone();

            Box::pin(async move {
                // The upstream URL was validated at load time; a parse
                // failure here means the definition changed underneath us.
                let Ok(target) = Url::parse(&upstream) else {
                    tracing::error!(api = %api, upstream = %upstream, "Invalid upstream URL");
                    return reject(StatusCode::BAD_GATEWAY, "Invalid upstream");
                };

                let mut parts = req.uri().clone().into_parts();
                parts.scheme = Some(if target.scheme() == "https" {
                    Scheme::HTTPS
                } else {
                    Scheme::HTTP
                });
                if let Ok(authority) = Authority::from_str(target.authority()) {
                    parts.authority = Some(authority);
                }

                let uri = match Uri::from_parts(parts) {
                    Ok(uri) => uri,
                    Err(e) => {
                        tracing::error!(api = %api, error = %e, "Failed to build upstream URI");
                        return reject(StatusCode::BAD_GATEWAY, "Invalid upstream");
                    }
                };

                let (mut head, body) = req.into_parts();
                head.uri = uri;
                let outbound = Request::from_parts(head, body);

                match client.request(outbound).await {
                    Ok(response) => {
                        let (parts, body) = response.into_parts();
                        Response::from_parts(parts, Body::new(body))
                    }
                    Err(e) => {
                        tracing::error!(api = %api, error = %e, "Upstream request failed");
                        reject(StatusCode::BAD_GATEWAY, "Upstream request failed")
                    }
                }
            })
        })
    }
}
