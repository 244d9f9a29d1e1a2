//! Request-processing chain primitives.
//!
//! # Responsibilities
//! - Define the `Handler` and `Constructor` types shared by all plugins
//! - Compose an ordered list of stages into a single handler
//! - Provide short-circuit and client-identity helpers
//!
//! # Design Decisions
//! - Stages are explicit continuations: each constructor receives the next
//!   stage and returns the wrapped stage. A stage short-circuits by
//!   returning a response without invoking its continuation.
//! - `chain` folds right-to-left so stages run in configured order on the
//!   inbound path and in reverse on the outbound path.
//! - No framework-level layering; the chain is rebuilt wholesale on reload
//!   and shared immutably afterwards.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::Response,
};
use futures_util::future::BoxFuture;

/// A fully composed request handler: takes the request, returns the response.
pub type Handler = Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

/// A middleware stage constructor: wraps the next stage and returns the
/// composed stage.
pub type Constructor = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Compose stages into a single handler.
///
/// Folds right-to-left over the configured order, so the first constructor
/// in the slice becomes the outermost stage.
pub fn chain(stages: &[Constructor], inner: Handler) -> Handler {
    stages.iter().rev().fold(inner, |next, build| build(next))
}

/// Lift an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Build a short-circuit rejection response.
pub fn reject(status: StatusCode, message: impl Into<Body>) -> Response {
    let mut response = Response::new(message.into());
    *response.status_mut() = status;
    response
}

/// Extract the requester identity used for rate-limit keys.
///
/// Prefers the peer address injected by the listener; falls back to
/// `X-Forwarded-For` when the gateway sits behind another proxy.
pub fn client_ip(req: &Request<Body>) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
