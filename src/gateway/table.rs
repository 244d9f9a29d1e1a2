//! Live routing table.
//!
//! # Design Decisions
//! - Immutable after construction: readers share it lock-free through an
//!   atomic pointer swap, the reload builds a replacement off to the side
//! - Longest listen-path prefix wins, checked in O(n); explicit no-match
//!   rather than a silent default

use axum::body::Body;
use axum::http::Request;

use crate::api::Spec;
use crate::middleware::Handler;

/// One routed API: its spec and the fully composed request chain.
pub struct RouteEntry {
    pub spec: Spec,
    pub handler: Handler,
}

impl RouteEntry {
    pub fn name(&self) -> &str {
        &self.spec.definition.name
    }

    pub fn listen_path(&self) -> &str {
        &self.spec.definition.listen_path
    }
}

/// Mapping from request path to routed API. Rebuilt wholesale on every
/// reload and swapped in atomically.
#[derive(Default)]
pub struct RoutingTable {
    // Sorted longest listen path first so the first prefix hit is the most
    // specific one.
    routes: Vec<RouteEntry>,
}

impl RoutingTable {
    pub fn new(mut routes: Vec<RouteEntry>) -> Self {
        routes.sort_by(|a, b| b.listen_path().len().cmp(&a.listen_path().len()));
        Self { routes }
    }

    /// Find the entry serving a request, by path prefix.
    pub fn lookup(&self, req: &Request<Body>) -> Option<&RouteEntry> {
        let path = req.uri().path();
        self.routes
            .iter()
            .find(|entry| path.starts_with(entry.listen_path()))
    }

    /// Find an entry by API name.
    pub fn get(&self, name: &str) -> Option<&RouteEntry> {
        self.routes.iter().find(|entry| entry.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.routes.iter().map(|entry| entry.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
