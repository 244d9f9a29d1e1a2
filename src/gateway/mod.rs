//! Gateway manager: composes repositories, plugins and the notifier into a
//! live routing table.
//!
//! # Data Flow
//! ```text
//! load():
//!     repository.find_all() ─┐
//!     oauth.find_all() ──────┼─▶ build chains per API ─▶ new RoutingTable
//!                            │        (bad config → exclude that API)
//!                            └─▶ atomic swap; readers never see a
//!                                half-updated table
//!
//! listen():
//!     pub/sub notification ─▶ own signature? drop
//!                          ─▶ requires reload? coalesce ─▶ load()
//! watch():
//!     repository change signal ──────────────────────────▶ load()
//! ```
//!
//! # Design Decisions
//! - Reload is the only writer; a failed re-fetch keeps the last-known-good
//!   table serving
//! - The notification payload is never trusted as data: every reload
//!   re-derives the full current state

pub mod proxy;
pub mod server;
pub mod table;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tokio::sync::mpsc;

use crate::api::repository::{ConfigurationChanged, Repository, RepositoryError};
use crate::api::{Definition, Spec};
use crate::lifecycle::Shutdown;
use crate::middleware::{chain, reject, Handler};
use crate::notifier::{require_reload, NotifierError, Subscriber};
use crate::oauth::repository::OAuthRepository;
use crate::oauth::OAuthSpec;
use crate::observability::metrics;
use crate::plugin::{PluginError, Registry};

pub use proxy::{Forwarder, UpstreamForwarder};
pub use table::{RouteEntry, RoutingTable};

pub struct Manager {
    repository: Arc<dyn Repository>,
    oauth_repository: Arc<dyn OAuthRepository>,
    registry: Arc<Registry>,
    forwarder: Arc<dyn Forwarder>,
    table: ArcSwap<RoutingTable>,
    signature: String,
}

impl Manager {
    pub fn new(
        repository: Arc<dyn Repository>,
        oauth_repository: Arc<dyn OAuthRepository>,
        registry: Arc<Registry>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            repository,
            oauth_repository,
            registry,
            forwarder,
            table: ArcSwap::from_pointee(RoutingTable::default()),
            signature: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// This instance's signature, stamped on outgoing notifications so the
    /// listener can suppress them on receipt.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Fetch the full definition and OAuth sets and swap in a freshly built
    /// routing table.
    pub async fn load(&self) -> Result<(), RepositoryError> {
        let definitions = match self.repository.find_all().await {
            Ok(definitions) => definitions,
            Err(e) => {
                metrics::record_reload(false);
                return Err(e);
            }
        };
        let oauth_specs = match self.oauth_repository.find_all().await {
            Ok(specs) => specs,
            Err(e) => {
                metrics::record_reload(false);
                return Err(e);
            }
        };

        let table = self.build_table(definitions, oauth_specs);
        let count = table.len();
        self.table.store(Arc::new(table));

        metrics::record_reload(true);
        metrics::record_active_apis(count);
        tracing::info!(apis = count, "Routing table loaded");
        Ok(())
    }

    /// The current table. Readers hold a cheap guard; the reload swap never
    /// blocks them.
    pub fn table(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// Dispatch a request through the matching API's chain.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let start = Instant::now();
        let method = req.method().to_string();
        let table = self.table.load_full();

        let Some(entry) = table.lookup(&req) else {
            tracing::debug!(path = %req.uri().path(), "No API matched");
            metrics::record_request(&method, 404, "none", start);
            return reject(StatusCode::NOT_FOUND, "No API configured for this path");
        };

        let api = entry.name().to_string();
        let response = (entry.handler)(req).await;
        metrics::record_request(&method, response.status().as_u16(), &api, start);
        response
    }

    fn build_table(
        &self,
        definitions: Vec<Definition>,
        oauth_specs: Vec<OAuthSpec>,
    ) -> RoutingTable {
        let oauth_index: HashMap<String, Arc<OAuthSpec>> = oauth_specs
            .into_iter()
            .map(|spec| (spec.name.clone(), Arc::new(spec)))
            .collect();

        let mut seen = std::collections::HashSet::new();
        let mut routes = Vec::new();

        for definition in definitions {
            if let Err(error) = definition.validate() {
                tracing::error!(api = %definition.name, error = %error, "Skipping invalid definition");
                metrics::record_api_excluded(&definition.name);
                continue;
            }
            if !definition.active {
                tracing::debug!(api = %definition.name, "Definition inactive, not routing");
                continue;
            }
            if !seen.insert(definition.name.clone()) {
                tracing::warn!(api = %definition.name, "Duplicate definition name, keeping the first");
                continue;
            }

            let oauth = definition
                .oauth_server_name
                .as_ref()
                .and_then(|name| oauth_index.get(name).cloned());

            let spec = Spec {
                definition: Arc::new(definition),
                oauth,
            };

            match self.build_chain(&spec) {
                Ok(handler) => routes.push(RouteEntry { spec, handler }),
                Err(error) => {
                    // One bad API must not take the rest down; it stays out
                    // of the table until a corrected reload arrives.
                    tracing::error!(
                        api = %spec.definition.name,
                        error = %error,
                        "Excluding API from routing table"
                    );
                    metrics::record_api_excluded(&spec.definition.name);
                }
            }
        }

        RoutingTable::new(routes)
    }

    /// Resolve the definition's plugin references into one composed handler.
    fn build_chain(&self, spec: &Spec) -> Result<Handler, PluginError> {
        let mut stages = Vec::new();

        for reference in &spec.definition.plugins {
            if !reference.enabled {
                tracing::debug!(
                    api = %spec.definition.name,
                    plugin = %reference.name,
                    "Plugin disabled, skipping"
                );
                continue;
            }

            let plugin = self
                .registry
                .get(&reference.name)
                .ok_or_else(|| PluginError::Unknown(reference.name.clone()))?;

            stages.extend(plugin.middlewares(&reference.config, spec)?);
        }

        let inner = self.forwarder.handler(&spec.definition);
        Ok(chain(&stages, inner))
    }

    /// Subscribe to cluster notifications and reload on every foreign
    /// reload-worthy message. Callbacks only enqueue; the actual re-fetch
    /// runs on a dedicated task so notification delivery is never blocked
    /// behind a slow backend.
    pub async fn listen(
        self: Arc<Self>,
        subscriber: Arc<dyn Subscriber>,
        channel: &str,
        shutdown: &Shutdown,
    ) -> Result<(), NotifierError> {
        let (tx, rx) = mpsc::channel::<()>(1);
        let signature = self.signature.clone();

        subscriber
            .subscribe(
                channel,
                Arc::new(move |notification| {
                    if notification.signature == signature {
                        tracing::debug!("Dropping own notification");
                        return;
                    }
                    if !require_reload(notification.command) {
                        tracing::debug!(command = ?notification.command, "Notification requires no reload");
                        return;
                    }

                    tracing::info!(command = ?notification.command, "Configuration change notified");
                    // try_send coalesces: one queued reload re-derives
                    // everything regardless of how many signals arrived.
                    let _ = tx.try_send(());
                }),
            )
            .await?;

        self.spawn_reload_loop(rx, shutdown);
        Ok(())
    }

    /// Wire the repository's own change-watch (filesystem events, store
    /// polling) into the same reload path.
    pub fn watch(self: Arc<Self>, shutdown: &Shutdown) {
        let (tx, rx) = mpsc::channel::<ConfigurationChanged>(1);

        if !self.repository.watch(shutdown.subscribe(), tx) {
            tracing::debug!(
                backend = self.repository.kind(),
                "Repository exposes no change-watch"
            );
            return;
        }

        let manager = self.clone();
        let mut shutdown_rx = shutdown.subscribe();
        let mut rx = rx;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    signal = rx.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        manager.reload().await;
                    }
                }
            }
        });
    }

    fn spawn_reload_loop(self: Arc<Self>, mut rx: mpsc::Receiver<()>, shutdown: &Shutdown) {
        let manager = self;
        let mut shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    signal = rx.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        manager.reload().await;
                    }
                }
            }
        });
    }

    async fn reload(&self) {
        if let Err(e) = self.load().await {
            tracing::error!(error = %e, "Reload failed, keeping last known good routing table");
        }
    }
}
