//! Thin HTTP serve loop.
//!
//! The listen/dispatch mechanism is a collaborator of the control plane:
//! this wiring only hands every inbound request to the manager's routing
//! table and streams the response back.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::gateway::Manager;
use crate::lifecycle::Shutdown;

pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, manager: Arc<Manager>) -> Self {
        let router = Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(manager)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http());

        Self { router }
    }

    /// Serve until the shutdown signal fires.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut shutdown_rx = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn dispatch(State(manager): State<Arc<Manager>>, request: Request<Body>) -> impl IntoResponse {
    let response: Response = manager.handle(request).await;
    response
}
