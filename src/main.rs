//! API Gateway entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌────────────────────────────────────────────────────────────┐
//!   │                      GATEWAY INSTANCE                       │
//!   │                                                             │
//!   │  definitions backend        pub/sub channel                 │
//!   │  (file/mongodb/postgres)    (janus.cluster.notifications)   │
//!   │        │                          │                         │
//!   │        ▼ full snapshot            ▼ change signal           │
//!   │  ┌───────────┐    reload    ┌───────────┐                   │
//!   │  │repository │◀─────────────│ notifier  │                   │
//!   │  └─────┬─────┘              └───────────┘                   │
//!   │        ▼                                                    │
//!   │  ┌───────────┐   plugin registry   ┌──────────────────┐     │
//!   │  │  manager  │────────────────────▶│ per-API chains   │     │
//!   │  └─────┬─────┘  (rate_limit, auth, │ (atomic table    │     │
//!   │        │         transforms)       │  swap on reload) │     │
//!   │        ▼                           └──────────────────┘     │
//!   │   serve loop ──▶ chain ──▶ upstream                         │
//!   └────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_gateway::api::repository::build_repository;
use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::gateway::{Manager, UpstreamForwarder};
use api_gateway::notifier::RedisSubscriber;
use api_gateway::oauth::repository::build_oauth_repository;
use api_gateway::observability::metrics;
use api_gateway::plugin::oauth2_secret::Oauth2Secret;
use api_gateway::plugin::organization::{BcryptHash, Organization, StaticUserRepository, User};
use api_gateway::plugin::rate_limit::RateLimit;
use api_gateway::plugin::request_transformer::RequestTransformer;
use api_gateway::plugin::{Plugin, Registry};
use api_gateway::store::{build_store, Store};
use api_gateway::{GatewayServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "api-gateway", about = "API gateway control plane")]
struct Args {
    /// Path to the gateway configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("api_gateway={},tower_http=warn", config.observability.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        bind_address = %config.server.bind_address,
        database_dsn = %config.database.dsn,
        storage_dsn = %config.storage.dsn,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Startup dependencies are fatal when missing: an unsupported scheme or
    // unreachable store must never be deferred into request handling.
    let store = build_store(&config.storage.dsn).await?;

    let refresh = std::time::Duration::from_secs(config.database.refresh_interval_secs);
    let repository = build_repository(&config.database.dsn, refresh).await?;
    let oauth_repository = build_oauth_repository(&config.database.dsn).await?;

    let registry = Arc::new(Registry::new());
    registry.add([
        Arc::new(RateLimit::new(store.clone())) as Arc<dyn Plugin>,
        Arc::new(RequestTransformer::new()) as Arc<dyn Plugin>,
        Arc::new(Oauth2Secret::new()) as Arc<dyn Plugin>,
    ]);

    if let Some(users_file) = &config.auth.users_file {
        let users: Vec<User> = serde_json::from_str(&std::fs::read_to_string(users_file)?)?;
        tracing::info!(users = users.len(), "Organization auth enabled");
        registry.add([Arc::new(Organization::new(
            Arc::new(StaticUserRepository::new(users)),
            Arc::new(BcryptHash),
        )) as Arc<dyn Plugin>]);
    }

    let manager = Arc::new(Manager::new(
        repository,
        oauth_repository,
        registry,
        Arc::new(UpstreamForwarder::new()),
    ));
    manager.load().await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_interrupt();

    // Cluster notifications ride the same Redis the counters use; a
    // memory-backed deployment is single-instance and needs neither.
    match &store {
        Store::Redis(_) => {
            let subscriber = Arc::new(RedisSubscriber::open(&config.storage.dsn)?);
            manager
                .clone()
                .listen(subscriber, &config.cluster.channel, &shutdown)
                .await?;
            tracing::info!(channel = %config.cluster.channel, "Cluster notifications enabled");
        }
        Store::Memory(_) => {
            tracing::info!("No distributed storage configured, cluster notifications disabled");
        }
    }

    manager.clone().watch(&shutdown);

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = GatewayServer::new(&config, manager);
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
