//! API Gateway control plane.
//!
//! Loads declarative API and OAuth definitions from pluggable backends,
//! propagates configuration changes across a fleet of instances over
//! pub/sub, and assembles per-API request chains from a plugin registry.

// Definitions and their backends
pub mod api;
pub mod oauth;

// Cluster change propagation
pub mod notifier;

// Chain construction
pub mod middleware;
pub mod plugin;
pub mod store;

// Orchestration
pub mod gateway;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use gateway::server::GatewayServer;
pub use gateway::Manager;
pub use lifecycle::Shutdown;
pub use plugin::Registry;
