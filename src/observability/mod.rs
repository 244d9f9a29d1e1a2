//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields, EnvFilter-controlled)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metric updates are cheap atomic operations
//! - Decision recording is decoupled from enforcement: the rate-limit
//!   observer stage records allow/deny, the enforcement stage never waits
//!   on it

pub mod metrics;
