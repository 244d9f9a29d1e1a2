//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validate (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared by reference into the bootstrap
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; API definitions reload through the
//!   repository, never through this file
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
