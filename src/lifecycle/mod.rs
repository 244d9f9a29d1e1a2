//! Lifecycle management.
//!
//! Startup is ordered (config → store → repositories → plugins → manager →
//! listeners) and fails fast: any missing startup dependency is fatal at
//! boot, never deferred into request handling. Shutdown fans out through a
//! broadcast channel that every background task subscribes to.

pub mod shutdown;

pub use shutdown::Shutdown;
