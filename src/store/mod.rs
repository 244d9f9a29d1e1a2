//! Counter storage for rate limiting.
//!
//! # Responsibilities
//! - Abstract the window-counter backend behind one operation:
//!   increment-and-check
//! - Select the backend from the storage DSN scheme
//!
//! # Design Decisions
//! - Tagged variant instead of a trait object: the rate-limit plugin must
//!   know whether the configured store is distributed, and a closed set of
//!   backends keeps that check explicit.
//! - An unsupported scheme is a fatal startup error, never a silent default.

pub mod memory;
pub mod redis;

use std::time::Duration;

use thiserror::Error;
use url::Url;

pub use memory::MemoryStore;
pub use redis::RedisStore;

const REDIS_SCHEME: &str = "redis";
const MEMORY_SCHEME: &str = "memory";

/// Errors produced by counter stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage DSN could not be parsed.
    #[error("invalid storage DSN: {0}")]
    InvalidDsn(#[from] url::ParseError),

    /// The storage DSN scheme maps to no known backend.
    #[error("unsupported storage scheme: {0}")]
    UnsupportedScheme(String),

    /// A Redis round trip failed.
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// A window-counter store, local or distributed.
#[derive(Clone)]
pub enum Store {
    /// Shared fleet-wide counters backed by Redis.
    Redis(RedisStore),
    /// Per-process counters, no cross-instance aggregation.
    Memory(MemoryStore),
}

impl Store {
    /// Increment the counter for `key` within the current window and return
    /// the post-increment count.
    pub async fn incr(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        match self {
            Store::Redis(store) => store.incr(key, window).await,
            Store::Memory(store) => Ok(store.incr(key, window)),
        }
    }

    /// The scheme this store was built from.
    pub fn kind(&self) -> &'static str {
        match self {
            Store::Redis(_) => REDIS_SCHEME,
            Store::Memory(_) => MEMORY_SCHEME,
        }
    }
}

/// Build a counter store from a storage DSN.
///
/// `redis://` connects a distributed store; `memory://` selects the
/// in-process store. Anything else is a configuration error.
pub async fn build_store(dsn: &str) -> Result<Store, StoreError> {
    let url = Url::parse(dsn)?;

    match url.scheme() {
        REDIS_SCHEME => {
            tracing::debug!("Redis storage chosen");
            Ok(Store::Redis(RedisStore::connect(dsn).await?))
        }
        MEMORY_SCHEME => {
            tracing::debug!("In-memory storage chosen");
            Ok(Store::Memory(MemoryStore::new()))
        }
        other => Err(StoreError::UnsupportedScheme(other.to_string())),
    }
}
