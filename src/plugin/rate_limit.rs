//! Rate limiting plugin.
//!
//! # Responsibilities
//! - Parse the textual rate descriptor ("<N>-<unit>") at load time
//! - Select the counter store for the configured policy
//! - Reject requests over the limit before they reach the upstream
//!
//! # Design Decisions
//! - Counter keys are `(prefix, requester-ip)` with the prefix taken from
//!   the API name, so counters never collide across APIs sharing one store
//!   and survive unrelated reloads.
//! - The "redis" policy shares one logical counter across the fleet; the
//!   "local" policy builds a fresh per-process store for the API.
//! - Allow/deny recording rides a separate observer stage, decoupled from
//!   the enforcement path.
//! - A store round-trip failure at request time is logged and fails open;
//!   a misconfigured policy at load time excludes the API instead.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde::Deserialize;

use crate::api::Spec;
use crate::middleware::{client_ip, reject, Constructor, Handler};
use crate::observability::metrics;
use crate::plugin::{decode_config, Plugin, PluginConfig, PluginError};
use crate::store::{MemoryStore, Store};

/// Prefix used when an API name is unavailable.
pub const DEFAULT_PREFIX: &str = "limiter";

#[derive(Debug, Deserialize)]
struct RateLimitConfig {
    limit: String,
    policy: String,
}

/// A parsed rate: `limit` requests per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub limit: u64,
    pub period: Duration,
}

impl FromStr for Rate {
    type Err = PluginError;

    /// Parse a descriptor like `"10-S"`: 10 requests per second. Units are
    /// S, M, H and D, case-insensitive.
    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let malformed = || PluginError::InvalidRate(descriptor.to_string());

        let (count, unit) = descriptor.split_once('-').ok_or_else(malformed)?;
        let limit: u64 = count.parse().map_err(|_| malformed())?;
        if limit == 0 {
            return Err(malformed());
        }

        let period = match unit.to_ascii_uppercase().as_str() {
            "S" => Duration::from_secs(1),
            "M" => Duration::from_secs(60),
            "H" => Duration::from_secs(60 * 60),
            "D" => Duration::from_secs(24 * 60 * 60),
            _ => return Err(malformed()),
        };

        Ok(Rate { limit, period })
    }
}

/// The rate limit plugin. Holds the gateway-wide store configured at
/// startup; per-API policy decides whether that store or a fresh local one
/// backs the counters.
pub struct RateLimit {
    store: Store,
}

impl RateLimit {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn limiter_store(&self, policy: &str) -> Result<Store, PluginError> {
        match policy {
            "redis" => match &self.store {
                Store::Redis(_) => Ok(self.store.clone()),
                Store::Memory(_) => Err(PluginError::InvalidStorage),
            },
            "local" => Ok(Store::Memory(MemoryStore::new())),
            other => Err(PluginError::InvalidPolicy(other.to_string())),
        }
    }
}

impl Plugin for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn middlewares(&self, raw: &PluginConfig, spec: &Spec) -> Result<Vec<Constructor>, PluginError> {
        let config: RateLimitConfig = decode_config(raw)?;
        let rate: Rate = config.limit.parse()?;
        let store = self.limiter_store(&config.policy)?;

        let prefix = if spec.definition.name.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            spec.definition.name.clone()
        };

        Ok(vec![
            observer_stage(prefix.clone()),
            enforcement_stage(store, rate, prefix),
        ])
    }
}

/// Records allow/deny outcomes on the outbound path.
fn observer_stage(api: String) -> Constructor {
    Arc::new(move |next: Handler| {
        let api = api.clone();
        Arc::new(move |req: Request<Body>| {
            let next = next.clone();
            let api = api.clone();
            Box::pin(async move {
                let response = next(req).await;
                if response.status() == StatusCode::TOO_MANY_REQUESTS {
                    metrics::record_rate_limited(&api);
                } else {
                    metrics::record_rate_allowed(&api);
                }
                response
            })
        })
    })
}

/// Increments the window counter and rejects requests over the limit.
fn enforcement_stage(store: Store, rate: Rate, prefix: String) -> Constructor {
    Arc::new(move |next: Handler| {
        let store = store.clone();
        let prefix = prefix.clone();
        Arc::new(move |req: Request<Body>| {
            let store = store.clone();
            let prefix = prefix.clone();
            let next = next.clone();
            Box::pin(async move {
                let key = format!("{}:{}", prefix, client_ip(&req));

                match store.incr(&key, rate.period).await {
                    Ok(count) if count > rate.limit => {
                        tracing::warn!(key = %key, limit = rate.limit, "Rate limit exceeded");
                        reject(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")
                    }
                    Ok(_) => next(req).await,
                    Err(e) => {
                        // Fail open: a store outage degrades limiting, not
                        // availability.
                        tracing::warn!(error = %e, key = %key, "Rate limit store unavailable, allowing request");
                        next(req).await
                    }
                }
            })
        })
    })
}
