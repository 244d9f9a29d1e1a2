//! Distributed window counters backed by Redis.

use std::time::Duration;

use redis::aio::ConnectionManager;

use crate::store::StoreError;

/// Fleet-wide counter store.
///
/// Every instance enforcing the same API's limit increments one logical
/// counter here, so the aggregate rate across the fleet respects the
/// configured limit. The increment and the TTL arm in a single atomic
/// round trip; counts are never cached locally.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to the Redis instance behind `dsn`.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(dsn)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Wrap an already-established connection (shared with the notifier).
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Atomically increment the counter for `key`, arming the window TTL on
    /// first increment. Returns the post-increment count.
    pub async fn incr(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        // INCR + EXPIRE must be one round trip; two commands would race
        // against other instances and could leave an immortal key.
        let script = redis::Script::new(
            r"
            local count = redis.call('INCR', KEYS[1])
            if count == 1 then
                redis.call('EXPIRE', KEYS[1], ARGV[1])
            end
            return count
            ",
        );

        let mut conn = self.conn.clone();
        let count: u64 = script
            .key(key)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;

        Ok(count)
    }
}
