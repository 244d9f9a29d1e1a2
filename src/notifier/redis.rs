//! Redis pub/sub transport for cluster notifications.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;

use crate::notifier::{Notification, NotificationCallback, NotifierError, Publisher, Subscriber};

/// Publisher over a multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisPublisher {
    conn: ConnectionManager,
}

impl RedisPublisher {
    pub async fn connect(dsn: &str) -> Result<Self, NotifierError> {
        let client = redis::Client::open(dsn)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<(), NotifierError> {
        let mut conn = self.conn.clone();
        let _subscriber_count: i64 = redis::cmd("PUBLISH")
            .arg(topic)
            .arg(data)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

/// Subscriber running a long-lived pub/sub task per channel.
pub struct RedisSubscriber {
    client: redis::Client,
}

impl RedisSubscriber {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn open(dsn: &str) -> Result<Self, NotifierError> {
        Ok(Self {
            client: redis::Client::open(dsn)?,
        })
    }
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    /// Subscribe and spawn the listen loop.
    ///
    /// Each message invokes the callback on the listener task; a malformed
    /// payload is logged and skipped. A closed connection is re-established
    /// with a short backoff so the instance keeps tracking cluster changes.
    async fn subscribe(
        &self,
        channel: &str,
        callback: NotificationCallback,
    ) -> Result<(), NotifierError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let client = self.client.clone();
        let channel = channel.to_string();

        tokio::spawn(async move {
            let mut pubsub = pubsub;

            loop {
                while let Some(msg) = pubsub.on_message().next().await {
                    let payload: String = match msg.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to read notification payload");
                            continue;
                        }
                    };

                    let notification: Notification = match serde_json::from_str(&payload) {
                        Ok(notification) => notification,
                        Err(e) => {
                            tracing::error!(error = %e, payload = %payload, "Failed to parse notification");
                            continue;
                        }
                    };

                    callback(notification);
                }

                tracing::warn!(channel = %channel, "Notification stream closed, reconnecting");
                tokio::time::sleep(Duration::from_secs(1)).await;

                match client.get_async_pubsub().await {
                    Ok(mut fresh) => match fresh.subscribe(&channel).await {
                        Ok(()) => pubsub = fresh,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to resubscribe to notifications")
                        }
                    },
                    Err(e) => tracing::error!(error = %e, "Failed to reconnect notification stream"),
                }
            }
        });

        Ok(())
    }
}
