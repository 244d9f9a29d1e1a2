//! Cluster change notifications.
//!
//! # Data Flow
//! ```text
//! management surface mutates a definition
//!     → Notifier::notify (serialize, publish, best-effort)
//!     → pub/sub channel (default "janus.cluster.notifications")
//!     → every subscribed instance's callback
//!     → require_reload(command)? → full re-fetch + atomic table swap
//! ```
//!
//! # Design Decisions
//! - The payload is only a change signal; receivers never apply deltas
//!   because delivery order across publishers is not causal.
//! - notify returns a bool and logs failures instead of propagating them:
//!   API mutation handlers must not be blocked by notification plumbing.
//! - Publishers stamp their instance signature so receivers can suppress
//!   their own messages.

pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::redis::{RedisPublisher, RedisSubscriber};

/// Default pub/sub channel for cluster notifications.
pub const DEFAULT_CHANNEL: &str = "janus.cluster.notifications";

/// Commands carried by cluster notifications.
///
/// Wire strings outside the known set parse into `Unknown`, which never
/// requires a reload; the variant keeps the classifier extensible for
/// future non-reloading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationCommand {
    ApiUpdated,
    ApiRemoved,
    ApiAdded,
    OAuthUpdated,
    OAuthRemoved,
    OAuthAdded,
    #[serde(other)]
    Unknown,
}

/// Message published to the cluster channel. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub command: NotificationCommand,

    /// Opaque identifier of the changed entity; receivers re-fetch
    /// everything and never interpret it.
    pub payload: String,

    /// Instance signature of the publisher, for self-suppression.
    pub signature: String,
}

/// Whether a command requires the routing table to be rebuilt.
pub fn require_reload(command: NotificationCommand) -> bool {
    use NotificationCommand::*;

    match command {
        ApiUpdated | ApiRemoved | ApiAdded | OAuthUpdated | OAuthRemoved | OAuthAdded => true,
        Unknown => false,
    }
}

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Fire-and-forget message publication. At-most-once, no built-in retry.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<(), NotifierError>;
}

/// Callback invoked for each inbound notification, potentially concurrently
/// with other invocations.
pub type NotificationCallback = Arc<dyn Fn(Notification) + Send + Sync>;

/// Channel subscription; each inbound message invokes the callback.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn subscribe(
        &self,
        channel: &str,
        callback: NotificationCallback,
    ) -> Result<(), NotifierError>;
}

/// Best-effort notification sender.
pub struct Notifier {
    publisher: Arc<dyn Publisher>,
    channel: String,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn Publisher>, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        let channel = if channel.is_empty() {
            DEFAULT_CHANNEL.to_string()
        } else {
            channel
        };

        Self { publisher, channel }
    }

    /// Publish a notification to the cluster channel.
    ///
    /// Serialization and publish failures are logged, never propagated;
    /// the return value only reports whether the message went out.
    pub async fn notify(&self, notification: &Notification) -> bool {
        let data = match serde_json::to_vec(notification) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "Problem serializing notification");
                return false;
            }
        };

        tracing::debug!(command = ?notification.command, "Sending notification");
        if let Err(e) = self.publisher.publish(&self.channel, &data).await {
            tracing::error!(error = %e, "Could not send notification");
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_defined_command_requires_reload() {
        use NotificationCommand::*;

        for command in [ApiUpdated, ApiRemoved, ApiAdded, OAuthUpdated, OAuthRemoved, OAuthAdded] {
            assert!(require_reload(command), "{command:?} must require reload");
        }
    }

    #[test]
    fn test_unrecognized_command_does_not_require_reload() {
        let notification: Notification = serde_json::from_str(
            r#"{"command": "ClusterPing", "payload": "", "signature": "abc"}"#,
        )
        .unwrap();

        assert_eq!(notification.command, NotificationCommand::Unknown);
        assert!(!require_reload(notification.command));
    }

    #[test]
    fn test_wire_format_round_trip() {
        let notification = Notification {
            command: NotificationCommand::ApiUpdated,
            payload: "users".to_string(),
            signature: "instance-1".to_string(),
        };

        let encoded = serde_json::to_string(&notification).unwrap();
        assert!(encoded.contains(r#""command":"ApiUpdated""#));

        let decoded: Notification = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.command, NotificationCommand::ApiUpdated);
        assert_eq!(decoded.payload, "users");
    }
}
