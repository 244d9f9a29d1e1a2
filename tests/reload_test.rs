//! End-to-end reload behavior: notifications trigger a full re-fetch and
//! an atomic table swap.

use std::sync::Arc;
use std::time::Duration;

use api_gateway::gateway::Manager;
use api_gateway::notifier::{Notification, NotificationCommand, Notifier};
use api_gateway::plugin::Registry;
use api_gateway::Shutdown;

mod common;

use common::{definition, EchoForwarder, InMemoryOAuthRepository, InMemoryRepository, InProcessBus};

const CHANNEL: &str = "janus.cluster.notifications";

fn make_manager(repo: Arc<InMemoryRepository>) -> Arc<Manager> {
    Arc::new(Manager::new(
        repo,
        Arc::new(InMemoryOAuthRepository::empty()),
        Arc::new(Registry::new()),
        Arc::new(EchoForwarder),
    ))
}

async fn settle() {
    // The reload runs on a background task; give it a beat.
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_notification_triggers_full_refetch() {
    let repo = Arc::new(InMemoryRepository::new(vec![definition("users")]));
    let manager = make_manager(repo.clone());
    let bus = Arc::new(InProcessBus::new());
    let shutdown = Shutdown::new();

    manager.load().await.unwrap();
    assert_eq!(manager.table().names(), vec!["users"]);

    manager.clone().listen(bus.clone(), CHANNEL, &shutdown).await.unwrap();

    // Another instance adds an API and notifies with only an opaque
    // payload; this instance must re-derive the full set.
    repo.set(vec![definition("users"), definition("orders")]);

    let notifier = Notifier::new(bus.clone(), CHANNEL);
    let sent = notifier
        .notify(&Notification {
            command: NotificationCommand::ApiAdded,
            payload: "orders".to_string(),
            signature: "some-other-instance".to_string(),
        })
        .await;
    assert!(sent);

    settle().await;

    let table = manager.table();
    let mut names = table.names();
    names.sort();
    assert_eq!(names, vec!["orders", "users"]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_own_notification_is_suppressed() {
    let repo = Arc::new(InMemoryRepository::new(vec![definition("users")]));
    let manager = make_manager(repo.clone());
    let bus = Arc::new(InProcessBus::new());
    let shutdown = Shutdown::new();

    manager.load().await.unwrap();
    manager.clone().listen(bus.clone(), CHANNEL, &shutdown).await.unwrap();

    // This instance already applied its own write locally; its own
    // signature must not cause a redundant reload.
    repo.set(vec![definition("users"), definition("orders")]);

    let notifier = Notifier::new(bus.clone(), CHANNEL);
    notifier
        .notify(&Notification {
            command: NotificationCommand::ApiAdded,
            payload: "orders".to_string(),
            signature: manager.signature().to_string(),
        })
        .await;

    settle().await;
    assert_eq!(manager.table().names(), vec!["users"]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_non_reload_command_is_ignored() {
    let repo = Arc::new(InMemoryRepository::new(vec![definition("users")]));
    let manager = make_manager(repo.clone());
    let bus = Arc::new(InProcessBus::new());
    let shutdown = Shutdown::new();

    manager.load().await.unwrap();
    manager.clone().listen(bus.clone(), CHANNEL, &shutdown).await.unwrap();

    repo.set(vec![definition("users"), definition("orders")]);

    // An unrecognized command classifies as not-requiring-reload.
    let notification: Notification = serde_json::from_str(
        r#"{"command": "ClusterPing", "payload": "", "signature": "other"}"#,
    )
    .unwrap();
    Notifier::new(bus.clone(), CHANNEL).notify(&notification).await;

    settle().await;
    assert_eq!(manager.table().names(), vec!["users"]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_removed_api_leaves_the_table() {
    let repo = Arc::new(InMemoryRepository::new(vec![
        definition("users"),
        definition("orders"),
    ]));
    let manager = make_manager(repo.clone());
    let bus = Arc::new(InProcessBus::new());
    let shutdown = Shutdown::new();

    manager.load().await.unwrap();
    assert_eq!(manager.table().len(), 2);

    manager.clone().listen(bus.clone(), CHANNEL, &shutdown).await.unwrap();

    repo.set(vec![definition("users")]);
    Notifier::new(bus.clone(), CHANNEL)
        .notify(&Notification {
            command: NotificationCommand::ApiRemoved,
            payload: "orders".to_string(),
            signature: "other".to_string(),
        })
        .await;

    settle().await;
    assert_eq!(manager.table().names(), vec!["users"]);

    shutdown.trigger();
}
