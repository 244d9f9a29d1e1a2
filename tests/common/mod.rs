//! Shared fixtures for integration tests.

// Each test binary uses a different subset of these fixtures.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::Response;

use api_gateway::api::repository::{Repository, RepositoryError};
use api_gateway::api::{Definition, PluginReference};
use api_gateway::gateway::Forwarder;
use api_gateway::middleware::{handler, Handler};
use api_gateway::notifier::{
    Notification, NotificationCallback, NotifierError, Publisher, Subscriber,
};
use api_gateway::oauth::repository::OAuthRepository;
use api_gateway::oauth::OAuthSpec;
use api_gateway::plugin::organization::{AuthError, User, UserRepository};

/// Definition with no plugins.
pub fn definition(name: &str) -> Definition {
    Definition {
        name: name.to_string(),
        listen_path: format!("/{name}"),
        upstream_url: format!("http://{name}:8080"),
        active: true,
        plugins: Vec::new(),
        oauth_server_name: None,
        updated_at: None,
    }
}

/// Definition with one configured plugin.
pub fn definition_with_plugin(name: &str, plugin: &str, config: serde_json::Value) -> Definition {
    let mut def = definition(name);
    def.plugins.push(PluginReference {
        name: plugin.to_string(),
        enabled: true,
        config: serde_json::from_value(config).unwrap(),
    });
    def
}

/// Mutable definition source standing in for a real backend.
pub struct InMemoryRepository {
    definitions: Mutex<Vec<Definition>>,
}

impl InMemoryRepository {
    pub fn new(definitions: Vec<Definition>) -> Self {
        Self {
            definitions: Mutex::new(definitions),
        }
    }

    /// Replace the stored set, as the management surface would.
    pub fn set(&self, definitions: Vec<Definition>) {
        *self.definitions.lock().unwrap() = definitions;
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_all(&self) -> Result<Vec<Definition>, RepositoryError> {
        Ok(self.definitions.lock().unwrap().clone())
    }

    fn kind(&self) -> &'static str {
        "in-memory"
    }
}

pub struct InMemoryOAuthRepository {
    specs: Mutex<Vec<OAuthSpec>>,
}

impl InMemoryOAuthRepository {
    pub fn new(specs: Vec<OAuthSpec>) -> Self {
        Self {
            specs: Mutex::new(specs),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl OAuthRepository for InMemoryOAuthRepository {
    async fn find_all(&self) -> Result<Vec<OAuthSpec>, RepositoryError> {
        Ok(self.specs.lock().unwrap().clone())
    }
}

pub fn oauth_spec(name: &str, secrets: &[(&str, &str)]) -> OAuthSpec {
    OAuthSpec {
        name: name.to_string(),
        secrets: secrets
            .iter()
            .map(|(id, secret)| (id.to_string(), secret.to_string()))
            .collect(),
        updated_at: None,
    }
}

/// In-process pub/sub bus: publish fans out synchronously to every
/// subscribed callback on the same channel.
#[derive(Default)]
pub struct InProcessBus {
    subscribers: Mutex<Vec<(String, NotificationCallback)>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Publisher for InProcessBus {
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<(), NotifierError> {
        let notification: Notification =
            serde_json::from_slice(data).expect("published payload must be a notification");

        let subscribers = self.subscribers.lock().unwrap();
        for (channel, callback) in subscribers.iter() {
            if channel == topic {
                callback(notification.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Subscriber for InProcessBus {
    async fn subscribe(
        &self,
        channel: &str,
        callback: NotificationCallback,
    ) -> Result<(), NotifierError> {
        self.subscribers
            .lock()
            .unwrap()
            .push((channel.to_string(), callback));
        Ok(())
    }
}

/// Terminal stage double: answers 200 and echoes the headers the chain
/// forwarded, so tests can observe what the upstream would have seen.
pub struct EchoForwarder;

impl Forwarder for EchoForwarder {
    fn handler(&self, def: &Definition) -> Handler {
        let name = def.name.clone();
        handler(move |req| {
            let name = name.clone();
            async move {
                let mut builder = Response::builder().status(200).header("x-upstream", name);
                if let Some(auth) = req.headers().get(AUTHORIZATION) {
                    builder = builder.header("x-echo-authorization", auth);
                }
                if let Some(org) = req.headers().get("X-Organization") {
                    builder = builder.header("x-echo-organization", org);
                }
                builder.body(Body::from("upstream")).unwrap()
            }
        })
    }
}

/// User source that counts lookups, for reject-before-lookup assertions.
pub struct CountingUserRepository {
    users: Vec<User>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingUserRepository {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl UserRepository for CountingUserRepository {
    async fn find_all(&self) -> Result<Vec<User>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.clone())
    }
}

/// Loose plugin params from a JSON literal.
pub fn raw_config(value: serde_json::Value) -> HashMap<String, serde_json::Value> {
    serde_json::from_value(value).unwrap()
}
