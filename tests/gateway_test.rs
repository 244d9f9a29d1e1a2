//! Routing table construction and request dispatch through composed
//! chains.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};

use api_gateway::gateway::Manager;
use api_gateway::plugin::rate_limit::RateLimit;
use api_gateway::plugin::request_transformer::RequestTransformer;
use api_gateway::plugin::{Plugin, Registry};
use api_gateway::store::{MemoryStore, Store};

mod common;

use common::{
    definition, definition_with_plugin, EchoForwarder, InMemoryOAuthRepository, InMemoryRepository,
};

fn registry_with_defaults() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry.add([
        Arc::new(RateLimit::new(Store::Memory(MemoryStore::new()))) as Arc<dyn Plugin>,
        Arc::new(RequestTransformer::new()) as Arc<dyn Plugin>,
    ]);
    registry
}

fn make_manager(defs: Vec<api_gateway::api::Definition>) -> Arc<Manager> {
    Arc::new(Manager::new(
        Arc::new(InMemoryRepository::new(defs)),
        Arc::new(InMemoryOAuthRepository::empty()),
        registry_with_defaults(),
        Arc::new(EchoForwarder),
    ))
}

fn request(path: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("http://gw{path}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_dispatch_reaches_the_matching_upstream() {
    let manager = make_manager(vec![definition("users"), definition("orders")]);
    manager.load().await.unwrap();

    let response = manager.handle(request("/users/42")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "users");

    let response = manager.handle(request("/nowhere")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_enforced_through_the_chain() {
    let manager = make_manager(vec![definition_with_plugin(
        "users",
        "rate_limit",
        serde_json::json!({"limit": "2-H", "policy": "local"}),
    )]);
    manager.load().await.unwrap();

    assert_eq!(manager.handle(request("/users")).await.status(), StatusCode::OK);
    assert_eq!(manager.handle(request("/users")).await.status(), StatusCode::OK);
    assert_eq!(
        manager.handle(request("/users")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_bad_plugin_config_excludes_only_that_api() {
    let manager = make_manager(vec![
        definition_with_plugin(
            "users",
            "rate_limit",
            serde_json::json!({"limit": "abc", "policy": "local"}),
        ),
        definition("orders"),
    ]);
    manager.load().await.unwrap();

    let table = manager.table();
    assert_eq!(table.names(), vec!["orders"]);
    assert!(table.get("users").is_none());
}

#[tokio::test]
async fn test_unknown_plugin_excludes_the_api() {
    let manager = make_manager(vec![definition_with_plugin(
        "users",
        "quota_advisor",
        serde_json::json!({}),
    )]);
    manager.load().await.unwrap();

    assert!(manager.table().is_empty());
}

#[tokio::test]
async fn test_disabled_plugin_reference_is_skipped() {
    let mut def = definition_with_plugin(
        "users",
        "rate_limit",
        serde_json::json!({"limit": "abc", "policy": "local"}),
    );
    def.plugins[0].enabled = false;

    let manager = make_manager(vec![def]);
    manager.load().await.unwrap();

    // The malformed config never builds because the reference is disabled.
    assert_eq!(manager.table().names(), vec!["users"]);
}

#[tokio::test]
async fn test_inactive_definition_is_not_routed() {
    let mut def = definition("users");
    def.active = false;

    let manager = make_manager(vec![def, definition("orders")]);
    manager.load().await.unwrap();

    assert_eq!(manager.table().names(), vec!["orders"]);
}

#[tokio::test]
async fn test_request_transformer_applies_before_upstream() {
    let manager = make_manager(vec![definition_with_plugin(
        "users",
        "request_transformer",
        serde_json::json!({"add": {"headers": {"Authorization": "Basic static"}}}),
    )]);
    manager.load().await.unwrap();

    let response = manager.handle(request("/users")).await;
    assert_eq!(
        response.headers().get("x-echo-authorization").unwrap(),
        "Basic static"
    );
}
