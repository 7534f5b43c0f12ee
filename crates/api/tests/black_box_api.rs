use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use stockflow_api::app::{build_app, services::AppServices};
use stockflow_core::TraceContext;
use stockflow_events::{
    EventPublisher, InMemoryNotificationChannel, LifecycleEvent, LifecycleEventType, PublishError,
};
use stockflow_infra::store::InMemoryOrderStore;

struct TestServer {
    base_url: String,
    channel: Arc<InMemoryNotificationChannel>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let channel = Arc::new(InMemoryNotificationChannel::new());
        let services = AppServices::in_memory(channel.clone());
        Self::spawn_with(services, channel).await
    }

    // Same router as prod, ephemeral port.
    async fn spawn_with(services: AppServices, channel: Arc<InMemoryNotificationChannel>) -> Self {
        let app = build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            channel,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Notification channel that is always unreachable.
struct UnreachableChannel;

#[async_trait]
impl EventPublisher for UnreachableChannel {
    async fn publish(&self, _trace: &TraceContext, _event: &LifecycleEvent) -> Result<(), PublishError> {
        Err(PublishError::Transport("topic unreachable".to_string()))
    }
}

async fn create_order(client: &reqwest::Client, srv: &TestServer, qty: u32) -> Value {
    let res = client
        .post(srv.url("/orders"))
        .json(&json!({
            "items": [{"productId": "p1", "productName": "Widget", "quantity": qty}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn patch_status(client: &reqwest::Client, srv: &TestServer, id: &str, status: &str) -> reqwest::Response {
    client
        .patch(srv.url(&format!("/orders/{id}")))
        .json(&json!({ "status": status }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/healthz")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn create_returns_the_full_order_and_publishes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let order = create_order(&client, &srv, 3).await;
    assert_eq!(order["status"], "created");
    assert_eq!(order["deleted"], false);
    assert_eq!(order["items"][0]["productId"], "p1");
    assert_eq!(order["items"][0]["quantity"], 3);
    assert!(order["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(order["createdAt"].as_str().is_some_and(|t| t.ends_with('Z')));

    let events = srv.channel.published_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, LifecycleEventType::OrderCreated);
    assert_eq!(events[0].order_id.as_str(), order["id"].as_str().unwrap());
}

#[tokio::test]
async fn create_rejects_empty_items_and_bad_bodies() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/orders"))
        .json(&json!({"items": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .post(srv.url("/orders"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert!(srv.channel.published().is_empty());
}

#[tokio::test]
async fn get_unknown_order_is_404() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/orders/does-not-exist")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn status_patches_follow_the_state_machine() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let order = create_order(&client, &srv, 1).await;
    let id = order["id"].as_str().unwrap();

    let res = patch_status(&client, &srv, id, "delivered").await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = patch_status(&client, &srv, id, "canceled").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");

    let res = patch_status(&client, &srv, id, "returned").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "returned");

    let types: Vec<_> = srv
        .channel
        .published_events()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        types,
        vec![LifecycleEventType::OrderCreated, LifecycleEventType::OrderCanceled]
    );
}

#[tokio::test]
async fn delete_soft_deletes_and_hides_from_list() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let keep = create_order(&client, &srv, 1).await;
    let gone = create_order(&client, &srv, 2).await;
    let gone_id = gone["id"].as_str().unwrap();

    let res = client
        .delete(srv.url(&format!("/orders/{gone_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let listed: Value = reqwest::get(srv.url("/orders")).await.unwrap().json().await.unwrap();
    let ids: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["id"].as_str())
        .collect();
    assert_eq!(ids, vec![keep["id"].as_str().unwrap()]);

    // Still addressable directly.
    let fetched: Value = reqwest::get(srv.url(&format!("/orders/{gone_id}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["deleted"], true);
    assert_eq!(fetched["status"], "canceled");

    let res = patch_status(&client, &srv, gone_id, "shipped").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_operation");
}

#[tokio::test]
async fn api_prefix_serves_the_same_orders() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let order = create_order(&client, &srv, 1).await;
    let id = order["id"].as_str().unwrap();

    let res = reqwest::get(srv.url(&format!("/api/orders/{id}"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched, order);
}

#[tokio::test]
async fn traceparent_is_continued_into_published_events() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let upstream = TraceContext::new_root();

    let res = client
        .post(srv.url("/orders"))
        .header("traceparent", upstream.to_traceparent())
        .json(&json!({"items": [{"productId": "p1", "quantity": 1}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let echoed = res
        .headers()
        .get("traceparent")
        .and_then(|v| v.to_str().ok())
        .and_then(TraceContext::parse)
        .unwrap();
    assert_eq!(echoed.trace_id(), upstream.trace_id());

    let published = srv.channel.published();
    let carried = published[0].trace_context().unwrap();
    assert_eq!(carried.trace_id(), upstream.trace_id());
}

#[tokio::test]
async fn publish_failure_after_commit_is_reported_as_502_with_the_order() {
    let services = AppServices::new(Arc::new(InMemoryOrderStore::new()), Arc::new(UnreachableChannel));
    let srv = TestServer::spawn_with(services, Arc::new(InMemoryNotificationChannel::new())).await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/orders"))
        .json(&json!({"items": [{"productId": "p1", "quantity": 2}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "publish_error");
    assert_eq!(body["order"]["status"], "created");
    let id = body["order"]["id"].as_str().unwrap().to_string();

    // The order was committed before the publish attempt.
    let res = reqwest::get(srv.url(&format!("/orders/{id}"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = patch_status(&client, &srv, &id, "canceled").await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "publish_error");
    assert_eq!(body["order"]["id"], id.as_str());
    assert_eq!(body["order"]["status"], "canceled");

    let fetched: Value = reqwest::get(srv.url(&format!("/orders/{id}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["status"], "canceled");
}

#[tokio::test]
async fn patch_checks_the_order_before_the_body() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .patch(srv.url("/orders/does-not-exist"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let order = create_order(&client, &srv, 1).await;
    let id = order["id"].as_str().unwrap();

    let res = client
        .patch(srv.url(&format!("/orders/{id}")))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    let res = patch_status(&client, &srv, id, "").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = patch_status(&client, &srv, id, "packed").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "packed");
}
