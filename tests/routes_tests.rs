use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use monarch_core::{common_routes, common_routes_with_ready, AppState, MemoryStore, SchemaModel, Settings};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn state() -> AppState {
    let settings = Settings::from_lookup(|_| None).unwrap();
    let model = Arc::new(SchemaModel::build(settings.schema.clone()).unwrap());
    AppState::new(Arc::new(MemoryStore::new()), model, settings)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let response = common_routes()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn ready_pings_the_store() {
    let response = common_routes_with_ready(state())
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["schema"], "public");
    assert!(body["tables"].as_u64().unwrap() >= 17);
    assert!(body["pingMs"].is_u64());
}

#[tokio::test]
async fn ready_is_not_served_without_state() {
    let response = common_routes()
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn version_names_the_crate() {
    let response = common_routes_with_ready(state())
        .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "monarch-core");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
