//! Requests against the full router, backed by an in-memory remote store and
//! an in-memory SQLite cache.

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use employee_tracker_core::domain::Collection;
use employee_tracker_core::ports::LocalCache;
use employee_tracker_core::remote::RemoteRepository;
use employee_tracker_core::services::Services;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tracker_lib::{
    adapters::{MemoryStore, SqliteCache},
    config::Config,
    web::{router, state::AppState},
};
use utoipa::OpenApi;

async fn app() -> (Router, MemoryStore) {
    let config = Arc::new(Config::from_lookup(|_| None).unwrap());
    let cache = SqliteCache::connect("sqlite::memory:", 1).await.unwrap();
    cache.prepare_schema().await.unwrap();
    cache
        .seed_admin(&config.seed_admin.email, &config.seed_admin.password)
        .await
        .unwrap();

    let store = MemoryStore::new();
    let services = Services::new(RemoteRepository::new(Arc::new(store.clone())), Arc::new(cache));
    let state = Arc::new(AppState::new(config, services));
    (router(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_feed_sources() {
    let (app, _store) = app().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["feeds"]["tasks"].is_string());
}

#[tokio::test]
async fn seeded_admin_can_log_in() {
    let (app, _store) = app().await;

    let (status, body) = send(
        &app,
        post_json("/auth/login", json!({"email": "Poorvika@admin", "password": "admin123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["name"], "Admin User");

    let (status, _) = send(
        &app,
        post_json("/auth/login", json!({"email": "Poorvika@admin", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_employee_is_not_found() {
    let (app, _store) = app().await;
    let (status, _) = send(&app, get("/employees/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_payloads_are_bad_requests() {
    let (app, _store) = app().await;
    let (status, _) = send(&app, post_json("/tasks", json!({"employeeId": 1, "title": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let review = json!({
        "employeeId": 1,
        "date": "2024-05-01",
        "scores": {"quality": 9, "communication": 4, "innovation": 4, "timeliness": 4, "attendance": 4}
    });
    let (status, _) = send(&app, post_json("/reviews", review)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn created_employee_shows_up_in_the_listing_and_dashboard() {
    let (app, _store) = app().await;
    let (status, body) = send(
        &app,
        post_json(
            "/employees",
            json!({"email": "asha@corp", "password": "pw", "name": "Asha", "department": "Eng"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["target"], "remote");
    let id = body["record"]["id"].as_i64().unwrap();
    assert_ne!(id, 0);

    let mut listed = Value::Null;
    for _ in 0..250 {
        let (_, body) = send(&app, get("/employees")).await;
        if body.as_array().is_some_and(|a| !a.is_empty()) {
            listed = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(listed[0]["id"], id);

    let (status, body) = send(&app, get("/dashboard/admin?adminId=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["employeeCount"], 1);
    assert_eq!(body["departments"][0]["department"], "Eng");
    assert_eq!(body["completionRate"], 0);
}

#[tokio::test]
async fn writes_while_offline_are_accepted_locally() {
    let (app, store) = app().await;
    store.disconnect();

    let (status, body) = send(
        &app,
        post_json("/employees", json!({"email": "ravi@corp", "password": "pw", "name": "Ravi"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["target"], "local_only");
    assert!(body["cause"].as_str().unwrap().contains("offline"));
}

#[tokio::test]
async fn preloaded_remote_data_is_fully_mirrored_at_startup() {
    let store = MemoryStore::new();
    for id in 1..=5 {
        store.put_raw(
            Collection::Users,
            &id.to_string(),
            json!({"id": id, "email": format!("user{id}@corp"), "password": "pw", "name": "User", "role": "employee"}),
        );
        store.put_raw(
            Collection::Tasks,
            &(100 + id).to_string(),
            json!({"id": 100 + id, "employeeId": id, "title": "Preloaded", "status": "Pending"}),
        );
    }

    let config = Arc::new(Config::from_lookup(|_| None).unwrap());
    let cache = SqliteCache::connect("sqlite::memory:", 1).await.unwrap();
    cache.prepare_schema().await.unwrap();
    let cache = Arc::new(cache);
    let services = Services::new(RemoteRepository::new(Arc::new(store.clone())), cache.clone());
    let _state = AppState::new(config, services);

    let mut mirrored = 0;
    for _ in 0..250 {
        mirrored = cache.list_tasks().await.unwrap().len();
        if mirrored == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(mirrored, 5);
    assert_eq!(cache.list_users().await.unwrap().len(), 5);
}

#[test]
fn openapi_document_lists_the_routes() {
    let doc = tracker_lib::web::rest::ApiDoc::openapi();
    for path in ["/health", "/auth/login", "/tasks/{id}/status", "/messages/read-conversation", "/dashboard/admin"] {
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }
}
