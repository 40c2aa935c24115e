//! End-to-end scan workflow: submit a batch, confirm it, guard the posted
//! state, export.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use opname::Config;
use opname::api::AppState;
use opname::config::SecurityConfig;
use opname::db::NewUser;
use opname::db::repositories::user::hash_password;
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@local";
const ADMIN_PASSWORD: &str = "password";

async fn spawn_app() -> (Arc<AppState>, Router) {
    let db_path =
        std::env::temp_dir().join(format!("opname-scan-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());

    let state = opname::api::create_app_state_from_config(config)
        .await
        .expect("failed to create app state");
    let router = opname::api::router(state.clone());
    (state, router)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": email, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK, "login failed");

    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn submit_scan(app: &Router, cookie: &str) -> i32 {
    let payload = serde_json::json!({
        "products": [
            { "barcode": "2414312904176", "name": "Tile 50x50 White", "quantity": 2.0, "uom_id": 61, "uom_name": "Dus" },
            { "barcode": "2414312904177", "name": "Tile 50x50 Grey", "quantity": 5.0 },
        ]
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/scan")
                .header("Content-Type", "application/json")
                .header(header::COOKIE, cookie)
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["success_count"], 2);
    assert_eq!(body["data"]["failed_count"], 0);

    body["data"]["session_id"].as_i64().unwrap() as i32
}

#[tokio::test]
async fn scan_batch_creates_a_session_with_lines() {
    let (_state, app) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let session_id = submit_scan(&app, &cookie).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/sessions/{session_id}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["state"], "draft");
    assert_eq!(body["data"]["product_count"], 2);
    assert_eq!(body["data"]["total_quantity"], 7.0);
    assert_eq!(body["data"]["products"][0]["state"], "draft");
}

#[tokio::test]
async fn empty_scan_batch_is_rejected() {
    let (_state, app) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/scan")
                .header("Content-Type", "application/json")
                .header(header::COOKIE, &cookie)
                .body(Body::from(serde_json::json!({ "products": [] }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn confirm_moves_session_and_lines_to_confirmed() {
    let (state, app) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let session_id = submit_scan(&app, &cookie).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/sessions/{session_id}/confirm"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["state"], "confirmed");

    let products = state
        .store()
        .products_for_session(session_id)
        .await
        .unwrap();
    assert!(products.iter().all(|p| p.state == "confirmed"));

    // Confirming twice is a validation error, not a crash.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/sessions/{session_id}/confirm"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn posted_sessions_refuse_new_lines() {
    let (state, app) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let session_id = submit_scan(&app, &cookie).await;
    state
        .store()
        .set_scan_session_state(session_id, "posted")
        .await
        .unwrap();

    let payload = serde_json::json!({
        "products": [{ "barcode": "999", "quantity": 1.0 }]
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/sessions/{session_id}/products"))
                .header("Content-Type", "application/json")
                .header(header::COOKIE, &cookie)
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_draft_sessions_can_be_deleted() {
    let (state, app) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let confirmed_id = submit_scan(&app, &cookie).await;
    state
        .store()
        .set_scan_session_state(confirmed_id, "confirmed")
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/sessions/{confirmed_id}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let draft_id = submit_scan(&app, &cookie).await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/sessions/{draft_id}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn checkers_only_see_their_own_sessions() {
    let (state, app) = spawn_app().await;
    let admin_cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let admin_session = submit_scan(&app, &admin_cookie).await;

    let password_hash = hash_password("hunter22", &SecurityConfig::default()).unwrap();
    state
        .store()
        .create_user(NewUser {
            id: 60,
            name: "Checker".to_string(),
            email: "checker@example.com".to_string(),
            password_hash,
            role: "checker".to_string(),
        })
        .await
        .unwrap();

    let checker_cookie = login(&app, "checker@example.com", "hunter22").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/sessions")
                .header(header::COOKIE, &checker_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], serde_json::json!([]));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/sessions/{admin_session}"))
                .header(header::COOKIE, &checker_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn excel_export_downloads_a_workbook() {
    let (_state, app) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    submit_scan(&app, &cookie).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/export/excel")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn unposted_view_consolidates_confirmed_lines() {
    let (state, app) = spawn_app().await;
    let cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let session_id = submit_scan(&app, &cookie).await;
    state
        .store()
        .update_scan_session_meta(session_id, None, Some((544, Some("Main".to_string()))))
        .await
        .unwrap();

    // Nothing confirmed yet: the unposted view is empty.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/unposted")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], serde_json::json!([]));

    state
        .store()
        .set_scan_session_state(session_id, "confirmed")
        .await
        .unwrap();
    state
        .store()
        .cascade_product_state(session_id, "draft", "confirmed")
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/unposted")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let groups = body["data"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["warehouse_id"], 544);
    assert_eq!(groups[0]["lines"].as_array().unwrap().len(), 2);
}
