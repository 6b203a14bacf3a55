//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint, in-process through
//! the router and over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use web_session::{api::create_router, AppState, Config, ManualClock, SharedClock};

// == Helper Functions ==

fn test_config() -> Config {
    Config {
        allowed_users: vec![1, 2, 3],
        ..Config::default()
    }
}

fn create_test_app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    ));
    let shared: SharedClock = clock.clone();
    let state = AppState::from_config(&test_config(), shared);
    (create_router(state), clock)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn cookie_pair(response: &axum::response::Response) -> String {
    let raw = response.headers()[header::SET_COOKIE].to_str().unwrap();
    raw.split(';').next().unwrap().to_string()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

// == Session Endpoint Tests ==

#[tokio::test]
async fn test_establish_endpoint_success() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(post_json("/session", r#"{"user_id":1,"lifetime":120}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("teq_session="));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("SameSite=None"));

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["user_id"], 1);
    assert_eq!(json["payload"]["user_id"], 1);
    assert!(json.get("token").is_none());
}

#[tokio::test]
async fn test_establish_endpoint_denied() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(post_json("/session", r#"{"user_id":99}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["redirect_uri"], "/login");
}

#[tokio::test]
async fn test_establish_endpoint_missing_user() {
    let (app, _) = create_test_app();

    let response = app.oneshot(post_json("/session", "{}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("user id"));
}

#[tokio::test]
async fn test_establish_endpoint_rejects_out_of_range_lifetime() {
    let (app, _) = create_test_app();

    for body in [
        r#"{"user_id":1,"lifetime":10000000000000}"#,
        r#"{"user_id":1,"lifetime":-60}"#,
    ] {
        let response = app.clone().oneshot(post_json("/session", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
}

#[tokio::test]
async fn test_invalid_json_request() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(post_json("/session", "not json"))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/session", r#"{"user_id":2}"#))
        .await
        .unwrap();
    let cookie = cookie_pair(&response);

    let response = app
        .clone()
        .oneshot(get_with_cookie("/session", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_with_cookie("/logout", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    assert!(cookie_pair(&response).ends_with('='));

    let response = app
        .oneshot(get_with_cookie("/session", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_survives_cache_expiry_until_purge() {
    let (app, clock) = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/session", r#"{"user_id":3,"lifetime":60}"#))
        .await
        .unwrap();
    let cookie = cookie_pair(&response);

    clock.advance(Duration::minutes(5));

    let response = app
        .oneshot(get_with_cookie("/session", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// == Redirect Endpoint Tests ==

#[tokio::test]
async fn test_redirect_endpoints() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/redirect", r#"{"url":"/orders/42"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&response);
    assert!(cookie.starts_with("teq_redirect="));

    let response = app
        .clone()
        .oneshot(get_with_cookie("/redirect", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_with_cookie("/redirect?consume=true", &cookie))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["url"], "/orders/42");

    let response = app
        .oneshot(get_with_cookie("/redirect", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_redirect_empty_url_rejected() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(post_json("/redirect", r#"{"url":""}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == Stats / Health ==

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/session", r#"{"user_id":1}"#))
        .await
        .unwrap();
    let cookie = cookie_pair(&response);
    app.clone()
        .oneshot(get_with_cookie("/session", &cookie))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["sessions"]["hits"], 1);
    assert_eq!(json["sessions"]["total_entries"], 1);
    assert_eq!(json["redirects"]["total_entries"], 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}

// == Over The Wire ==

#[tokio::test]
async fn test_server_records_peer_address() {
    let state = AppState::from_config(&Config::default(), web_session::system_clock());
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client
        .post(format!("http://{addr}/session"))
        .json(&serde_json::json!({ "user_id": 21 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let cookie = response.headers()[reqwest::header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["user_ip"], "127.0.0.1");

    let response = client
        .get(format!("http://{addr}/session"))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let response = client
        .post(format!("http://{addr}/logout"))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
}
