//! End-to-end ordering and behavior of the request pipeline.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::Extension,
    http::{header, Method, Request, StatusCode},
    routing::get,
    Json, Router,
};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::json;
use site_gate::cache::{Lifetime, RequestCacheCollector};
use site_gate::config::GateConfig;
use site_gate::security::Claims;
use site_gate::GateServer;
use tower::ServiceExt;

use common::{body_json, issuer, test_config, validator, ORIGIN, SECRET};

/// Core router counting how often it is reached.
fn counting_core(hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/content",
            get(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "rendered"
                }
            }),
        )
        .route(
            "/api/orders",
            get(|Extension(claims): Extension<Claims>| async move {
                Json(json!({ "subject": claims.subject() }))
            }),
        )
        .route(
            "/news",
            get(|Extension(collector): Extension<RequestCacheCollector>| async move {
                collector.add_tags(["pages_12", "news_7", "pages_12"]);
                collector.limit_lifetime(Lifetime::Seconds(300));
                "news"
            }),
        )
        .route("/panic", get(explode))
}

async fn explode() -> &'static str {
    panic!("template exploded")
}

fn gate(config: GateConfig, core: Router) -> Router {
    let v = validator(&config);
    GateServer::builder(config)
        .core(core)
        .token_validator(Some(v))
        .build()
        .unwrap()
        .router()
}

fn app() -> (Router, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    (gate(test_config(), counting_core(hits.clone())), hits)
}

fn bearer_for(subject: &str) -> String {
    let config = test_config();
    format!("Bearer {}", issuer(&config).issue(subject).unwrap())
}

#[tokio::test]
async fn test_disallowed_origin_is_rejected_before_core() {
    let (app, hits) = app();

    let response = app
        .oneshot(
            Request::get("/content")
                .header(header::ORIGIN, "https://evil.example.net")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"], "forbidden");
    assert_eq!(body["message"], "Origin not allowed");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_request_without_origin_passes_undecorated() {
    let (app, hits) = app();

    let response = app
        .oneshot(Request::get("/content").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_allowed_origin_is_decorated() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/content")
                .header(header::ORIGIN, ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::VARY], "Origin");
    assert!(headers.get(header::ACCESS_CONTROL_MAX_AGE).is_none());
}

#[tokio::test]
async fn test_preflight_is_answered_without_core() {
    let (app, hits) = app();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/content")
                .header(header::ORIGIN, ORIGIN)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET,POST,OPTIONS");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type,Authorization"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_protected_path_requires_bearer() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/api/orders").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "Missing or invalid Authorization header");
}

#[tokio::test]
async fn test_valid_token_reaches_handler_with_claims() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/api/orders")
                .header(header::AUTHORIZATION, bearer_for("alice"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["subject"], "alice");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (app, _) = app();
    let config = test_config();
    let now = chrono::Utc::now().timestamp();
    let token = jsonwebtoken::encode(
        &Header::default(),
        &json!({
            "sub": "alice",
            "iss": config.jwt.issuer,
            "aud": config.jwt.audience,
            "exp": now - 10,
        }),
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap();

    let response = app
        .oneshot(
            Request::get("/api/orders")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Token validation failed");
}

#[tokio::test]
async fn test_malformed_token_is_rejected() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/api/orders")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid token structure");
}

#[tokio::test]
async fn test_cors_runs_before_auth() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/api/orders")
                .header(header::ORIGIN, "https://evil.example.net")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_rejection_still_carries_cors_headers() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/api/orders")
                .header(header::ORIGIN, ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ORIGIN
    );
}

#[tokio::test]
async fn test_health_is_answered_before_cors() {
    let (app, hits) = app();

    let response = app
        .oneshot(
            Request::get("/health/live")
                .header(header::ORIGIN, "https://evil.example.net")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "alive");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_path_gets_json_404_when_json_expected() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/missing/page?type=834")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let body = body_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_unknown_path_stays_plain_for_html_clients() {
    let (app, _) = app();

    let response = app
        .oneshot(
            Request::get("/missing/page")
                .header(header::ACCEPT, "text/html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
}

#[tokio::test]
async fn test_cache_tags_are_emitted() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/news").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-fc-cache-tags"], "pages_12,news_7");
    assert_eq!(headers["x-fc-cache-lifetime"], "300");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=300");
}

#[tokio::test]
async fn test_no_cache_headers_without_tags() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/content").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().get("x-fc-cache-tags").is_none());
    assert!(response.headers().get("x-fc-cache-lifetime").is_none());
}

#[tokio::test]
async fn test_disabled_cache_tags_emit_nothing() {
    let mut config = test_config();
    config.cache_tags.enabled = false;
    let app = gate(config, counting_core(Arc::new(AtomicUsize::new(0))));

    let response = app
        .oneshot(Request::get("/news").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-fc-cache-tags").is_none());
}

#[tokio::test]
async fn test_request_id_is_generated_and_kept() {
    let (app, _) = app();

    let response = app
        .clone()
        .oneshot(Request::get("/content").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let response = app
        .oneshot(
            Request::get("/content")
                .header("x-request-id", "edge-1234")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "edge-1234");
}

#[tokio::test]
async fn test_panic_becomes_internal_error() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/panic").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "internal_error");
    assert!(!body["message"].as_str().unwrap().contains("template"));
}

#[tokio::test]
async fn test_security_headers_are_added() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::get("/content").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(
        headers[header::CONTENT_SECURITY_POLICY],
        "default-src 'none'; connect-src 'self';"
    );
}

#[tokio::test]
async fn test_without_validator_protected_paths_are_open() {
    let core = Router::new().route("/api/public", get(|| async { "open" }));
    let app = GateServer::builder(test_config())
        .core(core)
        .token_validator(None)
        .build()
        .unwrap()
        .router();

    let response = app
        .oneshot(Request::get("/api/public").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_slow_request_times_out_with_408() {
    let mut config = test_config();
    config.timeouts.request_secs = 1;
    let core = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            "late"
        }),
    );
    let app = GateServer::builder(config)
        .core(core)
        .build()
        .unwrap()
        .router();

    let response = app
        .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config();
    config.security.max_body_size = 16;
    let core = Router::new().route("/echo", axum::routing::post(|body: String| async move { body }));
    let app = GateServer::builder(config)
        .core(core)
        .build()
        .unwrap()
        .router();

    let response = app
        .oneshot(
            Request::post("/echo")
                .body(Body::from("x".repeat(64)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_core_routes_match_the_normalized_path() {
    let (app, hits) = app();

    for path in ["/content", "//content", "/%63ontent", "/news/../content"] {
        let response = app
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
        assert_eq!(common::body_text(response).await, "rendered");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}
