//! Request-processing pipeline.
//!
//! # Stage Order
//! ```text
//! request  → [boundary] → path → health → cors → auth → not_found → cache_tags → core
//! response ← [boundary] ← path ← health ← cors ← auth ← not_found ← cache_tags ← core
//! ```
//!
//! The boundary layers (request ID, tracing, panic recovery, timeout, body
//! limit, concurrency limit, security headers) wrap every stage, each
//! applied with its own `Router::layer` call. Path normalization runs
//! before routing, so every stage and the upstream see the canonical path. On the
//! way out the core response passes cache-tag emission first, then the
//! 404 rewrite, then CORS decoration.
//!
//! # Design Decisions
//! - The order is fixed here, not configurable
//! - A short-circuiting stage never reaches the stages inside it
//! - Any `Router` can be the core, so embedders keep their own handlers

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{GateConfig, SecurityConfig};
use crate::error::{ErrorBody, GateError, INTERNAL_MESSAGE};
use crate::health::HealthProbe;
use crate::http::middleware::{
    auth_stage, cache_tag_stage, cors_stage, health_stage, normalize_path_stage, not_found_stage,
    AuthState, CacheTagStage, NotFoundStage,
};
use crate::http::request::{MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
use crate::observability::metrics;
use crate::security::headers::with_security_headers;
use crate::security::{CorsPolicy, TokenValidator};

/// Every stage's state, built once at startup.
#[derive(Clone)]
pub struct Pipeline {
    probe: Arc<HealthProbe>,
    cors: Arc<CorsPolicy>,
    auth: AuthState,
    cache_tags: Arc<CacheTagStage>,
    not_found: Arc<NotFoundStage>,
    security: SecurityConfig,
    request_timeout: Duration,
    max_connections: usize,
}

impl Pipeline {
    pub fn new(
        config: &GateConfig,
        probe: Arc<HealthProbe>,
        validator: Option<Arc<TokenValidator>>,
    ) -> Result<Self, GateError> {
        Ok(Self {
            probe,
            cors: Arc::new(CorsPolicy::from_config(&config.cors)),
            auth: AuthState {
                validator,
                protected_prefixes: Arc::new(config.jwt.protected_prefixes.clone()),
            },
            cache_tags: Arc::new(CacheTagStage::from_config(&config.cache_tags)?),
            not_found: Arc::new(NotFoundStage::from_config(&config.not_found)),
            security: config.security.clone(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            max_connections: config.listener.max_connections,
        })
    }

    /// Wrap `core` with every stage in the fixed order.
    pub fn wrap(&self, core: Router) -> Router {
        // `Router::layer` wraps what is already there: the last layer added
        // is the first to see a request.
        let staged = core
            .layer(middleware::from_fn_with_state(
                self.cache_tags.clone(),
                cache_tag_stage,
            ))
            .layer(middleware::from_fn_with_state(
                self.not_found.clone(),
                not_found_stage,
            ))
            .layer(middleware::from_fn_with_state(self.auth.clone(), auth_stage))
            .layer(middleware::from_fn_with_state(self.cors.clone(), cors_stage))
            .layer(middleware::from_fn_with_state(self.probe.clone(), health_stage));

        // Layers run after routing, so the path is rewritten on an outer
        // router and the staged one routes on the canonical path.
        let normalized = Router::new()
            .fallback_service(staged)
            .layer(middleware::from_fn(normalize_path_stage));

        let secured = with_security_headers(normalized, &self.security);

        secured
            .layer(RequestBodyLimitLayer::new(self.security.max_body_size))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.request_timeout,
            ))
            .layer(GlobalConcurrencyLimitLayer::new(self.max_connections))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn(track_request))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
    }
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request.request_id().unwrap_or("-"),
    )
}

async fn track_request(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");

    let body = ErrorBody {
        error: "internal_error",
        message: INTERNAL_MESSAGE.to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
