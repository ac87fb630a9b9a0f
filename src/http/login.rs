//! Login and session endpoints.
//!
//! # Responsibilities
//! - Verify username/password behind the brute-force guard
//! - Issue a bearer token on success when a signing key is configured
//! - Report who the presented bearer token belongs to
//! - Acknowledge logout so clients can drop their token
//!
//! # Design Decisions
//! - Every attempt is counted before credentials are looked at, so a burst
//!   of concurrent requests cannot outrun the lockout
//! - A locked client is refused before credentials are looked at
//! - Unknown user and wrong password answer identically
//! - The client key is derived once per request from the client IP

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::LoginConfig;
use crate::error::GateError;
use crate::http::middleware::auth::bearer_token;
use crate::security::{
    client_ip, Attempt, ClientKey, CredentialStore, RateLimiter, TokenIssuer, TokenValidator,
    UserProfile,
};

pub const MISSING_CREDENTIALS: &str = "Username and password required";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

const MAX_LOGIN_BODY: usize = 16 * 1024;

/// Shared state of the login endpoints.
#[derive(Clone)]
pub struct LoginState {
    pub limiter: RateLimiter,
    pub credentials: Arc<dyn CredentialStore>,
    pub issuer: Option<Arc<TokenIssuer>>,
    pub validator: Option<Arc<TokenValidator>>,
    pub trust_forwarded_for: bool,
}

/// Routes for `login.path`, `login.session_path` and `login.logout_path`.
pub fn routes(config: &LoginConfig, state: LoginState) -> Router {
    Router::new()
        .route(&config.path, post(login))
        .route(&config.session_path, get(session))
        .route(&config.logout_path, post(logout))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct UserView {
    username: String,
    email: String,
    name: String,
}

impl From<UserProfile> for UserView {
    fn from(profile: UserProfile) -> Self {
        let name = profile.name.unwrap_or_else(|| profile.username.clone());
        Self {
            username: profile.username,
            email: profile.email,
            name,
        }
    }
}

async fn login(State(state): State<LoginState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let ip = client_ip(&parts, state.trust_forwarded_for);
    let key = ClientKey::from_ip(ip);

    let credentials = match to_bytes(body, MAX_LOGIN_BODY).await {
        Ok(bytes) => serde_json::from_slice::<LoginRequest>(&bytes).unwrap_or_default(),
        Err(_) => LoginRequest::default(),
    };
    if credentials.username.is_empty() || credentials.password.is_empty() {
        return GateError::bad_request(MISSING_CREDENTIALS).into_response();
    }

    match state.limiter.reserve(&key).await {
        Attempt::Allowed => {}
        Attempt::Locked => {
            tracing::warn!(client_key = %key, "Login blocked by rate limit");
            return GateError::RateLimited.into_response();
        }
        Attempt::Unavailable => {
            return GateError::Dependency("login attempt counter unavailable".into())
                .into_response();
        }
    }

    let verified = state
        .credentials
        .verify(&credentials.username, &credentials.password)
        .await;
    let profile = match verified {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            tracing::warn!(username = %credentials.username, client_key = %key, "Login failed");
            return GateError::unauthorized(INVALID_CREDENTIALS).into_response();
        }
        Err(e) => return e.into_response(),
    };

    state.limiter.reset(&key).await;
    tracing::info!(username = %profile.username, "User logged in");

    let mut data = json!({ "user": UserView::from(profile.clone()) });
    if let Some(issuer) = &state.issuer {
        match issuer.issue(&profile.username) {
            Ok(token) => data["token"] = Value::String(token),
            Err(e) => return e.into_response(),
        }
    }

    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

async fn session(State(state): State<LoginState>, request: Request<Body>) -> Response {
    let claims = state.validator.as_deref().and_then(|validator| {
        let token = bearer_token(request.headers())?;
        validator.validate(token).ok()
    });

    let data = match claims {
        Some(claims) => json!({
            "authenticated": true,
            "user": {
                "username": claims.subject(),
                "claims": claims
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<serde_json::Map<String, Value>>(),
            },
        }),
        None => json!({ "authenticated": false, "user": null }),
    };

    Json(json!({ "success": true, "data": data })).into_response()
}

/// Tokens are stateless; the client discards its copy.
async fn logout() -> StatusCode {
    tracing::debug!("Logout acknowledged");
    StatusCode::NO_CONTENT
}
