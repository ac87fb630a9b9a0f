//! JSON 404 rewrite stage.
//!
//! A 404 from downstream becomes a JSON body when the client expects JSON
//! and the response is not JSON already.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::config::NotFoundConfig;

pub const NOT_FOUND_MESSAGE: &str = "The requested page does not exist or was inaccessible.";

#[derive(Debug, Serialize)]
struct NotFoundBody {
    error: &'static str,
    status: u16,
    message: &'static str,
}

#[derive(Debug, Clone)]
pub struct NotFoundStage {
    json_page_types: Vec<u32>,
}

impl NotFoundStage {
    pub fn from_config(config: &NotFoundConfig) -> Self {
        Self {
            json_page_types: config.json_page_types.clone(),
        }
    }

    /// `.json` suffix, an `Accept` naming `application/json`, or a JSON page type.
    fn expects_json<B>(&self, request: &Request<B>) -> bool {
        if request.uri().path().ends_with(".json") {
            return true;
        }

        let accepts_json = request
            .headers()
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if accepts_json {
            return true;
        }

        request.uri().query().is_some_and(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(k, _)| k == "type")
                .filter_map(|(_, v)| v.trim().parse::<u32>().ok())
                .any(|t| self.json_page_types.contains(&t))
        })
    }
}

pub async fn not_found_stage(
    State(stage): State<Arc<NotFoundStage>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let expects_json = stage.expects_json(&request);
    let response = next.run(request).await;

    if response.status() != StatusCode::NOT_FOUND || !expects_json {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if is_json {
        return response;
    }

    let body = NotFoundBody {
        error: "Not Found",
        status: 404,
        message: NOT_FOUND_MESSAGE,
    };
    let Ok(bytes) = serde_json::to_vec(&body) else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(bytes))
}
