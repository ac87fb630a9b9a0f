//! Upstream forwarding.
//!
//! # Responsibilities
//! - Relay requests the gateway does not answer itself to the CMS renderer
//! - Propagate the request ID and client address
//! - Map connection failures to 502 and slow upstreams to 504
//!
//! # Design Decisions
//! - Bodies are streamed in both directions, never buffered
//! - Hop-by-hop headers are stripped before forwarding
//! - No retries: a CMS render is not guaranteed to be idempotent

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, HeaderName, HeaderValue, Request, Uri, Version,
    },
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::http::request::RequestIdExt;

const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Where and how to forward.
#[derive(Clone)]
pub struct UpstreamState {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
    timeout: Duration,
}

impl UpstreamState {
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        let uri: Uri = config.upstream.url.parse().map_err(|e| {
            GateError::Configuration(format!("invalid upstream url {}: {e}", config.upstream.url))
        })?;
        let authority = uri.authority().cloned().ok_or_else(|| {
            GateError::Configuration(format!("upstream url {} has no host", config.upstream.url))
        })?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self {
            client,
            scheme: uri.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority,
            timeout: Duration::from_secs(config.timeouts.upstream_secs),
        })
    }

    fn target(&self, original: &Uri) -> Result<Uri, GateError> {
        let path = original
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path)
            .build()
            .map_err(|e| GateError::Internal(format!("cannot build upstream uri: {e}")))
    }
}

/// Router sending every request to the upstream.
pub fn routes(state: UpstreamState) -> Router {
    Router::new().fallback(forward).with_state(state)
}

async fn forward(State(state): State<UpstreamState>, request: Request<Body>) -> Response {
    match proxy(&state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn proxy(state: &UpstreamState, request: Request<Body>) -> Result<Response, GateError> {
    let request_id = request.request_id().unwrap_or("-").to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (mut parts, body) = request.into_parts();
    parts.uri = state.target(&parts.uri)?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    add_forwarded(&mut parts.headers, peer.map(|ip| ip.to_string()));

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding to upstream"
    );

    let upstream = Request::from_parts(parts, body);
    let response = match tokio::time::timeout(state.timeout, state.client.request(upstream)).await
    {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(GateError::Upstream(e.to_string())),
        Err(_) => {
            tracing::warn!(request_id = %request_id, timeout = ?state.timeout, "Upstream timed out");
            return Err(GateError::UpstreamTimeout);
        }
    };

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn add_forwarded(headers: &mut HeaderMap, peer: Option<String>) {
    if let Some(host) = headers.get(header::HOST).cloned() {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    let Some(peer) = peer else {
        return;
    };
    let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {peer}"),
        None => peer,
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(url: &str) -> Result<UpstreamState, GateError> {
        let mut config = GateConfig::default();
        config.upstream.url = url.to_string();
        UpstreamState::from_config(&config)
    }

    #[test]
    fn test_target_keeps_path_and_query() {
        let s = state("http://renderer:8000").unwrap();
        let target = s.target(&"/news/article?page=2".parse().unwrap()).unwrap();
        assert_eq!(target.to_string(), "http://renderer:8000/news/article?page=2");
    }

    #[test]
    fn test_invalid_upstream_rejected() {
        assert!(state("/only/a/path").is_err());
    }

    #[test]
    fn test_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("www.example.com"));
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        strip_hop_by_hop(&mut headers);
        add_forwarded(&mut headers, Some("10.0.0.5".into()));

        assert!(headers.get(header::CONNECTION).is_none());
        assert_eq!(headers[X_FORWARDED_FOR], "203.0.113.9, 10.0.0.5");
        assert_eq!(headers[X_FORWARDED_HOST], "www.example.com");
        assert_eq!(headers[X_FORWARDED_PROTO], "http");
    }
}
