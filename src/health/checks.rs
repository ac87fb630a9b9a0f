//! Dependency checks used by readiness.
//!
//! # Responsibilities
//! - Probe one external dependency per check
//! - Report failures with a short, human-readable detail

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{CheckKind, DependencyCheckConfig};
use crate::error::GateError;

/// One external dependency the gateway needs.
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    /// Key under which the outcome is reported.
    fn name(&self) -> &str;

    /// `Ok(())` when the dependency answers, otherwise a failure detail.
    async fn check(&self) -> Result<(), String>;
}

/// Build a check from its configuration entry.
pub fn from_config(config: &DependencyCheckConfig) -> Result<Box<dyn DependencyCheck>, GateError> {
    let check: Box<dyn DependencyCheck> = match config.kind {
        CheckKind::Tcp => Box::new(TcpCheck::new(&config.name, &config.target)),
        CheckKind::Redis => Box::new(RedisCheck::new(&config.name, &config.target)?),
        CheckKind::Http => Box::new(HttpCheck::new(&config.name, &config.target)?),
    };
    Ok(check)
}

/// Succeeds when a TCP connection to `host:port` can be opened.
pub struct TcpCheck {
    name: String,
    address: String,
}

impl TcpCheck {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}

#[async_trait]
impl DependencyCheck for TcpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<(), String> {
        tokio::net::TcpStream::connect(&self.address)
            .await
            .map(drop)
            .map_err(|e| e.to_string())
    }
}

/// Succeeds when Redis answers `PING`.
pub struct RedisCheck {
    name: String,
    client: redis::Client,
}

impl RedisCheck {
    pub fn new(name: &str, url: &str) -> Result<Self, GateError> {
        let client = redis::Client::open(url).map_err(|e| {
            GateError::Configuration(format!("health check {name}: invalid redis url: {e}"))
        })?;
        Ok(Self {
            name: name.to_string(),
            client,
        })
    }
}

#[async_trait]
impl DependencyCheck for RedisCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<(), String> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| e.to_string())?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(drop)
            .map_err(|e| e.to_string())
    }
}

/// Succeeds when `GET <url>` returns a 2xx status.
pub struct HttpCheck {
    name: String,
    uri: Uri,
    client: Client<HttpConnector, Body>,
}

impl HttpCheck {
    pub fn new(name: &str, url: &str) -> Result<Self, GateError> {
        let uri: Uri = url.parse().map_err(|e| {
            GateError::Configuration(format!("health check {name}: invalid url {url}: {e}"))
        })?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self {
            name: name.to_string(),
            uri,
            client,
        })
    }
}

#[async_trait]
impl DependencyCheck for HttpCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<(), String> {
        let request = Request::builder()
            .method("GET")
            .uri(self.uri.clone())
            .header("user-agent", "site-gate-health-check")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = self.client.request(request).await.map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("status {}", response.status()))
        }
    }
}
