//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use site_gate::config::GateConfig;
use site_gate::error::GateError;
use site_gate::security::{
    ClientKey, CounterStore, CredentialStore, StoreError, TokenIssuer, TokenValidator,
    UserProfile,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const ORIGIN: &str = "https://www.example.com";

/// Config with one allowed origin and HS256 bearer tokens.
pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.cors.allowed_origins = vec![ORIGIN.to_string()];
    config.jwt.algorithm = "HS256".to_string();
    config
}

pub fn validator(config: &GateConfig) -> TokenValidator {
    TokenValidator::new(
        DecodingKey::from_secret(SECRET),
        Algorithm::HS256,
        &config.jwt.issuer,
        &config.jwt.audience,
    )
}

pub fn issuer(config: &GateConfig) -> TokenIssuer {
    TokenIssuer::new(
        EncodingKey::from_secret(SECRET),
        Algorithm::HS256,
        config.jwt.issuer.clone(),
        config.jwt.audience.clone(),
        Duration::from_secs(config.jwt.ttl_secs),
    )
}

/// Attach the peer address the server would see.
pub fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Credential store accepting one user/password and counting every lookup.
pub struct CountingCredentialStore {
    username: &'static str,
    password: &'static str,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingCredentialStore {
    pub fn new(username: &'static str, password: &'static str) -> Arc<Self> {
        Self::with_delay(username, password, Duration::ZERO)
    }

    /// Like `new`, but every lookup takes `delay`.
    pub fn with_delay(
        username: &'static str,
        password: &'static str,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            username,
            password,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingCredentialStore {
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, GateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if username == self.username && password == self.password {
            Ok(Some(UserProfile {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                name: None,
            }))
        } else {
            Ok(None)
        }
    }
}

/// Counter store whose backend is always down.
pub struct BrokenCounterStore;

#[async_trait]
impl CounterStore for BrokenCounterStore {
    async fn get(&self, _key: &ClientKey) -> Result<Option<u32>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn increment(&self, _key: &ClientKey, _ttl: Duration) -> Result<u32, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn remove(&self, _key: &ClientKey) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Start a mock upstream on an ephemeral port. `f` maps the raw request head
/// to a status code and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();

                let (status, body) = f(head).await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a mock upstream answering every request with `200` and `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
