//! Request-processing gateway for a headless CMS.
//!
//! Gates, authenticates, rate-limits and post-processes every request
//! before it reaches the CMS renderer (or an embedder's own `Router`).

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GateConfig;
pub use error::GateError;
pub use http::{GateServer, Pipeline};
pub use lifecycle::Shutdown;
