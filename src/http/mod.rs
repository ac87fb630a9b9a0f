//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, connect info, graceful shutdown)
//!     → pipeline.rs (boundary layers + middleware/ stages in fixed order)
//!     → core router:
//!         login.rs (login + session endpoints)
//!         upstream.rs (forward everything else to the CMS renderer)
//!           or the embedder's own Router
//! ```

pub mod login;
pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod server;
pub mod upstream;

pub use pipeline::Pipeline;
pub use request::{MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
pub use server::{GateBuilder, GateServer};
