//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health/live
//!     → probe.rs liveness (no dependency checks)
//!
//! GET /health/ready
//!     → probe.rs spawns every check in checks.rs concurrently
//!     → each bounded by the check timeout
//!     → HealthStatus: healthy = AND over critical checks
//! ```
//!
//! # Design Decisions
//! - Readiness is recomputed on every request, never cached
//! - Non-critical dependencies are reported but never flip `healthy`

pub mod checks;
pub mod probe;

pub use checks::{DependencyCheck, HttpCheck, RedisCheck, TcpCheck};
pub use probe::{HealthProbe, HealthStatus, Liveness};
