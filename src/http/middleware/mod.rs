//! Pipeline stages.
//!
//! Each stage is an `axum::middleware::from_fn_with_state` function. Their
//! order is fixed by `http::pipeline`.

pub mod auth;
pub mod cache_tags;
pub mod cors;
pub mod health;
pub mod not_found;
pub mod path;

pub use auth::{auth_stage, AuthState};
pub use cache_tags::{cache_tag_stage, CacheTagStage};
pub use cors::cors_stage;
pub use health::health_stage;
pub use not_found::{not_found_stage, NotFoundStage};
pub use path::{normalize_path, normalize_path_stage};
