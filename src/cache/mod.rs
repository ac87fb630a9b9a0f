//! Cache invalidation tags.
//!
//! # Data Flow
//! ```text
//! cache_tags stage inserts a RequestCacheCollector into request extensions
//!     → core handler adds tags / lowers the lifetime
//!     → cache_tags stage collects the CacheTagSet once
//!     → tag, lifetime and Cache-Control headers on the response
//! ```
//!
//! # Design Decisions
//! - Rendering stays outside the gateway; handlers only report tags
//! - A tag set is consumed exactly once, then discarded

pub mod collector;
pub mod tags;

pub use collector::{CacheTagCollector, RequestCacheCollector};
pub use tags::{CacheTagSet, Lifetime, UNBOUNDED_LIFETIME_SECS};
