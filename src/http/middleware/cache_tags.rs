//! Cache-tag header emission stage.
//!
//! # Responsibilities
//! - Give the core handler a `RequestCacheCollector` through extensions
//! - Emit tag and lifetime headers from the collected set
//! - Derive `Cache-Control` when the core handler set none
//!
//! # Design Decisions
//! - The collector is provided even when emission is disabled, so handlers
//!   never fail to extract it
//! - Nothing is emitted when no tag was collected
//! - Header names are only parsed when emission is enabled

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::cache::{CacheTagCollector, RequestCacheCollector};
use crate::config::CacheTagConfig;
use crate::error::GateError;

#[derive(Debug, Clone)]
struct EmitHeaders {
    tags: HeaderName,
    lifetime: HeaderName,
}

#[derive(Debug, Clone)]
pub struct CacheTagStage {
    emit: Option<EmitHeaders>,
}

impl CacheTagStage {
    pub fn from_config(config: &CacheTagConfig) -> Result<Self, GateError> {
        if !config.enabled {
            return Ok(Self { emit: None });
        }

        let parse = |name: &str| {
            HeaderName::from_str(name).map_err(|_| {
                GateError::Configuration(format!("invalid cache tag header name {name}"))
            })
        };
        Ok(Self {
            emit: Some(EmitHeaders {
                tags: parse(&config.header_name)?,
                lifetime: parse(&config.lifetime_header_name)?,
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.emit.is_some()
    }
}

pub async fn cache_tag_stage(
    State(stage): State<Arc<CacheTagStage>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let collector = RequestCacheCollector::new();
    request.extensions_mut().insert(collector.clone());

    let mut response = next.run(request).await;
    let Some(names) = &stage.emit else {
        return response;
    };
    let Some(set) = collector.collect().filter(|s| !s.is_empty()) else {
        return response;
    };

    let lifetime = set.lifetime().as_secs();
    let headers = response.headers_mut();
    match HeaderValue::from_str(&set.header_value()) {
        Ok(value) => {
            headers.insert(names.tags.clone(), value);
        }
        Err(_) => {
            tracing::warn!(tags = %set.header_value(), "Cache tags are not a valid header value");
            return response;
        }
    }
    headers.insert(names.lifetime.clone(), HeaderValue::from(lifetime));

    if lifetime > 0 && !headers.contains_key(header::CACHE_CONTROL) {
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={lifetime}")) {
            headers.insert(header::CACHE_CONTROL, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, header_name: &str) -> CacheTagConfig {
        CacheTagConfig {
            enabled,
            header_name: header_name.to_string(),
            ..CacheTagConfig::default()
        }
    }

    #[test]
    fn test_invalid_header_name_rejected_when_enabled() {
        assert!(CacheTagStage::from_config(&config(true, "bad header")).is_err());
    }

    #[test]
    fn test_disabled_stage_ignores_header_names() {
        let stage = CacheTagStage::from_config(&config(false, "bad header")).unwrap();
        assert!(!stage.is_enabled());
    }

    #[test]
    fn test_enabled_stage_parses_defaults() {
        let stage = CacheTagStage::from_config(&CacheTagConfig::default()).unwrap();
        assert!(stage.is_enabled());
    }
}
