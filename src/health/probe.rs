//! Liveness and readiness aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::config::HealthConfig;
use crate::error::GateError;
use crate::health::checks::{self, DependencyCheck};
use crate::observability::metrics;

/// Body of `/health/live`.
#[derive(Debug, Clone, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub timestamp: String,
}

/// Body of `/health/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub checks: BTreeMap<String, String>,
    pub timestamp: String,
}

struct RegisteredCheck {
    check: Arc<dyn DependencyCheck>,
    critical: bool,
}

/// Runs dependency checks on demand.
pub struct HealthProbe {
    checks: Vec<RegisteredCheck>,
    timeout: Duration,
    token: Option<String>,
}

impl HealthProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            checks: Vec::new(),
            timeout,
            token: None,
        }
    }

    /// Require `X-Health-Token: <token>` on every `/health/` path.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Register a dependency. Failures of non-critical checks are reported
    /// but never make the gateway unready.
    pub fn with_check(mut self, check: impl DependencyCheck + 'static, critical: bool) -> Self {
        self.checks.push(RegisteredCheck {
            check: Arc::new(check),
            critical,
        });
        self
    }

    pub fn from_config(config: &HealthConfig) -> Result<Self, GateError> {
        let mut probe = Self::new(Duration::from_millis(config.check_timeout_ms));
        probe.token = config.token.clone().filter(|t| !t.is_empty());
        for entry in &config.checks {
            probe.checks.push(RegisteredCheck {
                check: Arc::from(checks::from_config(entry)?),
                critical: entry.critical,
            });
        }
        Ok(probe)
    }

    /// True when no token is configured or `presented` equals it.
    pub fn token_matches(&self, presented: Option<&[u8]>) -> bool {
        match &self.token {
            None => true,
            Some(expected) => presented
                .is_some_and(|p| bool::from(p.ct_eq(expected.as_bytes()))),
        }
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            status: "alive",
            timestamp: timestamp(),
        }
    }

    /// Run every check concurrently, each bounded by the check timeout.
    pub async fn readiness(&self) -> HealthStatus {
        let handles: Vec<_> = self
            .checks
            .iter()
            .map(|registered| {
                let check = registered.check.clone();
                let timeout = self.timeout;
                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(timeout, check.check()).await {
                        Ok(result) => result,
                        Err(_) => Err(format!("timed out after {}ms", timeout.as_millis())),
                    }
                });
                (registered.check.name().to_string(), registered.critical, handle)
            })
            .collect();

        let mut healthy = true;
        let mut outcomes = BTreeMap::new();
        for (name, critical, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(format!("check aborted: {e}")));

            metrics::record_readiness_check(&name, result.is_ok());
            let outcome = match result {
                Ok(()) => "ok".to_string(),
                Err(detail) => {
                    tracing::warn!(check = %name, critical, detail = %detail, "Readiness check failed");
                    if critical {
                        healthy = false;
                    }
                    format!("failed: {detail}")
                }
            };
            outcomes.insert(name, outcome);
        }

        HealthStatus {
            healthy,
            checks: outcomes,
            timestamp: timestamp(),
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}
