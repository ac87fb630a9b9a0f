//! HTTP server setup.
//!
//! # Responsibilities
//! - Build every component from `GateConfig` (overridable for embedders/tests)
//! - Assemble the core router: login endpoints plus upstream forwarding or
//!   the embedder's own router
//! - Wrap the core in the pipeline
//! - Serve with graceful shutdown and purge expired counters in the background

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::health::HealthProbe;
use crate::http::login::{self, LoginState};
use crate::http::pipeline::Pipeline;
use crate::http::upstream::{self, UpstreamState};
use crate::lifecycle::Shutdown;
use crate::security::{
    counter_store_from_config, ConfigCredentialStore, CounterStore, CredentialStore,
    MemoryCounterStore, RateLimiter, TokenIssuer, TokenValidator,
};

/// Builder for `GateServer`. Anything not overridden comes from the config.
pub struct GateBuilder {
    config: GateConfig,
    core: Option<Router>,
    credentials: Option<Arc<dyn CredentialStore>>,
    counter_store: Option<Arc<dyn CounterStore>>,
    probe: Option<HealthProbe>,
    validator: Option<Option<TokenValidator>>,
    issuer: Option<Option<TokenIssuer>>,
}

impl GateBuilder {
    /// Serve `core` instead of forwarding to the upstream.
    pub fn core(mut self, core: Router) -> Self {
        self.core = Some(core);
        self
    }

    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.counter_store = Some(store);
        self
    }

    pub fn health_probe(mut self, probe: HealthProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Use `validator` for bearer authentication; `None` disables it.
    pub fn token_validator(mut self, validator: Option<TokenValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Use `issuer` for login tokens; `None` disables issuance.
    pub fn token_issuer(mut self, issuer: Option<TokenIssuer>) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn build(self) -> Result<GateServer, GateError> {
        let config = self.config;

        let (counter_store, purgeable) = match self.counter_store {
            Some(store) => (store, None),
            None => counter_store_from_config(&config.rate_limit)?,
        };
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(ConfigCredentialStore::new(&config.login.users)));
        let probe = match self.probe {
            Some(probe) => probe,
            None => HealthProbe::from_config(&config.health)?,
        };
        let validator = self
            .validator
            .unwrap_or_else(|| TokenValidator::from_config(&config.jwt))
            .map(Arc::new);
        let issuer = self
            .issuer
            .unwrap_or_else(|| TokenIssuer::from_config(&config.jwt))
            .map(Arc::new);

        let mut core = match self.core {
            Some(core) => core,
            None => upstream::routes(UpstreamState::from_config(&config)?),
        };
        if config.login.enabled {
            let state = LoginState {
                limiter: RateLimiter::new(counter_store, &config.rate_limit),
                credentials,
                issuer,
                validator: validator.clone(),
                trust_forwarded_for: config.rate_limit.trust_forwarded_for,
            };
            core = login::routes(&config.login, state).merge(core);
        }

        let pipeline = Pipeline::new(&config, Arc::new(probe), validator)?;
        let router = pipeline.wrap(core);

        Ok(GateServer {
            router,
            config,
            purgeable,
        })
    }
}

/// The gateway: pipeline-wrapped router plus its background tasks.
pub struct GateServer {
    router: Router,
    config: GateConfig,
    purgeable: Option<MemoryCounterStore>,
}

impl GateServer {
    pub fn builder(config: GateConfig) -> GateBuilder {
        GateBuilder {
            config,
            core: None,
            credentials: None,
            counter_store: None,
            probe: None,
            validator: None,
            issuer: None,
        }
    }

    /// Build everything from configuration.
    pub fn new(config: GateConfig) -> Result<Self, GateError> {
        Self::builder(config).build()
    }

    /// The fully wrapped router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Serve until `shutdown` is triggered, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(store) = self.purgeable {
            let interval = Duration::from_secs(self.config.rate_limit.purge_interval_secs.max(1));
            tokio::spawn(purge_loop(store, interval, shutdown.subscribe()));
        }

        let mut stop = shutdown.subscribe();

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn purge_loop(store: MemoryCounterStore, interval: Duration, mut stop: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = store.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = store.len(), "Purged expired login counters");
                }
            }
            _ = stop.recv() => {
                tracing::debug!("Counter purge task stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_purge_loop_stops_on_shutdown() {
        let store = MemoryCounterStore::new();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(purge_loop(store, Duration::from_secs(60), shutdown.subscribe()));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_builds_from_default_config() {
        let server = GateServer::new(GateConfig::default()).unwrap();
        assert_eq!(server.config().login.path, "/auth/login");
    }
}
