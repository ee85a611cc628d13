//! HTTP server setup.
//!
//! # Responsibilities
//! - Hold the shared collaborators handlers reach through `AppState`
//! - Build the router: business routes behind the gate middleware
//! - Wire tower layers (panic catcher, tracing, security headers, timeout, body limit)
//! - Serve plain TCP or TLS with graceful shutdown

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::billing::{BillingProvider, StripeClient};
use crate::config::{GatewayConfig, IdentityBackend};
use crate::gating::{gate_middleware, GateSettings};
use crate::handlers;
use crate::http::envelope::ApiError;
use crate::http::request::CorrelationId;
use crate::http::tls::load_tls_config;
use crate::identity::{MemorySessionStore, SessionCookies, SessionResolver, SupabaseResolver};
use crate::lifecycle::Shutdown;
use crate::quota::{MemoryQuotaStore, QuotaStore};
use crate::security::rate_limit::{MemoryRateLimitStore, RateLimit, RateLimitStore};
use crate::security::{apply_security_headers, security_headers_middleware, Authorizer, RoleAuthorizer};
use crate::support::{MemoryTicketStore, TicketStore};

/// Application state injected into every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Path rules and CORS allow-list, swapped on config reload.
    pub gate: Arc<ArcSwap<GateSettings>>,
    pub resolver: Arc<dyn SessionResolver>,
    pub authorizer: Arc<dyn Authorizer>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub quotas: Arc<dyn QuotaStore>,
    pub tickets: Arc<dyn TicketStore>,
    pub billing: Arc<dyn BillingProvider>,
    pub config: Arc<GatewayConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn rate_limiting_enabled(&self) -> bool {
        self.config.rate_limit.enabled
    }

    /// Window applied to handlers that don't name their own.
    pub fn default_rate_limit(&self) -> RateLimit {
        RateLimit::new(self.config.rate_limit.points, self.config.rate_limit.duration_secs)
    }

    pub fn max_body_size(&self) -> usize {
        self.config.security.max_body_size
    }

    /// Replace the live gate settings with ones built from `config`.
    pub fn reload_gate(&self, config: &GatewayConfig) {
        self.gate.store(Arc::new(GateSettings::from_config(config)));
        tracing::info!(
            gated = ?config.gating.gated_prefixes,
            production = config.deployment.production,
            "Gate settings reloaded"
        );
    }
}

/// In-process stores backing everything except billing.
///
/// Used for development and tests; the handles stay usable for seeding
/// and inspection after the state is built.
#[derive(Clone)]
pub struct InMemory {
    pub sessions: MemorySessionStore,
    pub quotas: MemoryQuotaStore,
    pub rate_limits: MemoryRateLimitStore,
    pub tickets: MemoryTicketStore,
}

impl InMemory {
    pub fn new(config: &GatewayConfig) -> Self {
        let cookies = SessionCookies::from_config(&config.identity, config.deployment.production);
        Self {
            sessions: MemorySessionStore::new(cookies, config.identity.refresh_margin_secs),
            quotas: MemoryQuotaStore::new(),
            rate_limits: MemoryRateLimitStore::new(),
            tickets: MemoryTicketStore::new(),
        }
    }

    pub fn state(&self, config: GatewayConfig, billing: Arc<dyn BillingProvider>) -> AppState {
        AppState {
            gate: Arc::new(ArcSwap::from_pointee(GateSettings::from_config(&config))),
            resolver: Arc::new(self.sessions.clone()),
            authorizer: Arc::new(RoleAuthorizer),
            rate_limits: Arc::new(self.rate_limits.clone()),
            quotas: Arc::new(self.quotas.clone()),
            tickets: Arc::new(self.tickets.clone()),
            billing,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

/// Errors building the collaborators from config.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("identity provider: {0}")]
    Identity(#[from] crate::identity::IdentityError),

    #[error("payment processor: {0}")]
    Billing(#[from] crate::billing::BillingError),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Build state for the configured backends. Returns the in-memory stores
/// as well so the caller can run their maintenance tasks.
pub fn build_state(config: GatewayConfig) -> Result<(AppState, InMemory), StartupError> {
    let memory = InMemory::new(&config);
    let billing: Arc<dyn BillingProvider> = Arc::new(StripeClient::new(
        config.billing.clone(),
        config.deployment.public_url.clone(),
    )?);

    let mut state = memory.state(config, billing);
    if state.config.identity.backend == IdentityBackend::Supabase {
        let cookies = SessionCookies::from_config(&state.config.identity, state.config.deployment.production);
        state.resolver = Arc::new(SupabaseResolver::new(&state.config.identity, cookies)?);
        tracing::info!(url = %state.config.identity.url, "Using hosted identity provider");
    } else {
        tracing::warn!("Using in-memory sessions; not for production");
    }
    Ok((state, memory))
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        Self {
            router: Self::build_router(state),
            config,
        }
    }

    /// The full application with every layer applied.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        handlers::routes(state.default_rate_limit())
            .layer(axum::middleware::from_fn_with_state(state.clone(), gate_middleware))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(axum::middleware::from_fn(security_headers_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(panic_response))
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), StartupError> {
        let addr = listener.local_addr()?;
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        if let Some(tls) = &self.config.listener.tls {
            let rustls = load_tls_config(tls).await?;
            let handle = axum_server::Handle::new();
            let drain = shutdown.drain_timeout();
            let graceful = handle.clone();
            let rx = shutdown.subscribe();
            tokio::spawn(async move {
                Shutdown::signalled(rx).await;
                graceful.graceful_shutdown(Some(drain));
            });

            tracing::info!(address = %addr, "HTTPS server starting");
            let std_listener = listener.into_std()?;
            axum_server::from_tcp_rustls(std_listener, rustls)
                .handle(handle)
                .serve(app)
                .await?;
        } else {
            tracing::info!(address = %addr, "HTTP server starting");
            axum::serve(listener, app)
                .with_graceful_shutdown(Shutdown::signalled(shutdown.subscribe()))
                .await?;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Panics outside the protected wrapper still produce the generic envelope.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    let correlation_id = CorrelationId::generate();
    let mut response = ApiError::Internal(format!("panic: {}", detail)).into_envelope(&correlation_id);
    apply_security_headers(response.headers_mut());
    response
}
