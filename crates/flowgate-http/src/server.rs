//! Router assembly and the serving loop.

use std::sync::Arc;

use axum::http::HeaderName;
use axum::routing::{head, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use flowgate::CapabilitySet;

use crate::auth::{OpenResolver, PrincipalResolver, StaticTokenResolver};
use crate::config::ServerConfig;
use crate::error::TransportError;
use crate::origin::OriginPolicy;
use crate::session::{MemorySessionStore, SessionStore};
use crate::transport::{legacy, streamable, LegacyConnections, TurnConfig, SESSION_HEADER};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub catalog: Arc<dyn CapabilitySet>,
    pub auth: Arc<dyn PrincipalResolver>,
    pub connections: Arc<LegacyConnections>,
    pub origin: Arc<OriginPolicy>,
    pub turn: TurnConfig,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Assemble handler state from configuration and a capability set.
    ///
    /// Auth comes from the configured token list, falling back to open
    /// access as a single local principal when the list is empty.
    pub fn new(
        config: &ServerConfig,
        catalog: Arc<dyn CapabilitySet>,
        shutdown: CancellationToken,
    ) -> Self {
        let auth: Arc<dyn PrincipalResolver> = if config.auth_tokens.is_empty() {
            Arc::new(OpenResolver::local())
        } else {
            Arc::new(StaticTokenResolver::new(
                config
                    .auth_tokens
                    .iter()
                    .map(|entry| (entry.token.clone(), entry.principal.clone())),
            ))
        };
        Self {
            sessions: Arc::new(MemorySessionStore::new()),
            catalog,
            auth,
            connections: Arc::new(LegacyConnections::new()),
            origin: Arc::new(OriginPolicy::new(
                &config.host,
                config.port,
                &config.extra_origins,
                config.enforce_origin,
            )),
            turn: TurnConfig {
                timeout: config.request_timeout(),
                cancel_grace: config.cancel_grace(),
            },
            shutdown,
        }
    }
}

/// Build the full route table over the given state.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

    Router::new()
        .route("/sse", head(legacy::liveness).get(legacy::open_stream))
        .route("/", post(legacy::post_message))
        .route(
            "/streamable",
            post(streamable::post_streamable)
                .get(streamable::get_streamable)
                .delete(streamable::delete_streamable),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds, serves, and drains on shutdown.
pub struct HttpTransport {
    config: ServerConfig,
    state: AppState,
}

impl HttpTransport {
    /// Create a transport over the given catalog with fresh state.
    pub fn new(config: ServerConfig, catalog: Arc<dyn CapabilitySet>) -> Self {
        let shutdown = CancellationToken::new();
        let state = AppState::new(&config, catalog, shutdown);
        Self { config, state }
    }

    /// Handle for requesting a drain from outside the serving loop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Bind and serve until the shutdown token fires.
    pub async fn run(self) -> Result<(), TransportError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, "gateway listening");

        let token = self.state.shutdown.clone();
        let router = build_router(self.state);
        axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }
}
