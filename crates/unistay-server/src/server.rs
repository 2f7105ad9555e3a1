use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    BoxError, Router,
    error_handling::HandleErrorLayer,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use unistay_auth::IdentityBackend;

use crate::{
    config::AppConfig, handlers, middleware as app_middleware, state::AppState,
};

/// How often idle registration wizards are purged.
const WIZARD_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub struct UniStayServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

/// Routes plus the session middleware, without the outer transport layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and landing
        .route("/", get(handlers::pages::home))
        .route("/healthz", get(handlers::pages::healthz))
        .route("/unauthorized", get(handlers::pages::unauthorized))
        // Sign-in
        .route(
            "/login",
            get(handlers::auth::login_page).post(handlers::auth::login_submit),
        )
        .route("/logout", post(handlers::auth::logout))
        .route("/auth/signin/{provider}", get(handlers::oauth::signin))
        .route("/auth/callback/{provider}", get(handlers::oauth::callback))
        // Role selection and registration
        .route(
            "/select_role",
            get(handlers::roles::select_role_page).post(handlers::roles::select_role_submit),
        )
        .route(
            "/register",
            get(handlers::register::register_page).post(handlers::register::register_submit),
        )
        // JSON session API
        .route("/api/session", get(handlers::pages::session_view))
        .route("/api/session/role", post(handlers::roles::select_role_api))
        // Guarded areas
        .route("/dashboard", get(handlers::pages::guarded_area))
        .route("/dashboard/{*rest}", get(handlers::pages::guarded_area))
        .route("/verification", get(handlers::pages::guarded_area))
        .route("/verification/{*rest}", get(handlers::pages::guarded_area))
        // Every request passes the session middleware, so the guard runs on
        // every navigation.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::session_middleware,
        ))
        .with_state(state)
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    build_router(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .layer(TimeoutLayer::new(cfg.request_timeout())),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    if req.uri().path() == "/favicon.ico" {
                        return tracing::span!(tracing::Level::TRACE, "noop");
                    }
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        if let Some(meta) = span.metadata()
                            && meta.name() != "noop"
                        {
                            tracing::info!(
                                http.status = %res.status().as_u16(),
                                elapsed_ms = %latency.as_millis(),
                                "request handled"
                            );
                        }
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

async fn handle_timeout(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("request timed out");
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        tracing::error!(error = %err, "unhandled middleware error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    }
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    backend: Option<Arc<dyn IdentityBackend>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            backend: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Uses `backend` instead of the HTTP backend from the configuration.
    pub fn with_backend(mut self, backend: Arc<dyn IdentityBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> anyhow::Result<UniStayServer> {
        let state = match self.backend {
            Some(backend) => AppState::with_backend(&self.config, backend)?,
            None => AppState::new(&self.config)?,
        };
        let app = build_app(&self.config, state.clone());

        Ok(UniStayServer {
            addr: self.addr,
            app,
            state,
        })
    }
}

impl UniStayServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);

        let wizards = self.state.wizards.clone();
        let purge = tokio::spawn(async move {
            let mut interval = tokio::time::interval(WIZARD_PURGE_INTERVAL);
            loop {
                interval.tick().await;
                wizards.purge_expired();
            }
        });

        let result = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        purge.abort();
        result?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
