use crate::config::{QaConfig, ServiceMode};
use crate::handlers;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::TextProvider;
use crate::services::{init_metrics, AnswerGenerator, ContextLoader, QuestionLog};
use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    make_request_span, request_id_middleware, security_headers_middleware,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: QaConfig,
    pub context_loader: Arc<ContextLoader>,
    pub answer_generator: AnswerGenerator,
    /// `Some` only in logging mode.
    pub question_log: Option<QuestionLog>,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    /// Build with the Gemini provider described by `config.google`.
    pub async fn build(config: QaConfig) -> Result<Self, AppError> {
        let provider = GeminiTextProvider::new(GeminiConfig::from(&config.google))
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        tracing::info!(model = %config.google.model, "Initialized Gemini text provider");

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    pub async fn build_with_provider(
        config: QaConfig,
        provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let context_loader = ContextLoader::new(&config.context)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let question_log = match (&config.mode, &config.database) {
            (ServiceMode::Minimal, _) => None,
            (ServiceMode::Logging, Some(db)) => {
                let log = QuestionLog::connect(db.url.expose_secret(), db.max_connections)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to PostgreSQL: {}", e);
                        e
                    })?;
                log.run_migrations().await?;
                Some(log)
            }
            (ServiceMode::Logging, None) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "logging mode requires a database configuration"
                )));
            }
        };

        let state = AppState {
            config: config.clone(),
            context_loader: Arc::new(context_loader),
            answer_generator: AnswerGenerator::new(provider),
            question_log,
        };

        let app = router(state.clone());

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port = port,
            mode = config.mode.as_str(),
            cache_path = %config.context.cache_path.display(),
            "qa-service listening"
        );

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

/// All routes plus the cross-cutting layers.
pub fn router(state: AppState) -> Router {
    let api = match state.config.mode {
        ServiceMode::Minimal => Router::new().route("/ask", post(handlers::ask)),
        ServiceMode::Logging => Router::new()
            .route("/ask", post(handlers::ask_and_record))
            .route("/logs", get(handlers::recent_logs)),
    };

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            make_request_span(request)
        }))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Any origin in minimal mode; the configured allow-list in logging mode.
fn cors_layer(config: &QaConfig) -> CorsLayer {
    match config.mode {
        ServiceMode::Minimal => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        ServiceMode::Logging => {
            let origins: Vec<HeaderValue> = config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                        None
                    }
                })
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
