//! Application wiring: state, router and server lifecycle.

use crate::config::ChatConfig;
use crate::handlers;
use crate::models::{Session, ThreadState};
use crate::services::metrics::http_metrics_middleware;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::TextProvider;
use crate::services::session_store::spawn_cleanup_task;
use crate::services::{CustomerDirectory, ModelClient, SessionStore, Supervisor};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upper bound for multipart bodies: a full set of images and documents.
const MAX_UPLOAD_BODY_BYTES: usize = 100 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub sessions: Arc<SessionStore<Session>>,
    pub threads: Arc<SessionStore<ThreadState>>,
    pub model: ModelClient,
    pub supervisor: Arc<Supervisor>,
    pub customers: Arc<CustomerDirectory>,
}

impl AppState {
    pub fn new(config: ChatConfig, model: ModelClient) -> Self {
        let timeout = config.session_timeout();
        Self {
            config,
            sessions: Arc::new(SessionStore::new("chat", timeout)),
            threads: Arc::new(SessionStore::new("threads", timeout)),
            model,
            supervisor: Arc::new(Supervisor::new()),
            customers: Arc::new(CustomerDirectory::demo()),
        }
    }
}

/// Model client for `config`: Gemini when a key is set, fallback mode otherwise.
pub fn model_client(config: &ChatConfig) -> ModelClient {
    let Some(api_key) = config.model.api_key.clone() else {
        tracing::warn!("GOOGLE_API_KEY not set, running in fallback mode");
        return ModelClient::disabled();
    };

    let gemini_config = GeminiConfig {
        api_key,
        model: config.model.name.clone(),
        api_base: config.model.api_base.clone(),
        request_timeout: config.model_timeout(),
    };
    match GeminiTextProvider::new(gemini_config) {
        Ok(provider) => {
            tracing::info!(model = %config.model.name, "Initialized Gemini text provider");
            let provider: Arc<dyn TextProvider> = Arc::new(provider);
            ModelClient::new(provider, config.model_timeout())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Gemini provider unavailable, running in fallback mode");
            ModelClient::disabled()
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = match HeaderValue::from_str(&state.config.cors.allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!(
                origin = %state.config.cors.allowed_origin,
                "Invalid CORS origin, cross-origin requests will be refused"
            );
            CorsLayer::new()
        }
    };

    let threads = Router::new()
        .route("/threads/:thread_id/chat", post(handlers::thread_chat))
        .route("/threads/:thread_id/runs/stream", post(handlers::run_stream))
        .route("/threads/:thread_id/messages", get(handlers::get_messages))
        .route("/threads/:thread_id/state", get(handlers::get_state))
        .route("/threads/:thread_id", delete(handlers::delete_thread))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/chat", post(handlers::chat))
        .merge(threads)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let model = model_client(&config);
        Self::build_with_model(config, model).await
    }

    /// Build around an explicit model client; tests pass a mock provider here.
    pub async fn build_with_model(config: ChatConfig, model: ModelClient) -> Result<Self, AppError> {
        let state = AppState::new(config.clone(), model);

        let interval = config.cleanup_interval();
        spawn_cleanup_task(state.sessions.clone(), interval);
        spawn_cleanup_task(state.threads.clone(), interval);

        let app = build_router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, model = state.model.mode(), "Chat service listening");

        let server = axum::serve(listener, app);

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
