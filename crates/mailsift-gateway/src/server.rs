//! HTTP server implementation using Axum.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use mailsift_core::config::GatewayConfig;
use mailsift_core::traits::{CredentialCipher, UserStore};
use mailsift_scheduler::{SchedulerService, SyncPipeline};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub gateway_config: GatewayConfig,
    pub start_time: std::time::Instant,
    pub store: Arc<dyn UserStore>,
    pub cipher: Arc<dyn CredentialCipher>,
    pub scheduler: Arc<SchedulerService>,
    /// Same pipeline the scheduled ticks run, used for on-demand digests.
    pub pipeline: Arc<SyncPipeline>,
}

/// API token middleware: validates the X-Api-Token header when a token is configured.
async fn require_token(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let Some(expected) = &state.gateway_config.api_token else {
        return next.run(req).await;
    };

    let provided = req
        .headers()
        .get("X-Api-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided == expected {
        return next.run(req).await;
    }

    axum::response::IntoResponse::into_response(crate::ApiError::Unauthorized(
        "Invalid or missing API token".into(),
    ))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mailsift-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    let protected = Router::new()
        .route("/api/v1/info", get(routes::system_info))
        .route("/api/v1/users", post(routes::create_user))
        .route(
            "/api/v1/users/{id}",
            get(routes::get_user).put(routes::update_user).delete(routes::delete_user),
        )
        .route("/api/v1/users/{id}/folders", get(routes::list_folders))
        .route("/api/v1/users/{id}/folder", put(routes::update_folder))
        .route("/api/v1/users/{id}/tags", put(routes::update_tags))
        .route("/api/v1/users/{id}/blacklist", put(routes::update_blacklist))
        .route("/api/v1/users/{id}/start-time", put(routes::update_start_time))
        .route("/api/v1/users/{id}/summary-count", put(routes::update_summary_count))
        .route(
            "/api/v1/users/{id}/schedule",
            post(routes::schedule_new)
                .put(routes::schedule_update)
                .delete(routes::schedule_delete),
        )
        .route("/api/v1/users/{id}/generate", post(routes::generate))
        .route("/api/v1/tasklist", get(routes::task_list))
        .route_layer(axum::middleware::from_fn_with_state(shared.clone(), require_token));

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/health", get(health_check));

    protected
        .merge(public)
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .allow_origin(Any)
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Serve until `shutdown` resolves.
pub async fn start(state: AppState, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.gateway_config.host, state.gateway_config.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
