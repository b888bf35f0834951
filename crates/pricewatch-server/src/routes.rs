use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pricewatch_core::{CheckpointStore, TargetSource, UiCommand};

use crate::auth::require_admin_token;
use crate::dto::{
    CommandResponse, ConfigResponse, HealthResponse, StatusResponse, TargetsRefreshedResponse,
    UpdateConfigRequest,
};
use crate::error::ApiError;
use crate::events::stream_events;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router<T, S>(state: Arc<AppState<T, S>>) -> Router
where
    T: TargetSource + 'static,
    S: CheckpointStore + 'static,
{
    let api = Router::new()
        .route("/v1/config", get(get_config::<T, S>).put(update_config::<T, S>))
        .route("/v1/status", get(get_status::<T, S>))
        .route("/v1/targets/refresh", post(refresh_targets::<T, S>))
        .route("/v1/crawl/start", post(start_crawl::<T, S>))
        .route("/v1/crawl/stop", post(stop_crawl::<T, S>))
        .route("/v1/crawl/retry-stop", post(stop_retry::<T, S>))
        .route("/v1/crawl/skip", post(skip_item::<T, S>))
        .route("/v1/events", get(stream_events::<T, S>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token::<T, S>,
        ));

    let public = Router::new()
        .route("/health", get(health::<T, S>))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/config",
    responses(
        (status = 200, description = "Current crawl config", body = ConfigResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "config"
)]
pub async fn get_config<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
) -> Result<axum::Json<ConfigResponse>, ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    let config = state.crawler.get_config().await?;
    Ok(axum::Json(config.into()))
}

#[utoipa::path(
    put,
    path = "/v1/config",
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Updated crawl config", body = ConfigResponse),
        (status = 400, description = "Invalid config", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "config"
)]
pub async fn update_config<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
    axum::Json(body): axum::Json<UpdateConfigRequest>,
) -> Result<axum::Json<ConfigResponse>, ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    let config = state.crawler.update_config(body.into()).await?;
    Ok(axum::Json(config.into()))
}

// ---------------------------------------------------------------------------
// Status & targets
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/status",
    responses(
        (status = 200, description = "Task list, results and engine state", body = StatusResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn get_status<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
) -> Result<axum::Json<StatusResponse>, ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    let status = state.crawler.current_status().await?;
    Ok(axum::Json(status.into()))
}

#[utoipa::path(
    post,
    path = "/v1/targets/refresh",
    responses(
        (status = 200, description = "Task list replaced, progress reset", body = TargetsRefreshedResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Collect endpoint failed", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn refresh_targets<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
) -> Result<axum::Json<TargetsRefreshedResponse>, ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    let refreshed = state.crawler.fetch_target_list().await?;
    Ok(axum::Json(refreshed.into()))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn send_command<T, S>(
    state: &AppState<T, S>,
    command: UiCommand,
    name: &str,
) -> Result<(StatusCode, axum::Json<CommandResponse>), ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    state.crawler.command(command).await?;
    Ok((
        StatusCode::ACCEPTED,
        axum::Json(CommandResponse {
            command: name.to_string(),
            accepted: true,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/crawl/start",
    responses(
        (status = 202, description = "Start queued", body = CommandResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn start_crawl<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
) -> Result<impl IntoResponse, ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    send_command(&state, UiCommand::CrawlStart, "start").await
}

#[utoipa::path(
    post,
    path = "/v1/crawl/stop",
    responses(
        (status = 202, description = "Stop queued", body = CommandResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn stop_crawl<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
) -> Result<impl IntoResponse, ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    send_command(&state, UiCommand::CrawlStop, "stop").await
}

#[utoipa::path(
    post,
    path = "/v1/crawl/retry-stop",
    responses(
        (status = 202, description = "Pending retry cancellation queued", body = CommandResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn stop_retry<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
) -> Result<impl IntoResponse, ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    send_command(&state, UiCommand::RetryStop, "retry-stop").await
}

#[utoipa::path(
    post,
    path = "/v1/crawl/skip",
    responses(
        (status = 200, description = "Current item recorded as failed and skipped", body = CommandResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Crawl is running or nothing is left", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "crawl"
)]
pub async fn skip_item<T, S>(
    State(state): State<Arc<AppState<T, S>>>,
) -> Result<axum::Json<CommandResponse>, ApiError>
where
    T: TargetSource,
    S: CheckpointStore,
{
    state.crawler.skip().await?;
    Ok(axum::Json(CommandResponse {
        command: "skip".to_string(),
        accepted: true,
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Crawl engine is gone", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health<T, S>(State(state): State<Arc<AppState<T, S>>>) -> impl IntoResponse
where
    T: TargetSource,
    S: CheckpointStore,
{
    let engine_ok = state.crawler.engine().status().await.is_ok();

    let status = if engine_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if engine_ok { "healthy" } else { "unhealthy" },
        engine: if engine_ok { "ok" } else { "stopped" },
    };

    (status, axum::Json(response))
}
