//! HTTP control routes
//!
//! JSON endpoints for programmatic control, one HTML form flow for browsers,
//! and the output directory served as static files under `/stream`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::output::PUBLIC_PREFIX;
use crate::registry::{Mode, RegistryError, StartOutcome, StreamIdentity, StreamRegistry};

use super::config::ServerConfig;
use super::page;

type AppState = Arc<StreamRegistry>;

/// Build the control router for `registry`
pub fn router(registry: Arc<StreamRegistry>, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/start", post(start))
        .route("/restream", post(restream))
        .route("/stop", post(stop))
        .route("/status", get(status))
        .route("/status/{identity}", get(stream_status));

    if config.index_page {
        router = router.route("/", get(index));
    }

    if config.serve_output {
        let dir = ServeDir::new(registry.output_dir().path());
        router = router.nest_service(PUBLIC_PREFIX, dir);
    }

    router.layer(TraceLayer::new_for_http()).with_state(registry)
}

#[derive(Debug, Deserialize)]
struct StartBody {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct StopBody {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestreamForm {
    #[serde(alias = "inputUrl", default)]
    url: String,
}

async fn index() -> Html<&'static str> {
    Html(page::INDEX)
}

async fn start(
    State(registry): State<AppState>,
    Json(body): Json<StartBody>,
) -> Result<Json<StartOutcome>, ApiError> {
    let outcome = registry.start(&body.url).await?;
    Ok(Json(outcome))
}

async fn restream(State(registry): State<AppState>, Form(form): Form<RestreamForm>) -> Response {
    match registry.start(&form.url).await {
        Ok(outcome) => Html(page::started(&outcome)).into_response(),
        Err(RegistryError::InvalidInput(e)) => {
            (StatusCode::BAD_REQUEST, Html(page::rejected(&e.to_string()))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, url = %form.url, "Restream failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(page::failed(&e.to_string()))).into_response()
        }
    }
}

async fn stop(State(registry): State<AppState>, body: Bytes) -> Result<Json<serde_json::Value>, ApiError> {
    let body: StopBody = if body.iter().all(u8::is_ascii_whitespace) {
        StopBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let stopped = registry.stop_source(body.url.as_deref()).await?;
    Ok(Json(json!({ "stopped": stopped })))
}

async fn status(State(registry): State<AppState>) -> Json<serde_json::Value> {
    match registry.config().mode {
        Mode::Single => {
            let current = registry.current().await;
            Json(json!({
                "streaming": current.streaming,
                "url": current.url,
                "ready": current.ready,
            }))
        }
        Mode::Multi => Json(json!({ "streams": registry.status_all().await })),
    }
}

async fn stream_status(
    State(registry): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identity = StreamIdentity::new(identity);

    match registry.status(&identity).await {
        Some(status) => Ok(Json(json!(status))),
        None => Err(ApiError::NotFound(identity)),
    }
}

/// Errors returned by the JSON endpoints
#[derive(Debug)]
enum ApiError {
    Registry(RegistryError),
    BadRequest(String),
    NotFound(StreamIdentity),
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::Registry(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Registry(e @ (RegistryError::InvalidInput(_) | RegistryError::UrlRequired)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Registry(e) => {
                tracing::error!(error = %e, "Control request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(identity) => {
                let message = match identity.decode() {
                    Some(url) => format!("no stream for {}", url),
                    None => format!("no stream {}", identity),
                };
                (StatusCode::NOT_FOUND, message)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
