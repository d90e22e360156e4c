// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP request surface.
//!
//! Thin JSON layer over the [`Orchestrator`]: parses bodies, invokes one
//! operation and maps error kinds onto status codes.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gamestack_cloud::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::Error;
use crate::orchestrator::{
    BackupResult, CommandResult, Orchestrator, StartResult, StatusReport, StopResult,
    SwitchResult,
};

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Body of `POST /start`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartRequest {
    /// Workload to start
    #[serde(alias = "game")]
    pub workload: String,
    /// Optional source locator to seed from
    #[serde(default, alias = "data_url")]
    pub source_locator: Option<String>,
}

/// Body of `POST /switch`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchRequest {
    /// Workload to switch to
    #[serde(alias = "game")]
    pub workload: String,
}

/// Body of `POST /command`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRequest {
    /// Console command text
    pub command: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error response of the request surface.
#[derive(Debug)]
pub enum ApiError {
    /// Body could not be parsed.
    BadBody(String),
    /// Operation failed.
    Operation(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Operation(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadBody(rejection.body_text())
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NoActiveWorkload => StatusCode::CONFLICT,
        Error::UnknownWorkload(_) | Error::NoBackup(_) | Error::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        other => match other.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Configuration | ErrorKind::Infrastructure => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadBody(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Operation(err) => {
                let status = status_for(&err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %err, kind = ?err.kind(), "Operation failed");
                    (status, "internal server error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Build the router for the request surface.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/switch", post(switch))
        .route("/backup", post(backup))
        .route("/command", post(command))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn status(State(orchestrator): State<Arc<Orchestrator>>) -> ApiResult<StatusReport> {
    Ok(Json(orchestrator.status().await?))
}

async fn start(
    State(orchestrator): State<Arc<Orchestrator>>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<StartResult> {
    let Json(request) = body?;
    let result = orchestrator
        .start(&request.workload, request.source_locator.as_deref())
        .await?;
    Ok(Json(result))
}

async fn stop(State(orchestrator): State<Arc<Orchestrator>>) -> ApiResult<StopResult> {
    Ok(Json(orchestrator.stop().await?))
}

async fn switch(
    State(orchestrator): State<Arc<Orchestrator>>,
    body: Result<Json<SwitchRequest>, JsonRejection>,
) -> ApiResult<SwitchResult> {
    let Json(request) = body?;
    Ok(Json(orchestrator.switch(&request.workload).await?))
}

async fn backup(State(orchestrator): State<Arc<Orchestrator>>) -> ApiResult<BackupResult> {
    Ok(Json(orchestrator.backup().await?))
}

async fn command(
    State(orchestrator): State<Arc<Orchestrator>>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResult<CommandResult> {
    let Json(request) = body?;
    Ok(Json(orchestrator.command(&request.command).await?))
}
