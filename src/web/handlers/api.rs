use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::report::models::{QueryRequest, ReportFailure, ReportResponse};
use crate::report::pipeline::{CONFIGURATION_MESSAGE, PipelineError};
use crate::web::state::AppState;

// System status

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub llm_backend: String,
    pub gateway_backend: String,
    pub kpi_version: String,
    pub row_cap: usize,
}

type ApiError = (StatusCode, Json<ReportFailure>);

fn bad_request(message: impl Into<String>) -> ApiError {
    let message = message.into();
    (
        StatusCode::BAD_REQUEST,
        Json(ReportFailure::new(message.clone(), message)),
    )
}

pub async fn report(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Rejected report payload: {}", rejection);
        bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let start = Instant::now();
    match app_state.pipeline.run(&request).await {
        Ok(response) => {
            info!(
                "Report request finished in {:?} (success: {})",
                start.elapsed(),
                response.is_success()
            );
            Ok(Json(response))
        }
        Err(PipelineError::InvalidRequest(message)) => Err(bad_request(message)),
        Err(e @ PipelineError::Configuration(_)) => {
            error!("{}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReportFailure::new(CONFIGURATION_MESSAGE, CONFIGURATION_MESSAGE)),
            ))
        }
    }
}

pub async fn system_status(state: State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        llm_backend: state.pipeline.llm_backend().to_string(),
        gateway_backend: state.config.gateway.backend.clone(),
        kpi_version: state.pipeline.kpi_version().to_string(),
        row_cap: state.config.pipeline.row_cap,
    })
}
