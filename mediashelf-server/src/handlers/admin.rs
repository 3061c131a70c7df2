use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use mediashelf_core::{SyncReport, VariantReport};
use serde::Serialize;
use tracing::{error, info};

use crate::infra::{app_state::AppState, errors::sync_error_status};

/// Body returned by the synchronization trigger, success or not.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<VariantReport>>,
}

impl From<SyncReport> for SyncResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            success: true,
            count: report.total_records(),
            reason: None,
            variants: Some(report.variants),
        }
    }
}

impl SyncResponse {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            reason: Some(reason.into()),
            variants: None,
        }
    }
}

pub async fn sync_collection_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Response {
    match state.synchronizer.synchronize_named(&collection).await {
        Ok(report) => {
            info!(
                collection = %report.collection,
                records = report.total_records(),
                run_id = %report.run_id,
                "sync trigger completed"
            );
            (StatusCode::OK, Json(SyncResponse::from(report))).into_response()
        }
        Err(err) => {
            let status = sync_error_status(&err);
            if status.is_server_error() {
                error!(collection = %collection, error = %err, "sync trigger failed");
            } else {
                info!(collection = %collection, reason = %err, "sync trigger rejected");
            }
            (status, Json(SyncResponse::failure(err.reason()))).into_response()
        }
    }
}
