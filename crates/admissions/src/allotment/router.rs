use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use super::capacity::CapacityOverrides;
use super::service::{AllotmentError, SeatAllotmentService};
use crate::students::CandidateStore;

pub const AUTO_ALLOT_FAILURE: &str = "Server error during auto-allot";

/// Router builder exposing the administrative allotment trigger.
pub fn allotment_router<S>(service: Arc<SeatAllotmentService<S>>) -> Router
where
    S: CandidateStore + 'static,
{
    Router::new()
        .route("/api/v1/admin/auto-allot", post(auto_allot_handler::<S>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AutoAllotRequest {
    #[serde(default)]
    capacities: CapacityOverrides,
}

impl AutoAllotRequest {
    /// An empty or malformed body means "no overrides".
    fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|err| {
            debug!(error = %err, "ignoring unreadable auto-allot body");
            Self::default()
        })
    }
}

pub(crate) async fn auto_allot_handler<S>(
    State(service): State<Arc<SeatAllotmentService<S>>>,
    body: Bytes,
) -> Response
where
    S: CandidateStore + 'static,
{
    let request = AutoAllotRequest::from_body(&body);
    let outcome =
        tokio::task::spawn_blocking(move || service.auto_allot(&request.capacities)).await;

    match outcome {
        Ok(Ok(summary)) => {
            let payload = json!({
                "success": true,
                "allocated": summary.allocated,
                "assignments": summary.assignments,
                "details": summary.details,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(Err(AllotmentError::AlreadyRunning)) => {
            let payload = json!({ "error": AllotmentError::AlreadyRunning.to_string() });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Ok(Err(_)) => {
            let payload = json!({ "error": AUTO_ALLOT_FAILURE });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
        Err(join_error) => {
            error!(error = %join_error, "auto-allot task did not complete");
            let payload = json!({ "error": AUTO_ALLOT_FAILURE });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
