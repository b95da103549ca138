use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::error;

use super::domain::{
    Branch, MarksStatus, ReceiptStatus, RegistrationSubmission, StudentFilter, StudentId,
    SubmittedMarks,
};
use super::repository::{CandidateStore, StoreError};
use super::service::{StudentService, StudentServiceError};

/// Router builder exposing the applicant lifecycle endpoints.
pub fn student_router<S>(service: Arc<StudentService<S>>) -> Router
where
    S: CandidateStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/students",
            get(list_handler::<S>).post(register_handler::<S>),
        )
        .route("/api/v1/students/by-branch", post(by_branch_handler::<S>))
        .route(
            "/api/v1/students/:student_id",
            get(status_handler::<S>).delete(withdraw_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/verify-marks",
            post(verify_marks_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/marks-status",
            patch(marks_status_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/seat",
            patch(seat_response_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/receipt",
            post(submit_receipt_handler::<S>).patch(receipt_status_handler::<S>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListQuery {
    #[serde(default)]
    receipt_pending: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchRequest {
    #[serde(default)]
    branch: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReceiptSubmission {
    #[serde(default)]
    receipt_ref: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReceiptStatusRequest {
    #[serde(default)]
    receipt_status: Option<String>,
    #[serde(default)]
    notification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarksStatusRequest {
    #[serde(default, alias = "marksheetStatus", alias = "marksStatus")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeatResponseRequest {
    #[serde(
        default,
        alias = "seatAccepted",
        deserialize_with = "deserialize_present"
    )]
    seat_accepted: Option<Option<bool>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(Some)
}

pub(crate) async fn register_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    axum::Json(submission): axum::Json<RegistrationSubmission>,
) -> Response
where
    S: CandidateStore + 'static,
{
    match service.register(submission) {
        Ok(record) => {
            let payload = json!({
                "success": true,
                "student": record.status_view(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: CandidateStore + 'static,
{
    let filter = StudentFilter {
        receipt_pending_only: query.receipt_pending,
    };
    match service.list_students(filter) {
        Ok(students) => {
            (StatusCode::OK, axum::Json(json!({ "students": students }))).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn by_branch_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    axum::Json(request): axum::Json<BranchRequest>,
) -> Response
where
    S: CandidateStore + 'static,
{
    let Some(branch) = request.branch.as_deref().and_then(Branch::parse) else {
        let payload = json!({ "error": "Invalid branch" });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    match service.list_by_branch(branch) {
        Ok(students) => {
            let payload = json!({ "branch": branch.as_str(), "students": students });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    Path(student_id): Path<String>,
) -> Response
where
    S: CandidateStore + 'static,
{
    match service.get(&StudentId(student_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn verify_marks_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    Path(student_id): Path<String>,
    axum::Json(submitted): axum::Json<SubmittedMarks>,
) -> Response
where
    S: CandidateStore + 'static,
{
    match service.verify_marks(&StudentId(student_id), submitted) {
        Ok(record) => {
            let payload = json!({
                "success": true,
                "status": record.marks_status.as_str(),
                "student": record.status_view(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn marks_status_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    Path(student_id): Path<String>,
    axum::Json(request): axum::Json<MarksStatusRequest>,
) -> Response
where
    S: CandidateStore + 'static,
{
    let Some(status) = request.status.as_deref().and_then(MarksStatus::parse) else {
        let payload = json!({ "error": "Invalid status value" });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    match service.set_marks_status(&StudentId(student_id), status) {
        Ok(record) => {
            let payload = json!({
                "success": true,
                "message": format!("Marksheet {} successfully", status.as_str().to_lowercase()),
                "student": record.status_view(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn seat_response_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    Path(student_id): Path<String>,
    axum::Json(request): axum::Json<SeatResponseRequest>,
) -> Response
where
    S: CandidateStore + 'static,
{
    let Some(accepted) = request.seat_accepted else {
        let payload = json!({ "error": "No updatable fields provided" });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    match service.respond_to_seat(&StudentId(student_id), accepted) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_receipt_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    Path(student_id): Path<String>,
    axum::Json(request): axum::Json<ReceiptSubmission>,
) -> Response
where
    S: CandidateStore + 'static,
{
    match service.submit_receipt(&StudentId(student_id), &request.receipt_ref) {
        Ok(record) => {
            let payload = json!({ "success": true, "student": record.status_view() });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn receipt_status_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    Path(student_id): Path<String>,
    axum::Json(request): axum::Json<ReceiptStatusRequest>,
) -> Response
where
    S: CandidateStore + 'static,
{
    let Some(status) = request
        .receipt_status
        .as_deref()
        .and_then(ReceiptStatus::parse)
    else {
        let payload = json!({ "error": "Invalid receipt status" });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };

    match service.set_receipt_status(&StudentId(student_id), status, request.notification) {
        Ok(record) => {
            let payload = json!({ "success": true, "student": record.status_view() });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn withdraw_handler<S>(
    State(service): State<Arc<StudentService<S>>>,
    Path(student_id): Path<String>,
) -> Response
where
    S: CandidateStore + 'static,
{
    match service.withdraw(&StudentId(student_id)) {
        Ok(()) => (StatusCode::OK, axum::Json(json!({ "ok": true }))).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: StudentServiceError) -> Response {
    let status = match &err {
        StudentServiceError::MissingFields(_)
        | StudentServiceError::MarksOutOfRange(_)
        | StudentServiceError::UnknownBranch(_) => StatusCode::BAD_REQUEST,
        StudentServiceError::NoSeatAllotted => StatusCode::UNPROCESSABLE_ENTITY,
        StudentServiceError::OfficialMarksMissing
        | StudentServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        StudentServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        StudentServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "student store failure");
        "Internal Server Error".to_string()
    } else if status == StatusCode::NOT_FOUND
        && !matches!(err, StudentServiceError::OfficialMarksMissing)
    {
        "Student not found".to_string()
    } else {
        err.to_string()
    };

    (status, axum::Json(json!({ "error": message }))).into_response()
}
