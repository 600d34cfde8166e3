use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use super::extract::AppJson;
use crate::error::AppError;
use crate::models::{Enrollment, EnrollmentListing, EnrollmentStats, NewEnrollmentRequest};
use crate::services::EnrollmentService;
use crate::state::AppState;

#[derive(Deserialize)]
pub(super) struct EnrollmentQueryParams {
    search: Option<String>,
}

pub(super) async fn list(
    State(state): State<AppState>,
    Query(params): Query<EnrollmentQueryParams>,
) -> Result<Json<Vec<EnrollmentListing>>, AppError> {
    let enrollments = EnrollmentService::new(state.db.clone())
        .list(params.search.as_deref())
        .await?;
    Ok(Json(enrollments))
}

pub(super) async fn enroll(
    State(state): State<AppState>,
    AppJson(req): AppJson<NewEnrollmentRequest>,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    let enrollment = EnrollmentService::new(state.db.clone())
        .enroll(&req.student_id, &req.course_id)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub(super) async fn unenroll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Enrollment>, AppError> {
    let enrollment = EnrollmentService::new(state.db.clone()).unenroll(&id).await?;
    Ok(Json(enrollment))
}

pub(super) async fn stats(State(state): State<AppState>) -> Result<Json<EnrollmentStats>, AppError> {
    let stats = EnrollmentService::new(state.db.clone()).stats().await?;
    Ok(Json(stats))
}
