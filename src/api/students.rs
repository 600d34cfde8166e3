use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use super::SearchParams;
use super::extract::AppJson;
use crate::error::AppError;
use crate::models::{
    Enrollment, NewStudentRequest, StatusChangeRequest, Student, StudentFilter, UpdateStudentRequest,
};
use crate::services::{EnrollmentService, StudentService};
use crate::state::AppState;

pub(super) async fn list(
    State(state): State<AppState>,
    Query(filter): Query<StudentFilter>,
) -> Result<Json<Vec<Student>>, AppError> {
    let students = StudentService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(students))
}

pub(super) async fn create(
    State(state): State<AppState>,
    AppJson(req): AppJson<NewStudentRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    let student = StudentService::new(state.db.clone()).create(req).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub(super) async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Student>>, AppError> {
    let students = StudentService::new(state.db.clone()).search(&params.q).await?;
    Ok(Json(students))
}

pub(super) async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Student>, AppError> {
    let student = StudentService::new(state.db.clone()).get(&id).await?;
    Ok(Json(student))
}

pub(super) async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateStudentRequest>,
) -> Result<Json<Student>, AppError> {
    let student = StudentService::new(state.db.clone()).update(&id, req).await?;
    Ok(Json(student))
}

pub(super) async fn withdraw(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<StatusChangeRequest>,
) -> Result<Json<Student>, AppError> {
    let student = StudentService::new(state.db.clone())
        .withdraw(&id, req.reason.as_deref())
        .await?;
    Ok(Json(student))
}

pub(super) async fn reactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<StatusChangeRequest>,
) -> Result<Json<Student>, AppError> {
    let student = StudentService::new(state.db.clone())
        .reactivate(&id, req.reason.as_deref())
        .await?;
    Ok(Json(student))
}

pub(super) async fn enrollments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Enrollment>>, AppError> {
    let enrollments = EnrollmentService::new(state.db.clone())
        .list_enrollments_for_student(&id)
        .await?;
    Ok(Json(enrollments))
}
