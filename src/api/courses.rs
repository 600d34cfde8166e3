use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use super::extract::AppJson;
use crate::error::AppError;
use crate::models::{
    Course, CourseAvailability, CourseFilter, NewCourseRequest, RosterEntry, UpdateCourseRequest,
};
use crate::services::{CourseService, EnrollmentService};
use crate::state::AppState;

pub(super) async fn list(
    State(state): State<AppState>,
    Query(filter): Query<CourseFilter>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = CourseService::new(state.db.clone()).list(&filter).await?;
    Ok(Json(courses))
}

pub(super) async fn create(
    State(state): State<AppState>,
    AppJson(req): AppJson<NewCourseRequest>,
) -> Result<(StatusCode, Json<Course>), AppError> {
    let course = CourseService::new(state.db.clone()).create(req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub(super) async fn available(
    State(state): State<AppState>,
    Query(filter): Query<CourseFilter>,
) -> Result<Json<Vec<CourseAvailability>>, AppError> {
    let courses = CourseService::new(state.db.clone())
        .list_with_capacity(&filter)
        .await?;
    Ok(Json(courses))
}

pub(super) async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Course>, AppError> {
    let course = CourseService::new(state.db.clone()).get(&id).await?;
    Ok(Json(course))
}

pub(super) async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateCourseRequest>,
) -> Result<Json<Course>, AppError> {
    let course = CourseService::new(state.db.clone()).update(&id, req).await?;
    Ok(Json(course))
}

pub(super) async fn availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseAvailability>, AppError> {
    let availability = CourseService::new(state.db.clone()).availability(&id).await?;
    Ok(Json(availability))
}

pub(super) async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Course>, AppError> {
    let course = CourseService::new(state.db.clone()).deactivate(&id).await?;
    Ok(Json(course))
}

pub(super) async fn roster(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RosterEntry>>, AppError> {
    let roster = EnrollmentService::new(state.db.clone())
        .list_students_for_course(&id)
        .await?;
    Ok(Json(roster))
}
