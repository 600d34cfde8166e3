use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use super::SearchParams;
use super::extract::AppJson;
use crate::error::AppError;
use crate::models::{NewProgramRequest, Program, ProgramStats, UpdateProgramRequest};
use crate::services::ProgramService;
use crate::state::AppState;

#[derive(Deserialize)]
pub(super) struct ProgramQueryParams {
    #[serde(default)]
    include_inactive: bool,
}

pub(super) async fn list(
    State(state): State<AppState>,
    Query(params): Query<ProgramQueryParams>,
) -> Result<Json<Vec<Program>>, AppError> {
    let programs = ProgramService::new(state.db.clone())
        .list(params.include_inactive)
        .await?;
    Ok(Json(programs))
}

pub(super) async fn create(
    State(state): State<AppState>,
    AppJson(req): AppJson<NewProgramRequest>,
) -> Result<(StatusCode, Json<Program>), AppError> {
    let program = ProgramService::new(state.db.clone()).create(req).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

pub(super) async fn stats(State(state): State<AppState>) -> Result<Json<Vec<ProgramStats>>, AppError> {
    let stats = ProgramService::new(state.db.clone()).stats().await?;
    Ok(Json(stats))
}

pub(super) async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Program>>, AppError> {
    let programs = ProgramService::new(state.db.clone()).search(&params.q).await?;
    Ok(Json(programs))
}

pub(super) async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Program>, AppError> {
    let program = ProgramService::new(state.db.clone()).get(&id).await?;
    Ok(Json(program))
}

pub(super) async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateProgramRequest>,
) -> Result<Json<Program>, AppError> {
    let program = ProgramService::new(state.db.clone()).update(&id, req).await?;
    Ok(Json(program))
}

pub(super) async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Program>, AppError> {
    let program = ProgramService::new(state.db.clone()).deactivate(&id).await?;
    Ok(Json(program))
}

pub(super) async fn activate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Program>, AppError> {
    let program = ProgramService::new(state.db.clone()).activate(&id).await?;
    Ok(Json(program))
}
