mod courses;
mod enrollments;
mod extract;
mod programs;
mod students;

use axum::routing::{get, post};
use axum::{Router, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/programs", get(programs::list).post(programs::create))
        .route("/programs/stats", get(programs::stats))
        .route("/programs/search", get(programs::search))
        .route("/programs/{id}", get(programs::get).patch(programs::update))
        .route("/programs/{id}/deactivate", post(programs::deactivate))
        .route("/programs/{id}/activate", post(programs::activate))
        .route("/students", get(students::list).post(students::create))
        .route("/students/search", get(students::search))
        .route("/students/{id}", get(students::get).patch(students::update))
        .route("/students/{id}/withdraw", post(students::withdraw))
        .route("/students/{id}/reactivate", post(students::reactivate))
        .route("/students/{id}/enrollments", get(students::enrollments))
        .route("/courses", get(courses::list).post(courses::create))
        .route("/courses/available", get(courses::available))
        .route("/courses/{id}", get(courses::get).patch(courses::update))
        .route("/courses/{id}/availability", get(courses::availability))
        .route("/courses/{id}/deactivate", post(courses::deactivate))
        .route("/courses/{id}/students", get(courses::roster))
        .route("/enrollments", get(enrollments::list).post(enrollments::enroll))
        .route("/enrollments/stats", get(enrollments::stats))
        .route("/enrollments/{id}/unenroll", post(enrollments::unenroll))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}
