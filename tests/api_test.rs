use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use gestion_academica::api::router;
use gestion_academica::db;
use gestion_academica::state::AppState;

async fn setup_app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");
    db::migrate(&pool).await.expect("Failed to run migrations");
    router(AppState { db: pool })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request");

    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn seed(app: &Router) -> (String, String, String) {
    let (status, program) = send(
        app,
        "POST",
        "/programs",
        Some(json!({
            "name": "técnico en programación",
            "code": "tp2024",
            "description": "",
            "duration_years": 3
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(program["code"], "TP2024");
    let program_id = program["id"].as_str().expect("id").to_string();

    let (status, course) = send(
        app,
        "POST",
        "/courses",
        Some(json!({
            "name": "Programación I",
            "code": "prog1",
            "program_id": program_id,
            "capacity": 1,
            "year": 1,
            "term": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let course_id = course["id"].as_str().expect("id").to_string();

    let (status, student) = send(
        app,
        "POST",
        "/students",
        Some(json!({
            "account_id": "ana@example.com",
            "program_id": program_id,
            "admission_date": "2024-03-01"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(student["registration_number"], "LEG-2024-0001");
    assert_eq!(student["status"], "active");
    let student_id = student["id"].as_str().expect("id").to_string();

    (program_id, course_id, student_id)
}

#[tokio::test]
async fn test_health() {
    let app = setup_app().await;
    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_enrollment_lifecycle_over_http() {
    let app = setup_app().await;
    let (_, course_id, student_id) = seed(&app).await;
    let enroll_body = json!({ "student_id": student_id, "course_id": course_id });

    let (status, enrollment) = send(&app, "POST", "/enrollments", Some(enroll_body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(enrollment["status"], "active");
    let enrollment_id = enrollment["id"].as_str().expect("id").to_string();

    let (status, error) = send(&app, "POST", "/enrollments", Some(enroll_body.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "409 Conflict");

    let (status, roster) = send(&app, "GET", &format!("/courses/{}/students", course_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster.as_array().map(Vec::len), Some(1));

    let uri = format!("/enrollments/{}/unenroll", enrollment_id);
    let (status, inactive) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inactive["status"], "inactive");
    assert!(inactive["deactivated_at"].is_string());

    let (status, _) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, again) = send(&app, "POST", "/enrollments", Some(enroll_body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(again["id"], enrollment_id.as_str());
    assert_eq!(again["status"], "active");

    let (status, stats) = send(&app, "GET", "/enrollments/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["active"], 1);
}

#[tokio::test]
async fn test_error_statuses() {
    let app = setup_app().await;
    let (_, course_id, _) = seed(&app).await;

    let (status, body) = send(&app, "GET", "/students/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "404 Not Found");

    let (status, other_program) = send(
        &app,
        "POST",
        "/programs",
        Some(json!({
            "name": "Diseño Gráfico",
            "code": "DG2020",
            "description": "",
            "duration_years": 4
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, outsider) = send(
        &app,
        "POST",
        "/students",
        Some(json!({
            "account_id": "bruno@example.com",
            "program_id": other_program["id"],
            "admission_date": "2024-03-01"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        "/enrollments",
        Some(json!({ "student_id": outsider["id"], "course_id": course_id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "POST",
        "/programs",
        Some(json!({
            "name": "Sin Código",
            "code": "1234AB",
            "description": "",
            "duration_years": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_course_queries() {
    let app = setup_app().await;
    let (program_id, course_id, _) = seed(&app).await;

    let (status, courses) = send(&app, "GET", &format!("/courses?program_id={}&year=1", program_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(courses.as_array().map(Vec::len), Some(1));

    let (status, availability) = send(&app, "GET", &format!("/courses/{}/availability", course_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(availability["code"], "PROG1");
    assert_eq!(availability["remaining_capacity"], 1);

    let (status, available) = send(&app, "GET", "/courses/available?year=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(available.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_student_withdraw_and_search() {
    let app = setup_app().await;
    let (_, _, student_id) = seed(&app).await;

    let uri = format!("/students/{}/withdraw", student_id);
    let (status, withdrawn) = send(&app, "POST", &uri, Some(json!({ "reason": "moved abroad" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(withdrawn["status"], "withdrawn");
    assert!(withdrawn["on"].is_string());

    let (status, _) = send(&app, "POST", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, found) = send(&app, "GET", "/students/search?q=LEG-2024", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().map(Vec::len), Some(1));

    let (status, all) = send(&app, "GET", "/students", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(1));

    let (status, active) = send(&app, "GET", "/students?status=active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active.as_array().map(Vec::len), Some(0));

    let (status, withdrawn) = send(&app, "GET", "/students?status=withdrawn", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(withdrawn.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_enrollment_listing_search() {
    let app = setup_app().await;
    let (_, course_id, student_id) = seed(&app).await;
    let (status, _) = send(
        &app,
        "POST",
        "/enrollments",
        Some(json!({ "student_id": student_id, "course_id": course_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, listed) = send(&app, "GET", "/enrollments?search=prog1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["registration_number"], "LEG-2024-0001");
    assert_eq!(listed[0]["course_code"], "PROG1");

    let (status, none) = send(&app, "GET", "/enrollments?search=nothing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(none.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_malformed_json_uses_error_body() {
    let app = setup_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/programs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .expect("valid request");

    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let body: Value = serde_json::from_slice(&bytes).expect("json error body");
    assert_eq!(body["error"], "400 Bad Request");
    assert!(body["message"].is_string());
}
