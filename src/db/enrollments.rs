use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::models::{Enrollment, EnrollmentListing, EnrollmentState, EnrollmentStats, RosterEntry};

const ENROLLMENT_COLUMNS: &str = "id, student_id, course_id, status, enrolled_at, deactivated_at";

pub async fn find_enrollment_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

/// The single row for the pair, whatever its state.
pub async fn find_enrollment_for_pair(
    conn: &mut SqliteConnection,
    student_id: &str,
    course_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE student_id = ?1 AND course_id = ?2"
    ))
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn count_active_for_course(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM enrollments WHERE course_id = ? AND status = 'active'",
    )
    .bind(course_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_enrollment(
    conn: &mut SqliteConnection,
    student_id: &str,
    course_id: &str,
    now: DateTime<Utc>,
) -> Result<Enrollment, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO enrollments
            (id, student_id, course_id, status, enrolled_at, deactivated_at)
        VALUES (?1, ?2, ?3, 'active', ?4, NULL)
        "#,
    )
    .bind(&id)
    .bind(student_id)
    .bind(course_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(Enrollment {
        id,
        student_id: student_id.to_string(),
        course_id: course_id.to_string(),
        enrolled_at: now,
        state: EnrollmentState::Active,
    })
}

/// Flips an inactive row back to active. Returns false if the row was not inactive.
pub async fn reactivate_enrollment(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE enrollments
        SET status = 'active',
            deactivated_at = NULL
        WHERE id = ?1 AND status = 'inactive'
        "#,
    )
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Returns false if no active row with this id exists.
pub async fn deactivate_enrollment(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE enrollments
        SET status = 'inactive',
            deactivated_at = ?2
        WHERE id = ?1 AND status = 'active'
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn fetch_active_for_student(
    conn: &mut SqliteConnection,
    student_id: &str,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        r#"
        SELECT {ENROLLMENT_COLUMNS} FROM enrollments
        WHERE student_id = ? AND status = 'active'
        ORDER BY enrolled_at, rowid
        "#
    ))
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn fetch_roster_for_course(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<Vec<RosterEntry>, sqlx::Error> {
    sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT
            e.id AS enrollment_id,
            s.id AS student_id,
            s.registration_number AS registration_number,
            e.enrolled_at AS enrolled_at
        FROM enrollments e
        JOIN students s ON s.id = e.student_id
        WHERE e.course_id = ? AND e.status = 'active'
        ORDER BY e.enrolled_at, e.rowid
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await
}

/// Every active enrollment, newest first. `pattern` is a `LIKE` pattern matched
/// against the registration number and the course code and name.
pub async fn fetch_active_enrollments(
    conn: &mut SqliteConnection,
    pattern: Option<&str>,
) -> Result<Vec<EnrollmentListing>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT
            e.id AS enrollment_id,
            s.id AS student_id,
            s.registration_number AS registration_number,
            c.id AS course_id,
            c.code AS course_code,
            c.name AS course_name,
            e.enrolled_at AS enrolled_at
        FROM enrollments e
        JOIN students s ON s.id = e.student_id
        JOIN courses c ON c.id = e.course_id
        WHERE e.status = 'active'
        "#,
    );
    if let Some(pattern) = pattern {
        builder
            .push(" AND (s.registration_number LIKE ")
            .push_bind(pattern.to_string())
            .push(" ESCAPE '\\' OR c.code LIKE ")
            .push_bind(pattern.to_string())
            .push(" ESCAPE '\\' OR c.name LIKE ")
            .push_bind(pattern.to_string())
            .push(" ESCAPE '\\')");
    }
    builder.push(" ORDER BY e.enrolled_at DESC, e.rowid DESC");

    builder
        .build_query_as::<EnrollmentListing>()
        .fetch_all(&mut *conn)
        .await
}

pub async fn fetch_enrollment_stats(
    conn: &mut SqliteConnection,
    today: NaiveDate,
) -> Result<EnrollmentStats, sqlx::Error> {
    let (start, end) = EnrollmentStats::day_bounds(today);

    sqlx::query_as::<_, EnrollmentStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(status = 'active'), 0) AS active,
            COALESCE(SUM(status = 'inactive'), 0) AS inactive,
            COALESCE(SUM(enrolled_at >= ?1 AND enrolled_at < ?2), 0) AS enrolled_today
        FROM enrollments
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await
}
