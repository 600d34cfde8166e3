use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::db::like_pattern;
use crate::models::{Course, CourseAvailability, CourseFilter, CourseStatus, NewCourseRequest};

const COURSE_COLUMNS: &str =
    "c.id, c.name, c.code, c.program_id, c.capacity, c.year, c.term, c.status, c.updated_at";

pub async fn find_course_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses c WHERE c.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Claims the course for the rest of the surrounding transaction.
///
/// SQLite has no row locks: this write takes the database write lock, so it
/// must be the first statement of the transaction. Every other enrollment
/// transaction blocks here (up to the busy timeout) until this one ends.
pub async fn lock_course(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Course>, sqlx::Error> {
    let touched = sqlx::query("UPDATE courses SET updated_at = updated_at WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if touched == 0 {
        return Ok(None);
    }

    find_course_by_id(conn, id).await
}

pub async fn code_taken(
    conn: &mut SqliteConnection,
    code: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM courses WHERE code = ?1 AND (?2 IS NULL OR id != ?2))",
    )
    .bind(code)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_course(
    conn: &mut SqliteConnection,
    req: NewCourseRequest,
    now: DateTime<Utc>,
) -> Result<Course, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO courses
            (id, name, code, program_id, capacity, year, term, status, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8)
        "#,
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.code)
    .bind(&req.program_id)
    .bind(req.capacity)
    .bind(req.year)
    .bind(req.term)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(Course {
        id,
        name: req.name,
        code: req.code,
        program_id: req.program_id,
        capacity: req.capacity,
        year: req.year,
        term: req.term,
        status: CourseStatus::Active,
        updated_at: now,
    })
}

pub async fn update_course(
    conn: &mut SqliteConnection,
    course: &Course,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE courses
        SET name = ?1,
            code = ?2,
            capacity = ?3,
            year = ?4,
            term = ?5,
            status = ?6,
            updated_at = ?7
        WHERE id = ?8
        "#,
    )
    .bind(&course.name)
    .bind(&course.code)
    .bind(course.capacity)
    .bind(course.year)
    .bind(course.term)
    .bind(course.status)
    .bind(course.updated_at)
    .bind(&course.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &CourseFilter) {
    builder.push(" WHERE c.status = 'active'");
    if let Some(program_id) = &filter.program_id {
        builder.push(" AND c.program_id = ").push_bind(program_id.clone());
    }
    if let Some(year) = filter.year {
        builder.push(" AND c.year = ").push_bind(year);
    }
    if let Some(term) = filter.term {
        builder.push(" AND c.term = ").push_bind(term);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        builder
            .push(" AND (c.name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR c.code LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// Active courses matching `filter`, ordered by year, term and name.
pub async fn fetch_courses(
    conn: &mut SqliteConnection,
    filter: &CourseFilter,
) -> Result<Vec<Course>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {COURSE_COLUMNS} FROM courses c"));
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY c.year, c.term, c.name");

    builder
        .build_query_as::<Course>()
        .fetch_all(&mut *conn)
        .await
}

fn availability_select() -> String {
    format!(
        r#"
        SELECT
            {COURSE_COLUMNS},
            COUNT(e.id) AS active_enrollments,
            c.capacity - COUNT(e.id) AS remaining_capacity
        FROM courses c
        LEFT JOIN enrollments e
            ON e.course_id = c.id AND e.status = 'active'
        "#
    )
}

pub async fn fetch_course_availability(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<CourseAvailability>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(availability_select());
    builder.push(" WHERE c.id = ").push_bind(id.to_string());
    builder.push(" GROUP BY c.id");

    builder
        .build_query_as::<CourseAvailability>()
        .fetch_optional(&mut *conn)
        .await
}

/// Active courses that still have at least one free seat.
pub async fn fetch_courses_with_capacity(
    conn: &mut SqliteConnection,
    filter: &CourseFilter,
) -> Result<Vec<CourseAvailability>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(availability_select());
    push_filter(&mut builder, filter);
    builder.push(" GROUP BY c.id HAVING COUNT(e.id) < c.capacity");
    builder.push(" ORDER BY c.year, c.term, c.name");

    builder
        .build_query_as::<CourseAvailability>()
        .fetch_all(&mut *conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[tokio::test]
    async fn test_insert_and_fetch_course() {
        let pool = test_support::setup_test_db().await;
        let program = test_support::program(&pool, "TP2024").await;
        let course = test_support::course(&pool, &program.id, "PROG1", 30).await;

        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let fetched = find_course_by_id(&mut conn, &course.id)
            .await
            .expect("query")
            .expect("Course not found");
        assert_eq!(fetched.code, "PROG1");
        assert_eq!(fetched.capacity, 30);
        assert!(fetched.is_active());
    }

    #[tokio::test]
    async fn test_lock_course_missing() {
        let pool = test_support::setup_test_db().await;
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let locked = lock_course(&mut conn, "nope").await.expect("query");
        assert!(locked.is_none());
    }

    #[tokio::test]
    async fn test_fetch_courses_filters() {
        let pool = test_support::setup_test_db().await;
        let a = test_support::program(&pool, "AA0001").await;
        let b = test_support::program(&pool, "BB0002").await;
        test_support::course(&pool, &a.id, "ALG1", 10).await;
        test_support::course(&pool, &a.id, "ALG2", 10).await;
        test_support::course(&pool, &b.id, "BIO1", 10).await;

        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let by_program = fetch_courses(
            &mut conn,
            &CourseFilter {
                program_id: Some(a.id.clone()),
                ..CourseFilter::default()
            },
        )
        .await
        .expect("fetch");
        assert_eq!(by_program.len(), 2);

        let by_search = fetch_courses(
            &mut conn,
            &CourseFilter {
                search: Some("bio".to_string()),
                ..CourseFilter::default()
            },
        )
        .await
        .expect("fetch");
        assert_eq!(by_search.len(), 1);
        assert_eq!(by_search[0].code, "BIO1");
    }

    #[tokio::test]
    async fn test_availability_without_enrollments() {
        let pool = test_support::setup_test_db().await;
        let program = test_support::program(&pool, "TP2024").await;
        let course = test_support::course(&pool, &program.id, "PROG1", 4).await;

        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let availability = fetch_course_availability(&mut conn, &course.id)
            .await
            .expect("query")
            .expect("Course not found");
        assert_eq!(availability.active_enrollments, 0);
        assert_eq!(availability.remaining_capacity, 4);

        let open = fetch_courses_with_capacity(&mut conn, &CourseFilter::default())
            .await
            .expect("fetch");
        assert_eq!(open.len(), 1);
    }
}
