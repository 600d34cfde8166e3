use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::models::{NewProgramRequest, Program, ProgramStats, ProgramStatus};

const PROGRAM_COLUMNS: &str =
    "id, name, code, description, duration_years, status, created_at";

pub async fn find_program_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(&format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_program_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(&format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE code = ?"))
        .bind(code)
        .fetch_optional(&mut *conn)
        .await
}

/// `name` comparison is case-insensitive through the column collation.
pub async fn name_taken(
    conn: &mut SqliteConnection,
    name: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM programs WHERE name = ?1 AND (?2 IS NULL OR id != ?2))",
    )
    .bind(name)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn code_taken(
    conn: &mut SqliteConnection,
    code: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM programs WHERE code = ?1 AND (?2 IS NULL OR id != ?2))",
    )
    .bind(code)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_program(
    conn: &mut SqliteConnection,
    req: NewProgramRequest,
    now: DateTime<Utc>,
) -> Result<Program, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO programs
            (id, name, code, description, duration_years, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6)
        "#,
    )
    .bind(&id)
    .bind(&req.name)
    .bind(&req.code)
    .bind(&req.description)
    .bind(req.duration_years)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(Program {
        id,
        name: req.name,
        code: req.code,
        description: req.description,
        duration_years: req.duration_years,
        status: ProgramStatus::Active,
        created_at: now,
    })
}

pub async fn update_program(
    conn: &mut SqliteConnection,
    program: &Program,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE programs
        SET name = ?1,
            code = ?2,
            description = ?3,
            duration_years = ?4
        WHERE id = ?5
        "#,
    )
    .bind(&program.name)
    .bind(&program.code)
    .bind(&program.description)
    .bind(program.duration_years)
    .bind(&program.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn set_program_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: ProgramStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE programs SET status = ?1 WHERE id = ?2")
        .bind(status)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn fetch_programs(
    conn: &mut SqliteConnection,
    include_inactive: bool,
) -> Result<Vec<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(&format!(
        "SELECT {PROGRAM_COLUMNS} FROM programs WHERE (?1 OR status = 'active') ORDER BY name"
    ))
    .bind(include_inactive)
    .fetch_all(&mut *conn)
    .await
}

pub async fn search_programs(
    conn: &mut SqliteConnection,
    pattern: &str,
) -> Result<Vec<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(&format!(
        r#"
        SELECT {PROGRAM_COLUMNS} FROM programs
        WHERE name LIKE ?1 ESCAPE '\'
           OR code LIKE ?1 ESCAPE '\'
           OR description LIKE ?1 ESCAPE '\'
        ORDER BY name
        "#
    ))
    .bind(pattern)
    .fetch_all(&mut *conn)
    .await
}

pub async fn fetch_program_stats(
    conn: &mut SqliteConnection,
) -> Result<Vec<ProgramStats>, sqlx::Error> {
    sqlx::query_as::<_, ProgramStats>(
        r#"
        SELECT
            p.id AS program_id,
            p.code AS code,
            p.name AS name,
            COUNT(s.id) AS active_students
        FROM programs p
        LEFT JOIN students s
            ON s.program_id = p.id AND s.status = 'active'
        WHERE p.status = 'active'
        GROUP BY p.id, p.code, p.name
        ORDER BY p.name
        "#,
    )
    .fetch_all(&mut *conn)
    .await
}
