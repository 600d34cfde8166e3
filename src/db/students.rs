use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::models::{NewStudentRequest, Student, StudentFilter, StudentState};

const STUDENT_COLUMNS: &str = "id, account_id, registration_number, program_id, admission_date, \
     phone, address, notes, status, withdrawn_on";

pub async fn find_student_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_student_by_registration(
    conn: &mut SqliteConnection,
    registration_number: &str,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE registration_number = ?"
    ))
    .bind(registration_number)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn registration_taken(
    conn: &mut SqliteConnection,
    registration_number: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM students WHERE registration_number = ?1 AND (?2 IS NULL OR id != ?2))",
    )
    .bind(registration_number)
    .bind(exclude_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn account_taken(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM students WHERE account_id = ?1)")
        .bind(account_id)
        .fetch_one(&mut *conn)
        .await
}

/// Highest numeric suffix among registration numbers starting with `prefix`.
/// Suffixes that are not all digits are ignored.
pub async fn max_registration_suffix(
    conn: &mut SqliteConnection,
    prefix: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i64>>(
        r#"
        SELECT MAX(CAST(substr(registration_number, length(?1) + 1) AS INTEGER))
        FROM students
        WHERE substr(registration_number, 1, length(?1)) = ?1
          AND length(registration_number) > length(?1)
          AND substr(registration_number, length(?1) + 1) NOT GLOB '*[^0-9]*'
        "#,
    )
    .bind(prefix)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_student(
    conn: &mut SqliteConnection,
    req: NewStudentRequest,
    registration_number: String,
) -> Result<Student, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO students
            (id, account_id, registration_number, program_id, admission_date,
            phone, address, notes, status, withdrawn_on)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', NULL)
        "#,
    )
    .bind(&id)
    .bind(&req.account_id)
    .bind(&registration_number)
    .bind(&req.program_id)
    .bind(req.admission_date)
    .bind(&req.phone)
    .bind(&req.address)
    .bind(&req.notes)
    .execute(&mut *conn)
    .await?;

    Ok(Student {
        id,
        account_id: req.account_id,
        registration_number,
        program_id: req.program_id,
        admission_date: req.admission_date,
        phone: req.phone,
        address: req.address,
        notes: req.notes,
        state: StudentState::Active,
    })
}

/// Writes every mutable column, including the state pair.
pub async fn update_student(
    conn: &mut SqliteConnection,
    student: &Student,
) -> Result<(), sqlx::Error> {
    let (status, withdrawn_on): (&str, Option<NaiveDate>) = match student.state {
        StudentState::Active => ("active", None),
        StudentState::Withdrawn { on } => ("withdrawn", Some(on)),
    };

    sqlx::query(
        r#"
        UPDATE students
        SET registration_number = ?1,
            program_id = ?2,
            admission_date = ?3,
            phone = ?4,
            address = ?5,
            notes = ?6,
            status = ?7,
            withdrawn_on = ?8
        WHERE id = ?9
        "#,
    )
    .bind(&student.registration_number)
    .bind(&student.program_id)
    .bind(student.admission_date)
    .bind(&student.phone)
    .bind(&student.address)
    .bind(&student.notes)
    .bind(status)
    .bind(withdrawn_on)
    .bind(&student.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_active_students(
    conn: &mut SqliteConnection,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE status = 'active' ORDER BY registration_number"
    ))
    .fetch_all(&mut *conn)
    .await
}

pub async fn fetch_students_by_program(
    conn: &mut SqliteConnection,
    program_id: &str,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        r#"
        SELECT {STUDENT_COLUMNS} FROM students
        WHERE program_id = ? AND status = 'active'
        ORDER BY registration_number
        "#
    ))
    .bind(program_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn fetch_students(
    conn: &mut SqliteConnection,
    filter: &StudentFilter,
) -> Result<Vec<Student>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT {STUDENT_COLUMNS} FROM students WHERE 1 = 1"));
    if let Some(program_id) = &filter.program_id {
        builder.push(" AND program_id = ").push_bind(program_id.clone());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    builder.push(" ORDER BY registration_number");

    builder
        .build_query_as::<Student>()
        .fetch_all(&mut *conn)
        .await
}

pub async fn search_students(
    conn: &mut SqliteConnection,
    pattern: &str,
) -> Result<Vec<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>(&format!(
        r#"
        SELECT {STUDENT_COLUMNS} FROM students
        WHERE registration_number LIKE ?1 ESCAPE '\'
           OR account_id LIKE ?1 ESCAPE '\'
        ORDER BY registration_number
        "#
    ))
    .bind(pattern)
    .fetch_all(&mut *conn)
    .await
}
