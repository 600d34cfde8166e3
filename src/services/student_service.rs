use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use validator::Validate;

use crate::db::{like_pattern, programs, students};
use crate::error::AppError;
use crate::models::{NewStudentRequest, Student, StudentFilter, StudentState, UpdateStudentRequest};

const REGISTRATION_PREFIX: &str = "LEG";

pub struct StudentService {
    db: SqlitePool,
}

impl StudentService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, req: NewStudentRequest) -> Result<Student, AppError> {
        let req = req.normalized();
        req.validate()?;
        check_admission_date(req.admission_date, today())?;

        let mut tx = self.db.begin().await?;
        if let Some(program_id) = &req.program_id {
            check_program_assignable(&mut tx, program_id).await?;
        }
        if students::account_taken(&mut tx, &req.account_id).await? {
            return Err(AppError::Conflict(format!(
                "account {} already has a student record",
                req.account_id
            )));
        }

        let registration_number = match &req.registration_number {
            Some(number) => {
                if students::registration_taken(&mut tx, number, None).await? {
                    return Err(AppError::Conflict(format!("registration number {} is taken", number)));
                }
                number.clone()
            }
            None => next_registration_number_with(&mut tx, req.admission_date.year()).await?,
        };

        let student = students::insert_student(&mut tx, req, registration_number).await?;
        tx.commit().await?;

        info!("created student {} ({})", student.registration_number, student.id);
        Ok(student)
    }

    pub async fn update(&self, id: &str, req: UpdateStudentRequest) -> Result<Student, AppError> {
        let req = req.normalized();
        req.validate()?;

        let mut tx = self.db.begin().await?;
        let mut current = students::find_student_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("student", id))?;

        if let Some(number) = req.registration_number {
            if students::registration_taken(&mut tx, &number, Some(id)).await? {
                return Err(AppError::Conflict(format!("registration number {} is taken", number)));
            }
            current.registration_number = number;
        }
        if let Some(program_id) = req.program_id {
            if current.program_id.as_deref() != Some(program_id.as_str()) {
                check_program_assignable(&mut tx, &program_id).await?;
                current.program_id = Some(program_id);
            }
        }
        if let Some(admission_date) = req.admission_date {
            check_admission_date(admission_date, today())?;
            current.admission_date = admission_date;
        }
        if let Some(phone) = req.phone {
            current.phone = phone;
        }
        if let Some(address) = req.address {
            current.address = address;
        }
        if let Some(notes) = req.notes {
            current.notes = notes;
        }

        students::update_student(&mut tx, &current).await?;
        tx.commit().await?;
        Ok(current)
    }

    /// Marks the student withdrawn as of today. Withdrawing twice is a conflict.
    pub async fn withdraw(&self, id: &str, reason: Option<&str>) -> Result<Student, AppError> {
        let mut tx = self.db.begin().await?;
        let mut student = students::find_student_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("student", id))?;

        if !student.is_active() {
            return Err(AppError::Conflict(format!("student {} is already withdrawn", id)));
        }

        student.state = StudentState::Withdrawn { on: today() };
        append_note(&mut student.notes, "Withdrawn", reason);
        students::update_student(&mut tx, &student).await?;
        tx.commit().await?;

        warn!("student {} withdrawn", student.registration_number);
        Ok(student)
    }

    pub async fn reactivate(&self, id: &str, reason: Option<&str>) -> Result<Student, AppError> {
        let mut tx = self.db.begin().await?;
        let mut student = students::find_student_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("student", id))?;

        if student.is_active() {
            return Err(AppError::Conflict(format!("student {} is already active", id)));
        }

        student.state = StudentState::Active;
        append_note(&mut student.notes, "Reactivated", reason);
        students::update_student(&mut tx, &student).await?;
        tx.commit().await?;

        info!("student {} reactivated", student.registration_number);
        Ok(student)
    }

    pub async fn get(&self, id: &str) -> Result<Student, AppError> {
        let mut conn = self.db.acquire().await?;
        students::find_student_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("student", id))
    }

    pub async fn find_by_registration(&self, number: &str) -> Result<Option<Student>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(students::find_student_by_registration(&mut conn, &number.trim().to_uppercase()).await?)
    }

    pub async fn list(&self, filter: &StudentFilter) -> Result<Vec<Student>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(students::fetch_students(&mut conn, filter).await?)
    }

    pub async fn list_active(&self) -> Result<Vec<Student>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(students::fetch_active_students(&mut conn).await?)
    }

    pub async fn list_by_program(&self, program_id: &str) -> Result<Vec<Student>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(students::fetch_students_by_program(&mut conn, program_id).await?)
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Student>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(students::search_students(&mut conn, &like_pattern(term)).await?)
    }

    pub async fn next_registration_number(&self, year: i32) -> Result<String, AppError> {
        let mut conn = self.db.acquire().await?;
        next_registration_number_with(&mut conn, year).await
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn check_admission_date(admission_date: NaiveDate, today: NaiveDate) -> Result<(), AppError> {
    if admission_date > today {
        return Err(AppError::Validation(format!(
            "admission date {} is in the future",
            admission_date
        )));
    }
    Ok(())
}

async fn check_program_assignable(
    conn: &mut SqliteConnection,
    program_id: &str,
) -> Result<(), AppError> {
    let program = programs::find_program_by_id(conn, program_id)
        .await?
        .ok_or_else(|| AppError::not_found("program", program_id))?;
    if !program.is_active() {
        return Err(AppError::Validation(format!("program {} is not active", program.code)));
    }
    Ok(())
}

/// `LEG-YYYY-NNNN`, one past the highest numeric suffix already issued for `year`.
/// Widens past four digits instead of wrapping.
async fn next_registration_number_with(
    conn: &mut SqliteConnection,
    year: i32,
) -> Result<String, AppError> {
    let prefix = format!("{REGISTRATION_PREFIX}-{year:04}-");
    let next = students::max_registration_suffix(conn, &prefix)
        .await?
        .map_or(1, |n| n + 1);
    Ok(format!("{prefix}{next:04}"))
}

fn append_note(notes: &mut String, label: &str, reason: Option<&str>) {
    let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
        return;
    };
    if !notes.is_empty() {
        notes.push('\n');
    }
    notes.push_str(&format!("[{}] {}: {}", Utc::now().to_rfc3339(), label, reason));
}
