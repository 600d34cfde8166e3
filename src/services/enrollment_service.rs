//! Enrollment engine.
//!
//! `enroll_with` and `unenroll_with` run on a caller-supplied connection and
//! assume it is inside a transaction; `EnrollmentService` owns the
//! transaction boundary for the HTTP layer. Per enrollment row the lifecycle
//! is `absent -> active <-> inactive`; rows are never deleted.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::db::{courses, enrollments, like_pattern, students};
use crate::error::AppError;
use crate::models::{
    Course, Enrollment, EnrollmentListing, EnrollmentState, EnrollmentStats, RosterEntry,
};

pub struct EnrollmentService {
    db: SqlitePool,
}

impl EnrollmentService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn enroll(&self, student_id: &str, course_id: &str) -> Result<Enrollment, AppError> {
        let mut tx = self.db.begin().await?;
        let enrollment = enroll_with(&mut tx, student_id, course_id, Utc::now()).await?;
        tx.commit().await?;

        info!(
            "student {} enrolled in course {} (enrollment {})",
            student_id, course_id, enrollment.id
        );
        Ok(enrollment)
    }

    pub async fn unenroll(&self, enrollment_id: &str) -> Result<Enrollment, AppError> {
        let mut tx = self.db.begin().await?;
        let enrollment = unenroll_with(&mut tx, enrollment_id, Utc::now()).await?;
        tx.commit().await?;

        info!("enrollment {} deactivated", enrollment_id);
        Ok(enrollment)
    }

    pub async fn list_enrollments_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<Enrollment>, AppError> {
        let mut conn = self.db.acquire().await?;
        if students::find_student_by_id(&mut conn, student_id).await?.is_none() {
            return Err(AppError::not_found("student", student_id));
        }
        Ok(enrollments::fetch_active_for_student(&mut conn, student_id).await?)
    }

    pub async fn list_students_for_course(
        &self,
        course_id: &str,
    ) -> Result<Vec<RosterEntry>, AppError> {
        let mut conn = self.db.acquire().await?;
        if courses::find_course_by_id(&mut conn, course_id).await?.is_none() {
            return Err(AppError::not_found("course", course_id));
        }
        Ok(enrollments::fetch_roster_for_course(&mut conn, course_id).await?)
    }

    /// Active enrollments, newest first, optionally narrowed by a term matched
    /// against registration numbers and course codes and names.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<EnrollmentListing>, AppError> {
        let pattern = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(like_pattern);
        let mut conn = self.db.acquire().await?;
        Ok(enrollments::fetch_active_enrollments(&mut conn, pattern.as_deref()).await?)
    }

    pub async fn stats(&self) -> Result<EnrollmentStats, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(enrollments::fetch_enrollment_stats(&mut conn, Utc::now().date_naive()).await?)
    }
}

/// Enrolls `student_id` in `course_id`, reusing an inactive row if one exists.
///
/// The course is locked before anything is read, so the capacity check and the
/// write below it see no concurrent enrollment for the same course.
pub async fn enroll_with(
    conn: &mut SqliteConnection,
    student_id: &str,
    course_id: &str,
    now: DateTime<Utc>,
) -> Result<Enrollment, AppError> {
    let course = courses::lock_course(conn, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("course", course_id))?;

    let student = students::find_student_by_id(conn, student_id)
        .await?
        .ok_or_else(|| AppError::not_found("student", student_id))?;

    if student.program_id.as_deref() != Some(course.program_id.as_str()) {
        return Err(AppError::InvalidProgramMatch {
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
        });
    }

    match enrollments::find_enrollment_for_pair(conn, student_id, course_id).await? {
        Some(existing) => match existing.state {
            EnrollmentState::Active => Err(AppError::AlreadyEnrolled {
                student_id: student_id.to_string(),
                course_id: course_id.to_string(),
            }),
            EnrollmentState::Inactive { .. } => {
                ensure_capacity(conn, &course).await?;
                reactivate(conn, existing).await
            }
        },
        None => {
            ensure_capacity(conn, &course).await?;
            Ok(enrollments::insert_enrollment(conn, student_id, course_id, now).await?)
        }
    }
}

/// Deactivates an active enrollment. A second call for the same id fails with
/// `AlreadyInactive` instead of succeeding silently.
pub async fn unenroll_with(
    conn: &mut SqliteConnection,
    enrollment_id: &str,
    now: DateTime<Utc>,
) -> Result<Enrollment, AppError> {
    let deactivated = enrollments::deactivate_enrollment(conn, enrollment_id, now).await?;

    let enrollment = enrollments::find_enrollment_by_id(conn, enrollment_id)
        .await?
        .ok_or_else(|| AppError::not_found("enrollment", enrollment_id))?;

    if !deactivated {
        return Err(AppError::AlreadyInactive(enrollment_id.to_string()));
    }

    Ok(enrollment)
}

pub async fn remaining_capacity(
    conn: &mut SqliteConnection,
    course: &Course,
) -> Result<i64, AppError> {
    let active = enrollments::count_active_for_course(conn, &course.id).await?;
    Ok(i64::from(course.capacity) - active)
}

/// Writes the reactivation of `existing`. Fails if the stored row is no longer
/// inactive, so the returned enrollment always matches what was written.
async fn reactivate(conn: &mut SqliteConnection, existing: Enrollment) -> Result<Enrollment, AppError> {
    if !enrollments::reactivate_enrollment(conn, &existing.id).await? {
        return Err(AppError::AlreadyEnrolled {
            student_id: existing.student_id,
            course_id: existing.course_id,
        });
    }
    debug!("reactivated enrollment {}", existing.id);
    Ok(Enrollment {
        state: EnrollmentState::Active,
        ..existing
    })
}

async fn ensure_capacity(conn: &mut SqliteConnection, course: &Course) -> Result<(), AppError> {
    if remaining_capacity(conn, course).await? <= 0 {
        return Err(AppError::NoCapacity {
            course_id: course.id.clone(),
            capacity: course.capacity,
        });
    }
    Ok(())
}
