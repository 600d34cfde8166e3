use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Inactive,
}

/// `absent -> Active <-> Inactive`. Rows are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EnrollmentState {
    Active,
    Inactive { deactivated_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub enrolled_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: EnrollmentState,
}

impl Enrollment {
    pub fn is_active(&self) -> bool {
        self.state == EnrollmentState::Active
    }

    pub fn deactivated_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            EnrollmentState::Active => None,
            EnrollmentState::Inactive { deactivated_at } => Some(deactivated_at),
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Enrollment {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: EnrollmentStatus = row.try_get("status")?;
        let deactivated_at: Option<DateTime<Utc>> = row.try_get("deactivated_at")?;
        let state = match (status, deactivated_at) {
            (EnrollmentStatus::Active, None) => EnrollmentState::Active,
            (EnrollmentStatus::Inactive, Some(deactivated_at)) => {
                EnrollmentState::Inactive { deactivated_at }
            }
            _ => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "deactivated_at".to_string(),
                    source: "enrollment status and deactivation time disagree".into(),
                });
            }
        };

        Ok(Self {
            id: row.try_get("id")?,
            student_id: row.try_get("student_id")?,
            course_id: row.try_get("course_id")?,
            enrolled_at: row.try_get("enrolled_at")?,
            state,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEnrollmentRequest {
    pub student_id: String,
    pub course_id: String,
}

/// One active student in a course.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RosterEntry {
    pub enrollment_id: String,
    pub student_id: String,
    pub registration_number: String,
    pub enrolled_at: DateTime<Utc>,
}

/// An active enrollment with the student and course it links, for the admin listing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentListing {
    pub enrollment_id: String,
    pub student_id: String,
    pub registration_number: String,
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub enrolled_today: i64,
}

impl EnrollmentStats {
    pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        (start, start + chrono::Duration::days(1))
    }
}
