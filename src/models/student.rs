use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Withdrawn,
}

/// A withdrawn student always carries the date it left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StudentState {
    Active,
    Withdrawn { on: NaiveDate },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub account_id: String,
    pub registration_number: String,
    pub program_id: Option<String>,
    pub admission_date: NaiveDate,
    pub phone: String,
    pub address: String,
    pub notes: String,
    #[serde(flatten)]
    pub state: StudentState,
}

impl Student {
    pub fn is_active(&self) -> bool {
        self.state == StudentState::Active
    }
}

impl<'r> FromRow<'r, SqliteRow> for Student {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: StudentStatus = row.try_get("status")?;
        let withdrawn_on: Option<NaiveDate> = row.try_get("withdrawn_on")?;
        let state = match (status, withdrawn_on) {
            (StudentStatus::Active, None) => StudentState::Active,
            (StudentStatus::Withdrawn, Some(on)) => StudentState::Withdrawn { on },
            _ => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "withdrawn_on".to_string(),
                    source: "student status and withdrawal date disagree".into(),
                });
            }
        };

        Ok(Self {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            registration_number: row.try_get("registration_number")?,
            program_id: row.try_get("program_id")?,
            admission_date: row.try_get("admission_date")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            notes: row.try_get("notes")?,
            state,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewStudentRequest {
    #[validate(length(min = 1, max = 150))]
    pub account_id: String,
    /// Generated as `LEG-YYYY-NNNN` when absent.
    #[validate(length(min = 1, max = 20))]
    pub registration_number: Option<String>,
    pub program_id: Option<String>,
    pub admission_date: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

impl NewStudentRequest {
    pub fn normalized(mut self) -> Self {
        self.account_id = self.account_id.trim().to_string();
        self.registration_number = self
            .registration_number
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty());
        self.phone = self.phone.trim().to_string();
        self.address = self.address.trim().to_string();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateStudentRequest {
    #[validate(length(min = 1, max = 20))]
    pub registration_number: Option<String>,
    pub program_id: Option<String>,
    pub admission_date: Option<NaiveDate>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl UpdateStudentRequest {
    pub fn normalized(mut self) -> Self {
        self.registration_number = self.registration_number.map(|r| r.trim().to_uppercase());
        self.phone = self.phone.map(|p| p.trim().to_string());
        self.address = self.address.map(|a| a.trim().to_string());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentFilter {
    pub program_id: Option<String>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    #[serde(default)]
    pub reason: Option<String>,
}
