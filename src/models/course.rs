use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CourseStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub code: String,
    pub program_id: String,
    pub capacity: u32,
    pub year: u8,
    pub term: u8,
    pub status: CourseStatus,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn is_active(&self) -> bool {
        self.status == CourseStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    pub program_id: String,
    #[validate(range(min = 1, max = 1000))]
    pub capacity: u32,
    #[validate(range(min = 1, max = 10))]
    pub year: u8,
    #[validate(range(min = 1, max = 2))]
    pub term: u8,
}

impl NewCourseRequest {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.code = self.code.trim().to_uppercase();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub code: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub capacity: Option<u32>,
    #[validate(range(min = 1, max = 10))]
    pub year: Option<u8>,
    #[validate(range(min = 1, max = 2))]
    pub term: Option<u8>,
}

impl UpdateCourseRequest {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.code = self.code.map(|c| c.trim().to_uppercase());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseFilter {
    pub program_id: Option<String>,
    pub year: Option<u8>,
    pub term: Option<u8>,
    pub search: Option<String>,
}

/// A course with its derived capacity figures. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseAvailability {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub course: Course,
    pub active_enrollments: i64,
    pub remaining_capacity: i64,
}
