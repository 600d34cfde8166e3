use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProgramStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub code: String,
    pub description: String,
    pub duration_years: u8,
    pub status: ProgramStatus,
    pub created_at: DateTime<Utc>,
}

impl Program {
    pub fn is_active(&self) -> bool {
        self.status == ProgramStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewProgramRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom(function = "validate_program_code"))]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, max = 10))]
    pub duration_years: u8,
}

impl NewProgramRequest {
    pub fn normalized(mut self) -> Self {
        self.name = title_case(&self.name);
        self.code = self.code.trim().to_uppercase();
        self.description = self.description.trim().to_string();
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProgramRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_program_code"))]
    pub code: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub duration_years: Option<u8>,
}

impl UpdateProgramRequest {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| title_case(&n));
        self.code = self.code.map(|c| c.trim().to_uppercase());
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }
}

/// Active student count for one active program.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramStats {
    pub program_id: String,
    pub code: String,
    pub name: String,
    pub active_students: i64,
}

/// Program codes are two uppercase ASCII letters followed by four digits, e.g. `TP2024`.
pub fn validate_program_code(code: &str) -> Result<(), ValidationError> {
    let bytes = code.as_bytes();
    let well_formed = bytes.len() == 6
        && bytes[..2].iter().all(u8::is_ascii_uppercase)
        && bytes[2..].iter().all(u8::is_ascii_digit);

    if well_formed {
        Ok(())
    } else {
        let mut err = ValidationError::new("program_code");
        err.message = Some("code must look like AA1234 (2 uppercase letters + 4 digits)".into());
        Err(err)
    }
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
