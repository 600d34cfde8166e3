use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

use crate::db::{like_pattern, programs};
use crate::error::AppError;
use crate::models::{NewProgramRequest, Program, ProgramStats, ProgramStatus, UpdateProgramRequest};

pub struct ProgramService {
    db: SqlitePool,
}

impl ProgramService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, req: NewProgramRequest) -> Result<Program, AppError> {
        let req = req.normalized();
        req.validate()?;

        let mut conn = self.db.acquire().await?;
        if programs::name_taken(&mut conn, &req.name, None).await? {
            return Err(AppError::Conflict(format!("a program named {:?} already exists", req.name)));
        }
        if programs::code_taken(&mut conn, &req.code, None).await? {
            return Err(AppError::Conflict(format!("a program with code {} already exists", req.code)));
        }

        let program = programs::insert_program(&mut conn, req, Utc::now()).await?;
        info!("created program {} ({})", program.code, program.id);
        Ok(program)
    }

    pub async fn update(&self, id: &str, req: UpdateProgramRequest) -> Result<Program, AppError> {
        let req = req.normalized();
        req.validate()?;

        let mut conn = self.db.acquire().await?;
        let mut current = programs::find_program_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("program", id))?;

        if let Some(name) = req.name {
            if programs::name_taken(&mut conn, &name, Some(id)).await? {
                return Err(AppError::Conflict(format!("a program named {:?} already exists", name)));
            }
            current.name = name;
        }
        if let Some(code) = req.code {
            if programs::code_taken(&mut conn, &code, Some(id)).await? {
                return Err(AppError::Conflict(format!("a program with code {} already exists", code)));
            }
            current.code = code;
        }
        if let Some(description) = req.description {
            current.description = description;
        }
        if let Some(duration_years) = req.duration_years {
            current.duration_years = duration_years;
        }

        programs::update_program(&mut conn, &current).await?;
        Ok(current)
    }

    /// Soft delete. Programs stay referenced by students and courses.
    pub async fn deactivate(&self, id: &str) -> Result<Program, AppError> {
        let program = self.set_status(id, ProgramStatus::Inactive).await?;
        info!("deactivated program {}", program.code);
        Ok(program)
    }

    pub async fn activate(&self, id: &str) -> Result<Program, AppError> {
        self.set_status(id, ProgramStatus::Active).await
    }

    async fn set_status(&self, id: &str, status: ProgramStatus) -> Result<Program, AppError> {
        let mut conn = self.db.acquire().await?;
        if !programs::set_program_status(&mut conn, id, status).await? {
            return Err(AppError::not_found("program", id));
        }
        programs::find_program_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("program", id))
    }

    pub async fn get(&self, id: &str) -> Result<Program, AppError> {
        let mut conn = self.db.acquire().await?;
        programs::find_program_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("program", id))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Program>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(programs::find_program_by_code(&mut conn, &code.trim().to_uppercase()).await?)
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Program>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(programs::fetch_programs(&mut conn, include_inactive).await?)
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Program>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(programs::search_programs(&mut conn, &like_pattern(term)).await?)
    }

    pub async fn stats(&self) -> Result<Vec<ProgramStats>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(programs::fetch_program_stats(&mut conn).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn new_program(name: &str, code: &str) -> NewProgramRequest {
        NewProgramRequest {
            name: name.to_string(),
            code: code.to_string(),
            description: String::new(),
            duration_years: 3,
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_and_rejects_duplicates() {
        let pool = test_support::setup_test_db().await;
        let service = ProgramService::new(pool);

        let program = service
            .create(new_program("técnico en programación", "tp2024"))
            .await
            .expect("create");
        assert_eq!(program.name, "Técnico En Programación");
        assert_eq!(program.code, "TP2024");

        let err = service
            .create(new_program("TÉCNICO EN PROGRAMACIÓN", "TP2025"))
            .await
            .expect_err("duplicate name");
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service
            .create(new_program("Otra Carrera", "TP2024"))
            .await
            .expect_err("duplicate code");
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_validates_code() {
        let pool = test_support::setup_test_db().await;
        let err = ProgramService::new(pool)
            .create(new_program("Diseño", "D-2020"))
            .await
            .expect_err("bad code");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_allows_own_name() {
        let pool = test_support::setup_test_db().await;
        let service = ProgramService::new(pool);
        let program = service.create(new_program("Diseño", "DG2020")).await.expect("create");

        let updated = service
            .update(
                &program.id,
                UpdateProgramRequest {
                    name: Some("diseño".to_string()),
                    duration_years: Some(4),
                    ..UpdateProgramRequest::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.name, "Diseño");
        assert_eq!(updated.duration_years, 4);
    }

    #[tokio::test]
    async fn test_deactivate_and_activate() {
        let pool = test_support::setup_test_db().await;
        let service = ProgramService::new(pool);
        let program = service.create(new_program("Diseño", "DG2020")).await.expect("create");

        let inactive = service.deactivate(&program.id).await.expect("deactivate");
        assert!(!inactive.is_active());
        assert!(service.list(false).await.expect("list").is_empty());
        assert_eq!(service.list(true).await.expect("list").len(), 1);

        let active = service.activate(&program.id).await.expect("activate");
        assert!(active.is_active());

        let err = service.deactivate("ghost").await.expect_err("unknown");
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_by_code_and_stats() {
        let pool = test_support::setup_test_db().await;
        let service = ProgramService::new(pool.clone());
        let program = service.create(new_program("Diseño", "DG2020")).await.expect("create");
        test_support::student(&pool, Some(&program.id), "LEG-2024-0001").await;
        test_support::student(&pool, Some(&program.id), "LEG-2024-0002").await;

        let found = service.find_by_code(" dg2020 ").await.expect("query");
        assert_eq!(found.map(|p| p.id), Some(program.id.clone()));

        let stats = service.stats().await.expect("stats");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].active_students, 2);
    }
}
