use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

use crate::db::{courses, enrollments, programs};
use crate::error::AppError;
use crate::models::{
    Course, CourseAvailability, CourseFilter, CourseStatus, NewCourseRequest, UpdateCourseRequest,
};

pub struct CourseService {
    db: SqlitePool,
}

impl CourseService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, req: NewCourseRequest) -> Result<Course, AppError> {
        let req = req.normalized();
        req.validate()?;

        let mut conn = self.db.acquire().await?;
        if programs::find_program_by_id(&mut conn, &req.program_id).await?.is_none() {
            return Err(AppError::not_found("program", req.program_id));
        }
        if courses::code_taken(&mut conn, &req.code, None).await? {
            return Err(AppError::Conflict(format!("a course with code {} already exists", req.code)));
        }

        let course = courses::insert_course(&mut conn, req, Utc::now()).await?;
        info!("created course {} with capacity {}", course.code, course.capacity);
        Ok(course)
    }

    /// Capacity changes run under the course lock so they cannot interleave
    /// with an enrollment for the same course.
    pub async fn update(&self, id: &str, req: UpdateCourseRequest) -> Result<Course, AppError> {
        let req = req.normalized();
        req.validate()?;

        let mut tx = self.db.begin().await?;
        let mut current = courses::lock_course(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("course", id))?;

        if let Some(code) = req.code {
            if courses::code_taken(&mut tx, &code, Some(id)).await? {
                return Err(AppError::Conflict(format!("a course with code {} already exists", code)));
            }
            current.code = code;
        }
        if let Some(capacity) = req.capacity {
            let active = enrollments::count_active_for_course(&mut tx, id).await?;
            if i64::from(capacity) < active {
                return Err(AppError::Conflict(format!(
                    "capacity {} is below the {} active enrollments",
                    capacity, active
                )));
            }
            current.capacity = capacity;
        }
        if let Some(name) = req.name {
            current.name = name;
        }
        if let Some(year) = req.year {
            current.year = year;
        }
        if let Some(term) = req.term {
            current.term = term;
        }
        current.updated_at = Utc::now();

        courses::update_course(&mut tx, &current).await?;
        tx.commit().await?;
        Ok(current)
    }

    /// Soft delete, refused while students are still actively enrolled.
    pub async fn deactivate(&self, id: &str) -> Result<Course, AppError> {
        let mut tx = self.db.begin().await?;
        let mut course = courses::lock_course(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("course", id))?;

        let active = enrollments::count_active_for_course(&mut tx, id).await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "course {} still has {} active enrollments",
                course.code, active
            )));
        }

        course.status = CourseStatus::Inactive;
        course.updated_at = Utc::now();
        courses::update_course(&mut tx, &course).await?;
        tx.commit().await?;

        info!("deactivated course {}", course.code);
        Ok(course)
    }

    pub async fn get(&self, id: &str) -> Result<Course, AppError> {
        let mut conn = self.db.acquire().await?;
        courses::find_course_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("course", id))
    }

    pub async fn list(&self, filter: &CourseFilter) -> Result<Vec<Course>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(courses::fetch_courses(&mut conn, filter).await?)
    }

    pub async fn availability(&self, id: &str) -> Result<CourseAvailability, AppError> {
        let mut conn = self.db.acquire().await?;
        courses::fetch_course_availability(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("course", id))
    }

    pub async fn list_with_capacity(
        &self,
        filter: &CourseFilter,
    ) -> Result<Vec<CourseAvailability>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(courses::fetch_courses_with_capacity(&mut conn, filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;
    use crate::services::EnrollmentService;

    fn new_course(program_id: &str, code: &str, capacity: u32) -> NewCourseRequest {
        NewCourseRequest {
            name: format!(" Course {} ", code),
            code: code.to_string(),
            program_id: program_id.to_string(),
            capacity,
            year: 1,
            term: 2,
        }
    }

    #[tokio::test]
    async fn test_create_course() {
        let pool = test_support::setup_test_db().await;
        let program = test_support::program(&pool, "TP2024").await;
        let service = CourseService::new(pool);

        let course = service.create(new_course(&program.id, "prog1", 20)).await.expect("create");
        assert_eq!(course.code, "PROG1");
        assert_eq!(course.name, "Course prog1");

        let err = service
            .create(new_course(&program.id, "PROG1", 20))
            .await
            .expect_err("duplicate code");
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service
            .create(new_course("ghost", "PROG2", 20))
            .await
            .expect_err("unknown program");
        assert!(matches!(err, AppError::NotFound { entity: "program", .. }));

        let err = service
            .create(new_course(&program.id, "PROG3", 0))
            .await
            .expect_err("zero capacity");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_capacity_cannot_drop_below_active_count() {
        let pool = test_support::setup_test_db().await;
        let program = test_support::program(&pool, "TP2024").await;
        let a = test_support::student(&pool, Some(&program.id), "LEG-2024-0001").await;
        let b = test_support::student(&pool, Some(&program.id), "LEG-2024-0002").await;
        let course = test_support::course(&pool, &program.id, "PROG1", 3).await;

        let enrollment_service = EnrollmentService::new(pool.clone());
        enrollment_service.enroll(&a.id, &course.id).await.expect("enroll");
        enrollment_service.enroll(&b.id, &course.id).await.expect("enroll");

        let service = CourseService::new(pool);
        let err = service
            .update(
                &course.id,
                UpdateCourseRequest {
                    capacity: Some(1),
                    ..UpdateCourseRequest::default()
                },
            )
            .await
            .expect_err("below active count");
        assert!(matches!(err, AppError::Conflict(_)));

        let updated = service
            .update(
                &course.id,
                UpdateCourseRequest {
                    capacity: Some(2),
                    ..UpdateCourseRequest::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.capacity, 2);

        let availability = service.availability(&course.id).await.expect("availability");
        assert_eq!(availability.active_enrollments, 2);
        assert_eq!(availability.remaining_capacity, 0);
        assert!(service
            .list_with_capacity(&CourseFilter::default())
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn test_deactivate_requires_no_active_enrollments() {
        let pool = test_support::setup_test_db().await;
        let program = test_support::program(&pool, "TP2024").await;
        let student = test_support::student(&pool, Some(&program.id), "LEG-2024-0001").await;
        let course = test_support::course(&pool, &program.id, "PROG1", 3).await;

        let enrollment_service = EnrollmentService::new(pool.clone());
        let enrollment = enrollment_service.enroll(&student.id, &course.id).await.expect("enroll");

        let service = CourseService::new(pool);
        let err = service.deactivate(&course.id).await.expect_err("still enrolled");
        assert!(matches!(err, AppError::Conflict(_)));

        enrollment_service.unenroll(&enrollment.id).await.expect("unenroll");
        let course = service.deactivate(&course.id).await.expect("deactivate");
        assert!(!course.is_active());
        assert!(service.list(&CourseFilter::default()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_list_with_capacity_filters() {
        let pool = test_support::setup_test_db().await;
        let program = test_support::program(&pool, "TP2024").await;
        let service = CourseService::new(pool);

        service.create(new_course(&program.id, "A1", 5)).await.expect("create");
        let mut second_year = new_course(&program.id, "B1", 5);
        second_year.year = 2;
        service.create(second_year).await.expect("create");

        let filter = CourseFilter {
            year: Some(2),
            ..CourseFilter::default()
        };
        let open = service.list_with_capacity(&filter).await.expect("list");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].course.code, "B1");
        assert_eq!(open[0].remaining_capacity, 5);
    }
}
