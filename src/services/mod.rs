pub mod course_service;
pub mod enrollment_service;
pub mod program_service;
pub mod student_service;

pub use course_service::CourseService;
pub use enrollment_service::{EnrollmentService, enroll_with, remaining_capacity, unenroll_with};
pub use program_service::ProgramService;
pub use student_service::StudentService;
