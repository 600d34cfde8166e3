pub mod course;
pub mod enrollment;
pub mod program;
pub mod student;

pub use course::{Course, CourseAvailability, CourseFilter, CourseStatus, NewCourseRequest, UpdateCourseRequest};
pub use enrollment::{Enrollment, EnrollmentListing, EnrollmentState, EnrollmentStats, EnrollmentStatus, NewEnrollmentRequest, RosterEntry};
pub use program::{NewProgramRequest, Program, ProgramStats, ProgramStatus, UpdateProgramRequest};
pub use student::{
    NewStudentRequest, StatusChangeRequest, Student, StudentFilter, StudentState, StudentStatus,
    UpdateStudentRequest,
};
