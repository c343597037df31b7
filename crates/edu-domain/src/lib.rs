//! Domain model of the education platform: the two business partitions
//! (`lms`, `erp`) sharing one database, their entities and the repository
//! contracts the persistence layer implements.

mod course;
mod domain_repository;
mod domain_stubs;
mod errors;
mod partition;
mod student;

pub use course::{Course, Enrollment, EnrollmentStatus, Lesson, NewCourse};
pub use domain_repository::{CampusDirectory, ErpRepository, InMemoryCampusRepository, LmsRepository};
pub use domain_stubs::DomainStubs;
pub use errors::DomainError;
pub use partition::Domain;
pub use student::{FeeInvoice, NewFeeInvoice, NewStudent, Student};
