use crate::domain_repository::{ErpRepository, InMemoryCampusRepository, LmsRepository};
use crate::{DomainError, NewCourse, NewStudent};

pub struct DomainStubs;

impl DomainStubs {
    /// In-memory repository pre-populated with one published course, two
    /// lessons and two students enrolled in it.
    pub fn sample_repo() -> Result<InMemoryCampusRepository, DomainError> {
        let repo = InMemoryCampusRepository::new();

        let course = repo.create_course(NewCourse::new("intro-to-programming",
                                                       "Introduction to Programming",
                                                       Some("Variables, loops and functions"))?)?;
        repo.publish_course(&course.id)?;
        repo.add_lesson(&course.id, "Variables", "Values have names.")?;
        repo.add_lesson(&course.id, "Loops", "Repeat until done.")?;

        let ada = repo.register_student(NewStudent::new("ADM-001", "Ada Lovelace", "ada@example.edu")?)?;
        let alan = repo.register_student(NewStudent::new("ADM-002", "Alan Turing", "alan@example.edu")?)?;
        repo.enroll(&course.id, &ada.id)?;
        repo.enroll(&course.id, &alan.id)?;

        Ok(repo)
    }
}
