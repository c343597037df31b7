use chrono::{NaiveDate, Utc};
use edu_domain::{CampusDirectory, DomainError, DomainStubs, EnrollmentStatus, ErpRepository, InMemoryCampusRepository,
                 LmsRepository, NewCourse, NewFeeInvoice, NewStudent};
use uuid::Uuid;

#[test]
fn course_slug_is_unique() {
  let repo = InMemoryCampusRepository::new();
  repo.create_course(NewCourse::new("algebra-101", "Algebra", None).unwrap()).expect("first create");
  match repo.create_course(NewCourse::new("algebra-101", "Algebra again", None).unwrap()) {
    Err(DomainError::Conflict(_)) => {}
    other => panic!("expected conflict for duplicated slug, got: {:?}", other),
  }
}

#[test]
fn lessons_take_next_position() {
  let repo = InMemoryCampusRepository::new();
  let course = repo.create_course(NewCourse::new("physics", "Physics", None).unwrap()).unwrap();
  let l1 = repo.add_lesson(&course.id, "Motion", "").unwrap();
  let l2 = repo.add_lesson(&course.id, "Energy", "").unwrap();
  assert_eq!((l1.position, l2.position), (1, 2));
  let titles: Vec<String> = repo.list_lessons(&course.id).unwrap().into_iter().map(|l| l.title).collect();
  assert_eq!(titles, vec!["Motion", "Energy"]);
  assert!(matches!(repo.add_lesson(&Uuid::new_v4(), "Orphan", ""), Err(DomainError::NotFound(_))));
}

#[test]
fn enrolling_twice_conflicts() {
  let repo = InMemoryCampusRepository::new();
  let course = repo.create_course(NewCourse::new("biology", "Biology", None).unwrap()).unwrap();
  let student = Uuid::new_v4();
  repo.enroll(&course.id, &student).expect("first enroll");
  assert!(matches!(repo.enroll(&course.id, &student), Err(DomainError::Conflict(_))));
  assert!(matches!(repo.enroll(&Uuid::new_v4(), &student), Err(DomainError::NotFound(_))));
  assert_eq!(repo.list_enrollments(&course.id).unwrap().len(), 1);
}

#[test]
fn published_filter() {
  let repo = InMemoryCampusRepository::new();
  let a = repo.create_course(NewCourse::new("a-course", "A", None).unwrap()).unwrap();
  repo.create_course(NewCourse::new("b-course", "B", None).unwrap()).unwrap();
  repo.publish_course(&a.id).unwrap();
  assert_eq!(repo.list_courses(false).unwrap().len(), 2);
  let published = repo.list_courses(true).unwrap();
  assert_eq!(published.len(), 1);
  assert_eq!(published[0].slug, "a-course");
}

#[test]
fn student_uniqueness_and_invoices() {
  let repo = InMemoryCampusRepository::new();
  let s = repo.register_student(NewStudent::new("ADM-9", "Grace Hopper", "grace@example.edu").unwrap()).unwrap();
  assert!(matches!(repo.register_student(NewStudent::new("adm-9", "Other", "other@example.edu").unwrap()),
                   Err(DomainError::Conflict(_))));
  assert!(matches!(repo.register_student(NewStudent::new("ADM-10", "Other", "GRACE@example.edu").unwrap()),
                   Err(DomainError::Conflict(_))));

  let due_late = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
  let due_early = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
  let late = repo.issue_invoice(NewFeeInvoice::new(s.id, 50_000, "USD", due_late).unwrap()).unwrap();
  let early = repo.issue_invoice(NewFeeInvoice::new(s.id, 25_000, "USD", due_early).unwrap()).unwrap();
  let outstanding = repo.outstanding_invoices(&s.id).unwrap();
  assert_eq!(outstanding.iter().map(|i| i.id).collect::<Vec<_>>(), vec![early.id, late.id]);

  repo.mark_invoice_paid(&early.id, Utc::now()).unwrap();
  assert!(matches!(repo.mark_invoice_paid(&early.id, Utc::now()), Err(DomainError::Conflict(_))));
  assert_eq!(repo.outstanding_invoices(&s.id).unwrap().len(), 1);

  let unknown = NewFeeInvoice::new(Uuid::new_v4(), 100, "USD", due_early).unwrap();
  assert!(matches!(repo.issue_invoice(unknown), Err(DomainError::NotFound(_))));
}

#[test]
fn roster_reads_across_domains() {
  let repo = DomainStubs::sample_repo().expect("sample repo");
  let course = repo.find_course_by_slug("intro-to-programming").unwrap().expect("course");
  let roster = repo.course_roster(&course.id).unwrap();
  let names: Vec<&str> = roster.iter().map(|s| s.full_name.as_str()).collect();
  assert_eq!(names, vec!["Ada Lovelace", "Alan Turing"]);
}

#[test]
fn withdrawn_students_leave_the_roster() {
  let repo = DomainStubs::sample_repo().expect("sample repo");
  let course = repo.find_course_by_slug("intro-to-programming").unwrap().expect("course");
  let enrollments = repo.list_enrollments(&course.id).unwrap();
  let ada = repo.list_students().unwrap().into_iter().find(|s| s.full_name == "Ada Lovelace").expect("ada");
  let ada_enrollment = enrollments.iter().find(|e| e.student_id == ada.id).expect("ada enrolled");

  let updated = repo.set_enrollment_status(&ada_enrollment.id, EnrollmentStatus::Withdrawn).unwrap();
  assert_eq!(updated.status, EnrollmentStatus::Withdrawn);
  let names: Vec<String> = repo.course_roster(&course.id).unwrap().into_iter().map(|s| s.full_name).collect();
  assert_eq!(names, vec!["Alan Turing"]);

  // Completed students stay on the roster.
  repo.set_enrollment_status(&ada_enrollment.id, EnrollmentStatus::Completed).unwrap();
  assert_eq!(repo.course_roster(&course.id).unwrap().len(), 2);

  assert!(matches!(repo.set_enrollment_status(&Uuid::new_v4(), EnrollmentStatus::Active),
                   Err(DomainError::NotFound(_))));
}
