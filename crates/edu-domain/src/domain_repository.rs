use crate::course::{Course, Enrollment, EnrollmentStatus, Lesson, NewCourse};
use crate::student::{FeeInvoice, NewFeeInvoice, NewStudent, Student};
use crate::DomainError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Persistence operations over the `lms_*` tables.
pub trait LmsRepository: Send + Sync {
    /// Creates a course. A duplicated slug yields `Conflict`.
    fn create_course(&self, course: NewCourse) -> Result<Course, DomainError>;

    fn get_course(&self, id: &Uuid) -> Result<Option<Course>, DomainError>;

    fn find_course_by_slug(&self, slug: &str) -> Result<Option<Course>, DomainError>;

    /// Lists courses ordered by slug.
    fn list_courses(&self, published_only: bool) -> Result<Vec<Course>, DomainError>;

    fn publish_course(&self, id: &Uuid) -> Result<Course, DomainError>;

    /// Appends a lesson at the next free position of the course.
    fn add_lesson(&self, course_id: &Uuid, title: &str, body: &str) -> Result<Lesson, DomainError>;

    /// Lessons of a course ordered by position.
    fn list_lessons(&self, course_id: &Uuid) -> Result<Vec<Lesson>, DomainError>;

    /// Enrolls a student. The course must exist; enrolling twice yields
    /// `Conflict`. The student is not checked, it lives in the erp domain.
    fn enroll(&self, course_id: &Uuid, student_id: &Uuid) -> Result<Enrollment, DomainError>;

    fn list_enrollments(&self, course_id: &Uuid) -> Result<Vec<Enrollment>, DomainError>;

    /// Moves an enrollment to `status` (complete, withdraw, reactivate).
    /// Unknown enrollments yield `NotFound`.
    fn set_enrollment_status(&self, enrollment_id: &Uuid, status: EnrollmentStatus)
                             -> Result<Enrollment, DomainError>;
}

/// Persistence operations over the `erp_*` tables.
pub trait ErpRepository: Send + Sync {
    /// Registers a student. Admission number and email are unique.
    fn register_student(&self, student: NewStudent) -> Result<Student, DomainError>;

    fn get_student(&self, id: &Uuid) -> Result<Option<Student>, DomainError>;

    /// Lists students ordered by admission number.
    fn list_students(&self) -> Result<Vec<Student>, DomainError>;

    /// Issues an invoice for an existing student.
    fn issue_invoice(&self, invoice: NewFeeInvoice) -> Result<FeeInvoice, DomainError>;

    /// Marks an invoice as paid. Paying twice yields `Conflict`.
    fn mark_invoice_paid(&self, invoice_id: &Uuid, paid_at: DateTime<Utc>) -> Result<FeeInvoice, DomainError>;

    /// Unpaid invoices of a student ordered by due date.
    fn outstanding_invoices(&self, student_id: &Uuid) -> Result<Vec<FeeInvoice>, DomainError>;
}

/// Reads that span both domains.
pub trait CampusDirectory: Send + Sync {
    /// Students enrolled in a course (withdrawn enrollments excluded),
    /// ordered by name.
    fn course_roster(&self, course_id: &Uuid) -> Result<Vec<Student>, DomainError>;
}

#[derive(Default)]
struct LmsTables {
    courses: HashMap<Uuid, Course>,
    lessons: HashMap<Uuid, Lesson>,
    enrollments: HashMap<Uuid, Enrollment>,
}

#[derive(Default)]
struct ErpTables {
    students: HashMap<Uuid, Student>,
    invoices: HashMap<Uuid, FeeInvoice>,
}

/// In-memory implementation for tests and development. Mirrors the
/// constraints the Postgres schema enforces.
#[derive(Clone, Default)]
pub struct InMemoryCampusRepository {
    lms: Arc<Mutex<LmsTables>>,
    erp: Arc<Mutex<ErpTables>>,
}

impl InMemoryCampusRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // Helper to map poisoned mutex errors into DomainError
    fn lock_map<'a, T>(&'a self, m: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, DomainError> {
        m.lock()
         .map_err(|e| DomainError::ExternalError(format!("Mutex '{}' poisoned: {}", name, e)))
    }
}

impl LmsRepository for InMemoryCampusRepository {
    fn create_course(&self, course: NewCourse) -> Result<Course, DomainError> {
        let mut lms = self.lock_map(&self.lms, "lms")?;
        if lms.courses.values().any(|c| c.slug == course.slug()) {
            return Err(DomainError::Conflict(format!("course slug '{}' already exists", course.slug())));
        }
        let course = course.into_course(Utc::now());
        lms.courses.insert(course.id, course.clone());
        Ok(course)
    }

    fn get_course(&self, id: &Uuid) -> Result<Option<Course>, DomainError> {
        let lms = self.lock_map(&self.lms, "lms")?;
        Ok(lms.courses.get(id).cloned())
    }

    fn find_course_by_slug(&self, slug: &str) -> Result<Option<Course>, DomainError> {
        let lms = self.lock_map(&self.lms, "lms")?;
        Ok(lms.courses.values().find(|c| c.slug == slug).cloned())
    }

    fn list_courses(&self, published_only: bool) -> Result<Vec<Course>, DomainError> {
        let lms = self.lock_map(&self.lms, "lms")?;
        let mut out: Vec<Course> =
            lms.courses.values().filter(|c| !published_only || c.published).cloned().collect();
        out.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(out)
    }

    fn publish_course(&self, id: &Uuid) -> Result<Course, DomainError> {
        let mut lms = self.lock_map(&self.lms, "lms")?;
        let course = lms.courses
                        .get_mut(id)
                        .ok_or_else(|| DomainError::NotFound(format!("course {}", id)))?;
        course.published = true;
        Ok(course.clone())
    }

    fn add_lesson(&self, course_id: &Uuid, title: &str, body: &str) -> Result<Lesson, DomainError> {
        if title.trim().is_empty() {
            return Err(DomainError::ValidationError("lesson title cannot be empty".to_string()));
        }
        let mut lms = self.lock_map(&self.lms, "lms")?;
        if !lms.courses.contains_key(course_id) {
            return Err(DomainError::NotFound(format!("course {}", course_id)));
        }
        let position = lms.lessons
                          .values()
                          .filter(|l| &l.course_id == course_id)
                          .map(|l| l.position)
                          .max()
                          .unwrap_or(0)
                       + 1;
        let lesson = Lesson { id: Uuid::new_v4(),
                              course_id: *course_id,
                              position,
                              title: title.trim().to_string(),
                              body: body.to_string(),
                              created_at: Utc::now() };
        lms.lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    fn list_lessons(&self, course_id: &Uuid) -> Result<Vec<Lesson>, DomainError> {
        let lms = self.lock_map(&self.lms, "lms")?;
        let mut out: Vec<Lesson> = lms.lessons.values().filter(|l| &l.course_id == course_id).cloned().collect();
        out.sort_by_key(|l| l.position);
        Ok(out)
    }

    fn enroll(&self, course_id: &Uuid, student_id: &Uuid) -> Result<Enrollment, DomainError> {
        let mut lms = self.lock_map(&self.lms, "lms")?;
        if !lms.courses.contains_key(course_id) {
            return Err(DomainError::NotFound(format!("course {}", course_id)));
        }
        if lms.enrollments
              .values()
              .any(|e| &e.course_id == course_id && &e.student_id == student_id)
        {
            return Err(DomainError::Conflict(format!("student {} already enrolled in course {}",
                                                     student_id, course_id)));
        }
        let enrollment = Enrollment { id: Uuid::new_v4(),
                                      course_id: *course_id,
                                      student_id: *student_id,
                                      status: EnrollmentStatus::Active,
                                      enrolled_at: Utc::now() };
        lms.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    fn list_enrollments(&self, course_id: &Uuid) -> Result<Vec<Enrollment>, DomainError> {
        let lms = self.lock_map(&self.lms, "lms")?;
        let mut out: Vec<Enrollment> =
            lms.enrollments.values().filter(|e| &e.course_id == course_id).cloned().collect();
        out.sort_by_key(|e| e.enrolled_at);
        Ok(out)
    }

    fn set_enrollment_status(&self, enrollment_id: &Uuid, status: EnrollmentStatus)
                             -> Result<Enrollment, DomainError> {
        let mut lms = self.lock_map(&self.lms, "lms")?;
        let enrollment = lms.enrollments
                            .get_mut(enrollment_id)
                            .ok_or_else(|| DomainError::NotFound(format!("enrollment {}", enrollment_id)))?;
        enrollment.status = status;
        Ok(enrollment.clone())
    }
}

impl ErpRepository for InMemoryCampusRepository {
    fn register_student(&self, student: NewStudent) -> Result<Student, DomainError> {
        let mut erp = self.lock_map(&self.erp, "erp")?;
        if erp.students.values().any(|s| s.admission_no == student.admission_no()) {
            return Err(DomainError::Conflict(format!("admission number '{}' already registered",
                                                     student.admission_no())));
        }
        if erp.students.values().any(|s| s.email == student.email()) {
            return Err(DomainError::Conflict(format!("email '{}' already registered", student.email())));
        }
        let student = student.into_student(Utc::now());
        erp.students.insert(student.id, student.clone());
        Ok(student)
    }

    fn get_student(&self, id: &Uuid) -> Result<Option<Student>, DomainError> {
        let erp = self.lock_map(&self.erp, "erp")?;
        Ok(erp.students.get(id).cloned())
    }

    fn list_students(&self) -> Result<Vec<Student>, DomainError> {
        let erp = self.lock_map(&self.erp, "erp")?;
        let mut out: Vec<Student> = erp.students.values().cloned().collect();
        out.sort_by(|a, b| a.admission_no.cmp(&b.admission_no));
        Ok(out)
    }

    fn issue_invoice(&self, invoice: NewFeeInvoice) -> Result<FeeInvoice, DomainError> {
        let mut erp = self.lock_map(&self.erp, "erp")?;
        if !erp.students.contains_key(&invoice.student_id()) {
            return Err(DomainError::NotFound(format!("student {}", invoice.student_id())));
        }
        let invoice = invoice.into_invoice(Utc::now());
        erp.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    fn mark_invoice_paid(&self, invoice_id: &Uuid, paid_at: DateTime<Utc>) -> Result<FeeInvoice, DomainError> {
        let mut erp = self.lock_map(&self.erp, "erp")?;
        let invoice = erp.invoices
                         .get_mut(invoice_id)
                         .ok_or_else(|| DomainError::NotFound(format!("invoice {}", invoice_id)))?;
        if invoice.is_paid() {
            return Err(DomainError::Conflict(format!("invoice {} is already paid", invoice_id)));
        }
        invoice.paid_at = Some(paid_at);
        Ok(invoice.clone())
    }

    fn outstanding_invoices(&self, student_id: &Uuid) -> Result<Vec<FeeInvoice>, DomainError> {
        let erp = self.lock_map(&self.erp, "erp")?;
        let mut out: Vec<FeeInvoice> = erp.invoices
                                          .values()
                                          .filter(|i| &i.student_id == student_id && !i.is_paid())
                                          .cloned()
                                          .collect();
        out.sort_by_key(|i| i.due_on);
        Ok(out)
    }
}

impl CampusDirectory for InMemoryCampusRepository {
    fn course_roster(&self, course_id: &Uuid) -> Result<Vec<Student>, DomainError> {
        let student_ids: Vec<Uuid> = {
            let lms = self.lock_map(&self.lms, "lms")?;
            lms.enrollments
               .values()
               .filter(|e| &e.course_id == course_id && e.status != EnrollmentStatus::Withdrawn)
               .map(|e| e.student_id)
               .collect()
        };
        let erp = self.lock_map(&self.erp, "erp")?;
        let mut out: Vec<Student> = student_ids.iter().filter_map(|id| erp.students.get(id).cloned()).collect();
        out.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(out)
    }
}
