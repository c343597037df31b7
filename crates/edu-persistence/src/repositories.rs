use crate::client::{Database, DbConn};
use crate::db_error::{database_error, DbErrorKind};
use crate::schema::{erp_fee_invoices, erp_students, lms_courses, lms_enrollments, lms_lessons};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use edu_domain::{CampusDirectory, Course, DomainError, Enrollment, EnrollmentStatus, ErpRepository, FeeInvoice, Lesson,
                 LmsRepository, NewCourse, NewFeeInvoice, NewStudent, Student};
use uuid::Uuid;

// Diesel row structs, field order follows the table! definitions
#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = lms_courses, check_for_backend(diesel::pg::Pg))]
struct CourseRow {
  id: Uuid,
  slug: String,
  title: String,
  description: Option<String>,
  published: bool,
  created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = lms_lessons, check_for_backend(diesel::pg::Pg))]
struct LessonRow {
  id: Uuid,
  course_id: Uuid,
  position: i32,
  title: String,
  body: String,
  created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = lms_enrollments, check_for_backend(diesel::pg::Pg))]
struct EnrollmentRow {
  id: Uuid,
  course_id: Uuid,
  student_id: Uuid,
  status: String,
  enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = erp_students, check_for_backend(diesel::pg::Pg))]
struct StudentRow {
  id: Uuid,
  admission_no: String,
  full_name: String,
  email: String,
  created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = erp_fee_invoices, check_for_backend(diesel::pg::Pg))]
struct FeeInvoiceRow {
  id: Uuid,
  student_id: Uuid,
  amount_cents: i64,
  currency: String,
  due_on: NaiveDate,
  paid_at: Option<DateTime<Utc>>,
  created_at: DateTime<Utc>,
}

impl From<CourseRow> for Course {
  fn from(r: CourseRow) -> Self {
    Course { id: r.id,
             slug: r.slug,
             title: r.title,
             description: r.description,
             published: r.published,
             created_at: r.created_at }
  }
}

impl From<&Course> for CourseRow {
  fn from(c: &Course) -> Self {
    CourseRow { id: c.id,
                slug: c.slug.clone(),
                title: c.title.clone(),
                description: c.description.clone(),
                published: c.published,
                created_at: c.created_at }
  }
}

impl From<LessonRow> for Lesson {
  fn from(r: LessonRow) -> Self {
    Lesson { id: r.id,
             course_id: r.course_id,
             position: r.position,
             title: r.title,
             body: r.body,
             created_at: r.created_at }
  }
}

impl TryFrom<EnrollmentRow> for Enrollment {
  type Error = DomainError;

  fn try_from(r: EnrollmentRow) -> Result<Self, DomainError> {
    Ok(Enrollment { id: r.id,
                    course_id: r.course_id,
                    student_id: r.student_id,
                    status: EnrollmentStatus::parse(&r.status)?,
                    enrolled_at: r.enrolled_at })
  }
}

impl From<StudentRow> for Student {
  fn from(r: StudentRow) -> Self {
    Student { id: r.id,
              admission_no: r.admission_no,
              full_name: r.full_name,
              email: r.email,
              created_at: r.created_at }
  }
}

impl From<&Student> for StudentRow {
  fn from(s: &Student) -> Self {
    StudentRow { id: s.id,
                 admission_no: s.admission_no.clone(),
                 full_name: s.full_name.clone(),
                 email: s.email.clone(),
                 created_at: s.created_at }
  }
}

impl From<FeeInvoiceRow> for FeeInvoice {
  fn from(r: FeeInvoiceRow) -> Self {
    FeeInvoice { id: r.id,
                 student_id: r.student_id,
                 amount_cents: r.amount_cents,
                 currency: r.currency,
                 due_on: r.due_on,
                 paid_at: r.paid_at,
                 created_at: r.created_at }
  }
}

impl From<&FeeInvoice> for FeeInvoiceRow {
  fn from(i: &FeeInvoice) -> Self {
    FeeInvoiceRow { id: i.id,
                    student_id: i.student_id,
                    amount_cents: i.amount_cents,
                    currency: i.currency.clone(),
                    due_on: i.due_on,
                    paid_at: i.paid_at,
                    created_at: i.created_at }
  }
}

/// Translates a query error into the domain vocabulary: unique violations
/// become `Conflict`, foreign-key violations `NotFound`.
fn map_db_err(e: DieselError) -> DomainError {
  match database_error(&e) {
    Some(d) if d.kind == DbErrorKind::UniqueViolation => {
      DomainError::Conflict(format!("{} already exists", d.constraint.as_deref().unwrap_or("row")))
    }
    Some(d) if d.kind == DbErrorKind::ForeignKeyViolation => {
      DomainError::NotFound(format!("referenced row missing ({})", d.constraint.as_deref().unwrap_or("foreign key")))
    }
    _ => DomainError::ExternalError(format!("db: {}", e)),
  }
}

fn conn(db: &Database) -> Result<DbConn, DomainError> {
  db.conn().map_err(DomainError::from)
}

/// Diesel implementation of [`LmsRepository`].
#[derive(Clone)]
pub struct DieselLmsRepository {
  db: Database,
}

impl DieselLmsRepository {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl LmsRepository for DieselLmsRepository {
  fn create_course(&self, course: NewCourse) -> Result<Course, DomainError> {
    let mut conn = conn(&self.db)?;
    let course = course.into_course(Utc::now());
    diesel::insert_into(lms_courses::table).values(CourseRow::from(&course))
                                           .execute(&mut conn)
                                           .map_err(map_db_err)?;
    Ok(course)
  }

  fn get_course(&self, id: &Uuid) -> Result<Option<Course>, DomainError> {
    let mut conn = conn(&self.db)?;
    let row = lms_courses::table.find(id)
                                .first::<CourseRow>(&mut conn)
                                .optional()
                                .map_err(map_db_err)?;
    Ok(row.map(Course::from))
  }

  fn find_course_by_slug(&self, slug: &str) -> Result<Option<Course>, DomainError> {
    let mut conn = conn(&self.db)?;
    let row = lms_courses::table.filter(lms_courses::slug.eq(slug))
                                .first::<CourseRow>(&mut conn)
                                .optional()
                                .map_err(map_db_err)?;
    Ok(row.map(Course::from))
  }

  fn list_courses(&self, published_only: bool) -> Result<Vec<Course>, DomainError> {
    let mut conn = conn(&self.db)?;
    let mut query = lms_courses::table.order(lms_courses::slug.asc()).into_boxed();
    if published_only {
      query = query.filter(lms_courses::published.eq(true));
    }
    let rows = query.load::<CourseRow>(&mut conn).map_err(map_db_err)?;
    Ok(rows.into_iter().map(Course::from).collect())
  }

  fn publish_course(&self, id: &Uuid) -> Result<Course, DomainError> {
    let mut conn = conn(&self.db)?;
    let row = diesel::update(lms_courses::table.find(id)).set(lms_courses::published.eq(true))
                                                         .get_result::<CourseRow>(&mut conn)
                                                         .optional()
                                                         .map_err(map_db_err)?;
    row.map(Course::from).ok_or_else(|| DomainError::NotFound(format!("course {}", id)))
  }

  fn add_lesson(&self, course_id: &Uuid, title: &str, body: &str) -> Result<Lesson, DomainError> {
    if title.trim().is_empty() {
      return Err(DomainError::ValidationError("lesson title cannot be empty".to_string()));
    }
    let mut conn = conn(&self.db)?;
    // Position and insert share one transaction; a concurrent writer hits
    // lms_lessons_course_position_key and surfaces as Conflict.
    let row = conn.transaction::<_, DieselError, _>(|conn| {
                    let last = lms_lessons::table.filter(lms_lessons::course_id.eq(course_id))
                                                 .select(diesel::dsl::max(lms_lessons::position))
                                                 .first::<Option<i32>>(conn)?;
                    let row = LessonRow { id: Uuid::new_v4(),
                                          course_id: *course_id,
                                          position: last.unwrap_or(0) + 1,
                                          title: title.trim().to_string(),
                                          body: body.to_string(),
                                          created_at: Utc::now() };
                    diesel::insert_into(lms_lessons::table).values(&row).execute(conn)?;
                    Ok(row)
                  })
                  .map_err(|e| match map_db_err(e) {
                    DomainError::NotFound(_) => DomainError::NotFound(format!("course {}", course_id)),
                    other => other,
                  })?;
    Ok(Lesson::from(row))
  }

  fn list_lessons(&self, course_id: &Uuid) -> Result<Vec<Lesson>, DomainError> {
    let mut conn = conn(&self.db)?;
    let rows = lms_lessons::table.filter(lms_lessons::course_id.eq(course_id))
                                 .order(lms_lessons::position.asc())
                                 .load::<LessonRow>(&mut conn)
                                 .map_err(map_db_err)?;
    Ok(rows.into_iter().map(Lesson::from).collect())
  }

  fn enroll(&self, course_id: &Uuid, student_id: &Uuid) -> Result<Enrollment, DomainError> {
    let mut conn = conn(&self.db)?;
    let row = EnrollmentRow { id: Uuid::new_v4(),
                              course_id: *course_id,
                              student_id: *student_id,
                              status: EnrollmentStatus::Active.as_str().to_string(),
                              enrolled_at: Utc::now() };
    diesel::insert_into(lms_enrollments::table).values(&row)
                                               .execute(&mut conn)
                                               .map_err(|e| match map_db_err(e) {
                                                 DomainError::NotFound(_) => {
                                                   DomainError::NotFound(format!("course {}", course_id))
                                                 }
                                                 other => other,
                                               })?;
    Enrollment::try_from(row)
  }

  fn list_enrollments(&self, course_id: &Uuid) -> Result<Vec<Enrollment>, DomainError> {
    let mut conn = conn(&self.db)?;
    let rows = lms_enrollments::table.filter(lms_enrollments::course_id.eq(course_id))
                                     .order(lms_enrollments::enrolled_at.asc())
                                     .load::<EnrollmentRow>(&mut conn)
                                     .map_err(map_db_err)?;
    rows.into_iter().map(Enrollment::try_from).collect()
  }

  fn set_enrollment_status(&self, enrollment_id: &Uuid, status: EnrollmentStatus) -> Result<Enrollment, DomainError> {
    let mut conn = conn(&self.db)?;
    let row = diesel::update(lms_enrollments::table.find(enrollment_id))
      .set(lms_enrollments::status.eq(status.as_str()))
      .get_result::<EnrollmentRow>(&mut conn)
      .optional()
      .map_err(map_db_err)?;
    row.ok_or_else(|| DomainError::NotFound(format!("enrollment {}", enrollment_id)))
       .and_then(Enrollment::try_from)
  }
}

/// Diesel implementation of [`ErpRepository`].
#[derive(Clone)]
pub struct DieselErpRepository {
  db: Database,
}

impl DieselErpRepository {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl ErpRepository for DieselErpRepository {
  fn register_student(&self, student: NewStudent) -> Result<Student, DomainError> {
    let mut conn = conn(&self.db)?;
    let student = student.into_student(Utc::now());
    diesel::insert_into(erp_students::table).values(StudentRow::from(&student))
                                            .execute(&mut conn)
                                            .map_err(map_db_err)?;
    Ok(student)
  }

  fn get_student(&self, id: &Uuid) -> Result<Option<Student>, DomainError> {
    let mut conn = conn(&self.db)?;
    let row = erp_students::table.find(id)
                                 .first::<StudentRow>(&mut conn)
                                 .optional()
                                 .map_err(map_db_err)?;
    Ok(row.map(Student::from))
  }

  fn list_students(&self) -> Result<Vec<Student>, DomainError> {
    let mut conn = conn(&self.db)?;
    let rows = erp_students::table.order(erp_students::admission_no.asc())
                                  .load::<StudentRow>(&mut conn)
                                  .map_err(map_db_err)?;
    Ok(rows.into_iter().map(Student::from).collect())
  }

  fn issue_invoice(&self, invoice: NewFeeInvoice) -> Result<FeeInvoice, DomainError> {
    let mut conn = conn(&self.db)?;
    let student_id = invoice.student_id();
    let invoice = invoice.into_invoice(Utc::now());
    diesel::insert_into(erp_fee_invoices::table).values(FeeInvoiceRow::from(&invoice))
                                                .execute(&mut conn)
                                                .map_err(|e| match map_db_err(e) {
                                                  DomainError::NotFound(_) => {
                                                    DomainError::NotFound(format!("student {}", student_id))
                                                  }
                                                  other => other,
                                                })?;
    Ok(invoice)
  }

  fn mark_invoice_paid(&self, invoice_id: &Uuid, paid_at: DateTime<Utc>) -> Result<FeeInvoice, DomainError> {
    let mut conn = conn(&self.db)?;
    let updated = diesel::update(erp_fee_invoices::table.find(invoice_id).filter(erp_fee_invoices::paid_at.is_null()))
      .set(erp_fee_invoices::paid_at.eq(Some(paid_at)))
      .get_result::<FeeInvoiceRow>(&mut conn)
      .optional()
      .map_err(map_db_err)?;
    if let Some(row) = updated {
      return Ok(FeeInvoice::from(row));
    }
    let exists = erp_fee_invoices::table.find(invoice_id)
                                        .select(erp_fee_invoices::id)
                                        .first::<Uuid>(&mut conn)
                                        .optional()
                                        .map_err(map_db_err)?;
    match exists {
      Some(_) => Err(DomainError::Conflict(format!("invoice {} is already paid", invoice_id))),
      None => Err(DomainError::NotFound(format!("invoice {}", invoice_id))),
    }
  }

  fn outstanding_invoices(&self, student_id: &Uuid) -> Result<Vec<FeeInvoice>, DomainError> {
    let mut conn = conn(&self.db)?;
    let rows = erp_fee_invoices::table.filter(erp_fee_invoices::student_id.eq(student_id))
                                      .filter(erp_fee_invoices::paid_at.is_null())
                                      .order(erp_fee_invoices::due_on.asc())
                                      .load::<FeeInvoiceRow>(&mut conn)
                                      .map_err(map_db_err)?;
    Ok(rows.into_iter().map(FeeInvoice::from).collect())
  }
}

/// Cross-domain reads over the merged schema.
#[derive(Clone)]
pub struct DieselCampusDirectory {
  db: Database,
}

impl DieselCampusDirectory {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl CampusDirectory for DieselCampusDirectory {
  fn course_roster(&self, course_id: &Uuid) -> Result<Vec<Student>, DomainError> {
    let mut conn = conn(&self.db)?;
    let rows = lms_enrollments::table.inner_join(erp_students::table.on(erp_students::id.eq(lms_enrollments::student_id)))
                                     .filter(lms_enrollments::course_id.eq(course_id))
                                     .filter(lms_enrollments::status.ne(EnrollmentStatus::Withdrawn.as_str()))
                                     .order(erp_students::full_name.asc())
                                     .select(StudentRow::as_select())
                                     .load::<StudentRow>(&mut conn)
                                     .map_err(map_db_err)?;
    Ok(rows.into_iter().map(Student::from).collect())
  }
}
