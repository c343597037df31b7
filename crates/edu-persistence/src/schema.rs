// Diesel schema for the shared Postgres database.
// Each domain lives in its own module and every table name carries the domain
// prefix; the parent module merges both into one namespace.
use diesel::allow_tables_to_appear_in_same_query;
use edu_domain::Domain;

pub mod lms {
  diesel::table! {
      lms_courses (id) {
          id -> Uuid,
          slug -> Text,
          title -> Text,
          description -> Nullable<Text>,
          published -> Bool,
          created_at -> Timestamptz,
      }
  }
  diesel::table! {
      lms_lessons (id) {
          id -> Uuid,
          course_id -> Uuid,
          position -> Int4,
          title -> Text,
          body -> Text,
          created_at -> Timestamptz,
      }
  }
  diesel::table! {
      lms_enrollments (id) {
          id -> Uuid,
          course_id -> Uuid,
          student_id -> Uuid,
          status -> Text,
          enrolled_at -> Timestamptz,
      }
  }
  diesel::joinable!(lms_lessons -> lms_courses (course_id));
  diesel::joinable!(lms_enrollments -> lms_courses (course_id));

  pub const TABLES: &[&str] = &["lms_courses", "lms_lessons", "lms_enrollments"];
}

pub mod erp {
  diesel::table! {
      erp_students (id) {
          id -> Uuid,
          admission_no -> Text,
          full_name -> Text,
          email -> Text,
          created_at -> Timestamptz,
      }
  }
  diesel::table! {
      erp_fee_invoices (id) {
          id -> Uuid,
          student_id -> Uuid,
          amount_cents -> Int8,
          currency -> Text,
          due_on -> Date,
          paid_at -> Nullable<Timestamptz>,
          created_at -> Timestamptz,
      }
  }
  diesel::joinable!(erp_fee_invoices -> erp_students (student_id));

  pub const TABLES: &[&str] = &["erp_students", "erp_fee_invoices"];
}

pub use erp::{erp_fee_invoices, erp_students};
pub use lms::{lms_courses, lms_enrollments, lms_lessons};

allow_tables_to_appear_in_same_query!(lms_courses, lms_lessons, lms_enrollments, erp_students, erp_fee_invoices);

/// Constraint names declared by the migrations, used to translate database
/// errors into domain conflicts.
pub mod constraints {
  pub const COURSE_SLUG: &str = "lms_courses_slug_key";
  pub const LESSON_POSITION: &str = "lms_lessons_course_position_key";
  pub const ENROLLMENT_UNIQUE: &str = "lms_enrollments_course_student_key";
  pub const ENROLLMENT_COURSE_FK: &str = "lms_enrollments_course_id_fkey";
  pub const LESSON_COURSE_FK: &str = "lms_lessons_course_id_fkey";
  pub const STUDENT_ADMISSION_NO: &str = "erp_students_admission_no_key";
  pub const STUDENT_EMAIL: &str = "erp_students_email_key";
  pub const INVOICE_STUDENT_FK: &str = "erp_fee_invoices_student_id_fkey";
}

/// Table names of one domain's table-definition set.
pub fn tables_for(domain: Domain) -> &'static [&'static str] {
  match domain {
    Domain::Lms => lms::TABLES,
    Domain::Erp => erp::TABLES,
  }
}

/// Every table of the merged schema.
pub fn all_tables() -> impl Iterator<Item = &'static str> {
  Domain::ALL.into_iter().flat_map(|d| tables_for(d).iter().copied())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_table_carries_its_domain_prefix() {
    for domain in Domain::ALL {
      for table in tables_for(domain) {
        assert!(domain.owns_table(table), "{} does not belong to {}", table, domain);
      }
    }
  }

  #[test]
  fn merged_schema_is_the_union() {
    let merged: Vec<&str> = all_tables().collect();
    assert_eq!(merged.len(), lms::TABLES.len() + erp::TABLES.len());
    assert!(merged.contains(&"lms_courses"));
    assert!(merged.contains(&"erp_students"));
  }
}
