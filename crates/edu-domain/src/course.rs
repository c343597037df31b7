// course.rs
use crate::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A course as stored in `lms_courses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
  pub id: Uuid,
  pub slug: String,
  pub title: String,
  pub description: Option<String>,
  pub published: bool,
  pub created_at: DateTime<Utc>,
}

/// Validated input for creating a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
  slug: String,
  title: String,
  description: Option<String>,
}

impl NewCourse {
  pub fn new(slug: &str, title: &str, description: Option<&str>) -> Result<Self, DomainError> {
    let slug = slug.trim();
    if slug.is_empty() {
      return Err(DomainError::ValidationError("course slug cannot be empty".to_string()));
    }
    if !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
       || slug.starts_with('-')
       || slug.ends_with('-')
    {
      return Err(DomainError::ValidationError(format!("invalid course slug '{}'", slug)));
    }
    if title.trim().is_empty() {
      return Err(DomainError::ValidationError("course title cannot be empty".to_string()));
    }
    let description = description.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string);
    Ok(Self { slug: slug.to_string(), title: title.trim().to_string(), description })
  }

  pub fn slug(&self) -> &str {
    &self.slug
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  /// Materializes the course with a fresh id, unpublished.
  pub fn into_course(self, now: DateTime<Utc>) -> Course {
    Course { id: Uuid::new_v4(),
             slug: self.slug,
             title: self.title,
             description: self.description,
             published: false,
             created_at: now }
  }
}

/// A lesson inside a course, ordered by `position` (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
  pub id: Uuid,
  pub course_id: Uuid,
  pub position: i32,
  pub title: String,
  pub body: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
  Active,
  Completed,
  Withdrawn,
}

impl EnrollmentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      EnrollmentStatus::Active => "active",
      EnrollmentStatus::Completed => "completed",
      EnrollmentStatus::Withdrawn => "withdrawn",
    }
  }

  pub fn parse(s: &str) -> Result<Self, DomainError> {
    match s {
      "active" => Ok(EnrollmentStatus::Active),
      "completed" => Ok(EnrollmentStatus::Completed),
      "withdrawn" => Ok(EnrollmentStatus::Withdrawn),
      other => Err(DomainError::ValidationError(format!("unknown enrollment status '{}'", other))),
    }
  }
}

impl fmt::Display for EnrollmentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Link between an lms course and an erp student. The student id is not a
/// foreign key: the two domains migrate independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
  pub id: Uuid,
  pub course_id: Uuid,
  pub student_id: Uuid,
  pub status: EnrollmentStatus,
  pub enrolled_at: DateTime<Utc>,
}
