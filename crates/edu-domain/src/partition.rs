// partition.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Business area owning a subset of the tables in the shared database.
///
/// Every table of a domain carries the domain prefix and every domain keeps
/// its own migration history, so both can live in one physical database
/// without stepping on each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
  /// Learning management: courses, lessons, enrollments.
  Lms,
  /// Resource planning: students, fee invoices.
  Erp,
}

impl Domain {
  pub const ALL: [Domain; 2] = [Domain::Lms, Domain::Erp];

  pub fn name(self) -> &'static str {
    match self {
      Domain::Lms => "lms",
      Domain::Erp => "erp",
    }
  }

  /// Table-name prefix, including the trailing underscore.
  pub fn prefix(self) -> &'static str {
    match self {
      Domain::Lms => "lms_",
      Domain::Erp => "erp_",
    }
  }

  /// Glob used by migration tooling to restrict itself to this domain.
  pub fn table_filter(self) -> &'static str {
    match self {
      Domain::Lms => "lms_*",
      Domain::Erp => "erp_*",
    }
  }

  pub fn owns_table(self, table: &str) -> bool {
    table.len() > self.prefix().len() && table.starts_with(self.prefix())
  }

  /// Domain owning `table`, if the name carries a known prefix.
  pub fn of_table(table: &str) -> Option<Domain> {
    Self::ALL.into_iter().find(|d| d.owns_table(table))
  }
}

impl fmt::Display for Domain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Domain {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "lms" => Ok(Domain::Lms),
      "erp" => Ok(Domain::Erp),
      other => Err(DomainError::ValidationError(format!("unknown domain '{}', expected lms or erp", other))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefixes_do_not_overlap() {
    assert!(Domain::Lms.owns_table("lms_courses"));
    assert!(!Domain::Lms.owns_table("erp_students"));
    assert!(!Domain::Erp.owns_table("lms_courses"));
    assert!(!Domain::Lms.owns_table("lms_"));
    assert_eq!(Domain::of_table("erp_fee_invoices"), Some(Domain::Erp));
    assert_eq!(Domain::of_table("__lms_migrations"), None);
  }

  #[test]
  fn parses_case_insensitively() {
    assert_eq!("LMS".parse::<Domain>().unwrap(), Domain::Lms);
    assert_eq!(" erp ".parse::<Domain>().unwrap(), Domain::Erp);
    assert!(matches!("hr".parse::<Domain>(), Err(DomainError::ValidationError(_))));
  }
}
