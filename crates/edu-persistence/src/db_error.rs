//! Narrowing of arbitrary errors to driver-level database errors.
//!
//! Callers hold whatever error bubbled up (a `PersistenceError`, an
//! `anyhow::Error`, a bare `diesel::result::Error`). These helpers walk the
//! `source()` chain looking for a Diesel `DatabaseError` and expose its
//! SQLSTATE code and constraint name. Everything here is pure.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::error::Error as StdError;

pub const UNIQUE_VIOLATION: &str = "23505";
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
pub const NOT_NULL_VIOLATION: &str = "23502";
pub const CHECK_VIOLATION: &str = "23514";
pub const SERIALIZATION_FAILURE: &str = "40001";
pub const READ_ONLY_TRANSACTION: &str = "25006";

/// Driver details of a database error raised by the query layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseErrorDetails {
  pub kind: DbErrorKind,
  /// SQLSTATE code, when the kind maps to one.
  pub code: Option<&'static str>,
  pub constraint: Option<String>,
  pub table: Option<String>,
  pub column: Option<String>,
  pub message: String,
}

/// Owned mirror of Diesel's non-exhaustive `DatabaseErrorKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
  UniqueViolation,
  ForeignKeyViolation,
  NotNullViolation,
  CheckViolation,
  SerializationFailure,
  ReadOnlyTransaction,
  ClosedConnection,
  Other,
}

impl DbErrorKind {
  fn from_diesel(kind: &DatabaseErrorKind) -> Self {
    match kind {
      DatabaseErrorKind::UniqueViolation => DbErrorKind::UniqueViolation,
      DatabaseErrorKind::ForeignKeyViolation => DbErrorKind::ForeignKeyViolation,
      DatabaseErrorKind::NotNullViolation => DbErrorKind::NotNullViolation,
      DatabaseErrorKind::CheckViolation => DbErrorKind::CheckViolation,
      DatabaseErrorKind::SerializationFailure => DbErrorKind::SerializationFailure,
      DatabaseErrorKind::ReadOnlyTransaction => DbErrorKind::ReadOnlyTransaction,
      DatabaseErrorKind::ClosedConnection => DbErrorKind::ClosedConnection,
      _ => DbErrorKind::Other,
    }
  }

  pub fn sqlstate(self) -> Option<&'static str> {
    match self {
      DbErrorKind::UniqueViolation => Some(UNIQUE_VIOLATION),
      DbErrorKind::ForeignKeyViolation => Some(FOREIGN_KEY_VIOLATION),
      DbErrorKind::NotNullViolation => Some(NOT_NULL_VIOLATION),
      DbErrorKind::CheckViolation => Some(CHECK_VIOLATION),
      DbErrorKind::SerializationFailure => Some(SERIALIZATION_FAILURE),
      DbErrorKind::ReadOnlyTransaction => Some(READ_ONLY_TRANSACTION),
      DbErrorKind::ClosedConnection | DbErrorKind::Other => None,
    }
  }
}

/// Details of a bare Diesel error, if it is a database error.
pub fn diesel_details(err: &DieselError) -> Option<DatabaseErrorDetails> {
  match err {
    DieselError::DatabaseError(kind, info) => {
      let kind = DbErrorKind::from_diesel(kind);
      Some(DatabaseErrorDetails { kind,
                                  code: kind.sqlstate(),
                                  constraint: info.constraint_name().map(str::to_string),
                                  table: info.table_name().map(str::to_string),
                                  column: info.column_name().map(str::to_string),
                                  message: info.message().to_string() })
    }
    _ => None,
  }
}

/// Finds the first Diesel database error in `err` or its sources.
pub fn database_error(err: &(dyn StdError + 'static)) -> Option<DatabaseErrorDetails> {
  let mut current: Option<&(dyn StdError + 'static)> = Some(err);
  while let Some(e) = current {
    if let Some(diesel_err) = e.downcast_ref::<DieselError>() {
      if let Some(details) = diesel_details(diesel_err) {
        return Some(details);
      }
    }
    current = e.source();
  }
  None
}

/// True when `err` originates from the database driver.
pub fn is_database_error(err: &(dyn StdError + 'static)) -> bool {
  database_error(err).is_some()
}

/// True for unique violations, optionally restricted to one constraint.
pub fn is_unique_violation(err: &(dyn StdError + 'static), constraint: Option<&str>) -> bool {
  match database_error(err) {
    Some(d) if d.kind == DbErrorKind::UniqueViolation => {
      constraint.map_or(true, |c| d.constraint.as_deref() == Some(c))
    }
    _ => false,
  }
}
