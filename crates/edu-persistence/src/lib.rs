//! Shared persistence layer of the education platform.
//!
//! One Postgres database hosts two business partitions: `lms_*` tables for
//! courses and enrollments, `erp_*` tables for students and fees. The
//! [`schema`] module merges both table sets into one namespace, [`client`]
//! exposes a single pooled handle over it, and [`migration`] keeps each
//! partition's migration history separate.

pub mod client;
pub mod config;
pub mod db_error;
mod errors;
pub mod migration;
mod repositories;
pub mod schema;

pub use client::{global, Database, DbConn, DbPool, PoolOptions, SERVERLESS_MAX_CONNECTIONS};
pub use config::{DatabaseConfig, DATABASE_URL_VAR};
pub use db_error::{database_error, is_database_error, is_unique_violation, DatabaseErrorDetails, DbErrorKind};
pub use errors::{ConfigError, MigrationError, PersistenceError, Result};
pub use migration::{MigrationConfig, MigrationLayout, TableFilter};
pub use repositories::{DieselCampusDirectory, DieselErpRepository, DieselLmsRepository};
