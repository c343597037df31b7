use edu_domain::{Domain, DomainError};
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the connection string. Always fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{var} is not set")]
  Missing { var: &'static str },
  #[error("{var} is set but empty")]
  Empty { var: &'static str },
  #[error("{var} does not look like a Postgres URL")]
  NotPostgres { var: &'static str },
  #[error("pool option {option} must be greater than zero")]
  PoolOption { option: &'static str },
}

#[derive(Debug, Error)]
pub enum MigrationError {
  #[error("{domain} migration {file} touches table '{table}' outside its filter {filter}")]
  ForeignTable { domain: Domain,
                 file: PathBuf,
                 table: String,
                 filter: String },
  #[error("invalid table filter '{0}'")]
  InvalidFilter(String),
  #[error("invalid tracking table name '{0}'")]
  InvalidTrackingTable(String),
  #[error("invalid migration name '{0}'")]
  InvalidName(String),
  #[error("migration directory {path}: {source}")]
  Io { path: PathBuf,
       #[source]
       source: std::io::Error },
  #[error("{domain} migrations failed: {message}")]
  Run { domain: Domain, message: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error("pool: {0}")]
  Pool(#[from] r2d2::Error),
  #[error("db: {0}")]
  Query(#[from] diesel::result::Error),
  #[error(transparent)]
  Migration(#[from] MigrationError),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

impl From<PersistenceError> for DomainError {
  fn from(e: PersistenceError) -> Self {
    DomainError::ExternalError(e.to_string())
  }
}
