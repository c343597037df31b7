//! Pooled query client over the merged lms + erp schema.
//!
//! The pool is capped at one connection by default: each serverless
//! invocation is short-lived and the hosted Postgres counts connections.
//! Concurrent callers queue on the pool; nothing here retries.

use crate::config::DatabaseConfig;
use crate::errors::{ConfigError, PersistenceError, Result};
use crate::repositories::{DieselCampusDirectory, DieselErpRepository, DieselLmsRepository};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<PgConnection>>;

/// Upper bound of physical connections for the serverless client.
pub const SERVERLESS_MAX_CONNECTIONS: u32 = 1;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
  pub max_size: u32,
  pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
  fn default() -> Self {
    Self { max_size: SERVERLESS_MAX_CONNECTIONS, acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT }
  }
}

/// Shared database handle. Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct Database {
  pool: Arc<DbPool>,
}

impl Database {
  /// Builds the serverless client. No connection is opened until first use.
  pub fn connect(config: &DatabaseConfig) -> Result<Self> {
    Self::with_options(config, PoolOptions::default())
  }

  /// Fails with [`ConfigError::PoolOption`] for a zero size or timeout.
  pub fn with_options(config: &DatabaseConfig, options: PoolOptions) -> Result<Self> {
    if options.max_size == 0 {
      return Err(ConfigError::PoolOption { option: "max_size" }.into());
    }
    if options.acquire_timeout.is_zero() {
      return Err(ConfigError::PoolOption { option: "acquire_timeout" }.into());
    }
    let manager = ConnectionManager::<PgConnection>::new(config.url());
    let pool = Pool::builder().max_size(options.max_size)
                              .min_idle(Some(0))
                              .connection_timeout(options.acquire_timeout)
                              .build_unchecked(manager);
    log::debug!("database pool ready for {} (max {} connections)",
                config.redacted(),
                pool.max_size());
    Ok(Database { pool: Arc::new(pool) })
  }

  /// Validates `DATABASE_URL` and builds the serverless client.
  pub fn from_env() -> Result<Self> {
    let config = DatabaseConfig::from_env()?;
    Self::connect(&config)
  }

  pub fn conn(&self) -> Result<DbConn> {
    self.pool.get().map_err(PersistenceError::from)
  }

  pub fn max_connections(&self) -> u32 {
    self.pool.max_size()
  }

  /// Round-trips `SELECT 1`.
  pub fn ping(&self) -> Result<()> {
    let mut conn = self.conn()?;
    diesel::sql_query("SELECT 1").execute(&mut conn)?;
    Ok(())
  }

  pub fn lms(&self) -> DieselLmsRepository {
    DieselLmsRepository::new(self.clone())
  }

  pub fn erp(&self) -> DieselErpRepository {
    DieselErpRepository::new(self.clone())
  }

  pub fn campus(&self) -> DieselCampusDirectory {
    DieselCampusDirectory::new(self.clone())
  }
}

static GLOBAL: OnceCell<Database> = OnceCell::new();

/// Process-wide client, built on first call from `DATABASE_URL`. A failed
/// attempt is not cached, so the next call validates again.
pub fn global() -> Result<&'static Database> {
  GLOBAL.get_or_try_init(Database::from_env)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> DatabaseConfig {
    DatabaseConfig::from_url("postgres://edu@127.0.0.1:1/edu").unwrap()
  }

  #[test]
  fn default_options_build_a_single_connection_pool() {
    let db = Database::connect(&config()).expect("pool builds without connecting");
    assert_eq!(db.max_connections(), SERVERLESS_MAX_CONNECTIONS);
  }

  #[test]
  fn zero_options_are_rejected() {
    let zero_timeout = PoolOptions { max_size: 1, acquire_timeout: Duration::ZERO };
    assert!(matches!(Database::with_options(&config(), zero_timeout),
                     Err(PersistenceError::Config(ConfigError::PoolOption { option: "acquire_timeout" }))));

    let zero_size = PoolOptions { max_size: 0, ..PoolOptions::default() };
    assert!(matches!(Database::with_options(&config(), zero_size),
                     Err(PersistenceError::Config(ConfigError::PoolOption { option: "max_size" }))));
  }

  #[test]
  fn larger_pools_are_allowed() {
    let options = PoolOptions { max_size: 4, acquire_timeout: Duration::from_millis(250) };
    let db = Database::with_options(&config(), options).unwrap();
    assert_eq!(db.max_connections(), 4);
  }
}
