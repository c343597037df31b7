//! Per-domain migration configuration.
//!
//! Each domain keeps its own migration directory, its own tracking table and
//! its own table filter, so lms and erp histories never collide even though
//! both land in the same database.

mod filter;
mod harness;
mod scan;

pub use filter::TableFilter;
pub use harness::{applied, introspect_tables, pending, revert_last, run_pending, DomainMigrationHarness};
pub use scan::{referenced_tables, scaffold, verify_dir, VerifyReport};

use crate::config::DatabaseConfig;
use crate::errors::MigrationError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations};
use edu_domain::Domain;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

pub const LMS_MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations/lms");
pub const ERP_MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations/erp");

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier regex"));

/// Migrations compiled into the binary for `domain`.
pub fn embedded(domain: Domain) -> EmbeddedMigrations {
  match domain {
    Domain::Lms => LMS_MIGRATIONS,
    Domain::Erp => ERP_MIGRATIONS,
  }
}

/// Name of the table recording applied versions of `domain`.
pub fn default_tracking_table(domain: Domain) -> &'static str {
  match domain {
    Domain::Lms => "__lms_migrations",
    Domain::Erp => "__erp_migrations",
  }
}

/// Directory holding the migration scripts of `domain` in this crate.
pub fn default_out_dir(domain: Domain) -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations").join(domain.name())
}

/// Where a domain's migrations live and how they are tracked. Needs no
/// database, so offline tooling (verify, scaffold) works from it.
#[derive(Debug, Clone)]
pub struct MigrationLayout {
  pub domain: Domain,
  pub out_dir: PathBuf,
  tracking_table: String,
  filter: TableFilter,
}

impl MigrationLayout {
  pub fn for_domain(domain: Domain) -> Result<Self, MigrationError> {
    Ok(Self { domain,
              out_dir: default_out_dir(domain),
              tracking_table: default_tracking_table(domain).to_string(),
              filter: TableFilter::new(domain.table_filter())? })
  }

  pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
    self.out_dir = out_dir.into();
    self
  }

  /// Overrides the tracking table. The name is spliced into SQL, so only
  /// plain identifiers are accepted.
  pub fn with_tracking_table(mut self, table: &str) -> Result<Self, MigrationError> {
    if !IDENT_RE.is_match(table) {
      return Err(MigrationError::InvalidTrackingTable(table.to_string()));
    }
    self.tracking_table = table.to_string();
    Ok(self)
  }

  pub fn tracking_table(&self) -> &str {
    &self.tracking_table
  }

  pub fn filter(&self) -> &TableFilter {
    &self.filter
  }
}

/// Layout plus a validated connection string: what a migration run needs.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
  pub layout: MigrationLayout,
  pub database: DatabaseConfig,
}

impl MigrationConfig {
  /// Builds the configuration for `domain`, validating `DATABASE_URL`
  /// independently of the runtime client.
  pub fn for_domain(domain: Domain) -> Result<Self, crate::PersistenceError> {
    let database = DatabaseConfig::from_env()?;
    Ok(Self { layout: MigrationLayout::for_domain(domain)?, database })
  }

  pub fn from_parts(layout: MigrationLayout, database: DatabaseConfig) -> Self {
    Self { layout, database }
  }

  /// Same as [`MigrationConfig::for_domain`] with an injected variable source.
  pub fn from_lookup<F>(domain: Domain, lookup: F) -> Result<Self, crate::PersistenceError>
    where F: Fn(&str) -> Option<String>
  {
    let database = DatabaseConfig::from_lookup(lookup)?;
    Ok(Self { layout: MigrationLayout::for_domain(domain)?, database })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn domains_have_independent_layouts() {
    let lms = MigrationLayout::for_domain(Domain::Lms).unwrap();
    let erp = MigrationLayout::for_domain(Domain::Erp).unwrap();
    assert_ne!(lms.out_dir, erp.out_dir);
    assert_ne!(lms.tracking_table(), erp.tracking_table());
    assert!(lms.filter().matches("lms_courses"));
    assert!(!lms.filter().matches("erp_students"));
    assert!(erp.filter().matches("erp_students"));
  }

  #[test]
  fn tracking_table_must_be_identifier() {
    let layout = MigrationLayout::for_domain(Domain::Lms).unwrap();
    assert!(layout.clone().with_tracking_table("lms_history").is_ok());
    assert!(matches!(layout.with_tracking_table("x; DROP TABLE y"),
                     Err(MigrationError::InvalidTrackingTable(_))));
  }

  #[test]
  fn config_requires_connection_string() {
    assert!(MigrationConfig::from_lookup(Domain::Erp, |_| None).is_err());
    assert!(MigrationConfig::from_lookup(Domain::Erp, |_| Some(String::new())).is_err());
    let cfg = MigrationConfig::from_lookup(Domain::Erp, |_| Some("postgres://localhost/edu".into())).unwrap();
    assert_eq!(cfg.layout.domain, Domain::Erp);
  }
}
