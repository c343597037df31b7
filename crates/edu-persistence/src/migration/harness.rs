// Diesel migration harness writing to a per-domain tracking table instead of
// the shared `__diesel_schema_migrations`.
use super::{embedded, MigrationLayout, TableFilter};
use crate::errors::MigrationError;
use diesel::migration::{Migration, MigrationVersion, Result as MigrationResult};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_migrations::MigrationHarness;

#[derive(QueryableByName)]
struct VersionRow {
  #[diesel(sql_type = Text)]
  version: String,
}

#[derive(QueryableByName)]
struct TableNameRow {
  #[diesel(sql_type = Text)]
  table_name: String,
}

/// Runs one domain's migrations and records them in that domain's tracking
/// table only.
pub struct DomainMigrationHarness<'a> {
  conn: &'a mut PgConnection,
  tracking_table: &'a str,
}

impl<'a> DomainMigrationHarness<'a> {
  pub fn new(conn: &'a mut PgConnection, layout: &'a MigrationLayout) -> Self {
    Self { conn, tracking_table: layout.tracking_table() }
  }

  fn ensure_tracking_table(&mut self) -> QueryResult<()> {
    diesel::sql_query(format!("CREATE TABLE IF NOT EXISTS {} (version VARCHAR(50) PRIMARY KEY NOT NULL, run_on \
                               TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
                              self.tracking_table)).execute(&mut *self.conn)?;
    Ok(())
  }
}

impl MigrationHarness<Pg> for DomainMigrationHarness<'_> {
  fn run_migration(&mut self, migration: &dyn Migration<Pg>) -> MigrationResult<MigrationVersion<'static>> {
    self.ensure_tracking_table()?;
    let version = migration.name().version().as_owned();
    let record = format!("INSERT INTO {} (version) VALUES ($1)", self.tracking_table);
    let apply = |conn: &mut PgConnection| -> MigrationResult<()> {
      migration.run(&mut *conn)?;
      diesel::sql_query(record.as_str()).bind::<Text, _>(version.to_string()).execute(conn)?;
      Ok(())
    };
    if migration.metadata().run_in_transaction() {
      self.conn.transaction(apply)?;
    } else {
      apply(&mut *self.conn)?;
    }
    log::info!("applied migration {} ({})", migration.name(), self.tracking_table);
    Ok(version)
  }

  fn revert_migration(&mut self, migration: &dyn Migration<Pg>) -> MigrationResult<MigrationVersion<'static>> {
    self.ensure_tracking_table()?;
    let version = migration.name().version().as_owned();
    let forget = format!("DELETE FROM {} WHERE version = $1", self.tracking_table);
    let revert = |conn: &mut PgConnection| -> MigrationResult<()> {
      migration.revert(&mut *conn)?;
      diesel::sql_query(forget.as_str()).bind::<Text, _>(version.to_string()).execute(conn)?;
      Ok(())
    };
    if migration.metadata().run_in_transaction() {
      self.conn.transaction(revert)?;
    } else {
      revert(&mut *self.conn)?;
    }
    log::info!("reverted migration {} ({})", migration.name(), self.tracking_table);
    Ok(version)
  }

  fn applied_migrations(&mut self) -> MigrationResult<Vec<MigrationVersion<'static>>> {
    self.ensure_tracking_table()?;
    let rows = diesel::sql_query(format!("SELECT version FROM {} ORDER BY version DESC", self.tracking_table))
      .load::<VersionRow>(&mut *self.conn)?;
    Ok(rows.into_iter().map(|r| MigrationVersion::from(r.version)).collect())
  }
}

fn run_error(layout: &MigrationLayout, e: impl std::fmt::Display) -> MigrationError {
  MigrationError::Run { domain: layout.domain, message: e.to_string() }
}

/// Applies every pending embedded migration of the layout's domain. Returns
/// the applied versions in order.
pub fn run_pending(conn: &mut PgConnection, layout: &MigrationLayout) -> Result<Vec<String>, MigrationError> {
  let mut harness = DomainMigrationHarness::new(conn, layout);
  let versions = harness.run_pending_migrations(embedded(layout.domain))
                        .map_err(|e| run_error(layout, e))?
                        .into_iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>();
  if versions.is_empty() {
    log::info!("{} schema is up to date", layout.domain);
  }
  Ok(versions)
}

/// Reverts the most recent migration of the layout's domain.
pub fn revert_last(conn: &mut PgConnection, layout: &MigrationLayout) -> Result<String, MigrationError> {
  let mut harness = DomainMigrationHarness::new(conn, layout);
  harness.revert_last_migration(embedded(layout.domain))
         .map(|v| v.to_string())
         .map_err(|e| run_error(layout, e))
}

/// Applied versions, newest first.
pub fn applied(conn: &mut PgConnection, layout: &MigrationLayout) -> Result<Vec<String>, MigrationError> {
  let mut harness = DomainMigrationHarness::new(conn, layout);
  harness.applied_migrations()
         .map(|vs| vs.into_iter().map(|v| v.to_string()).collect())
         .map_err(|e| run_error(layout, e))
}

/// Names of embedded migrations not yet applied, oldest first.
pub fn pending(conn: &mut PgConnection, layout: &MigrationLayout) -> Result<Vec<String>, MigrationError> {
  let mut harness = DomainMigrationHarness::new(conn, layout);
  harness.pending_migrations(embedded(layout.domain))
         .map(|ms| ms.iter().map(|m| m.name().to_string()).collect())
         .map_err(|e| run_error(layout, e))
}

/// Live base tables of the current schema accepted by `filter`.
pub fn introspect_tables(conn: &mut PgConnection, filter: &TableFilter) -> QueryResult<Vec<String>> {
  let rows = diesel::sql_query("SELECT table_name::text AS table_name FROM information_schema.tables WHERE \
                                table_schema = current_schema() AND table_type = 'BASE TABLE' ORDER BY table_name")
    .load::<TableNameRow>(conn)?;
  Ok(rows.into_iter().map(|r| r.table_name).filter(|t| filter.matches(t)).collect())
}
