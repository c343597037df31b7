use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use edu_domain::{Domain, ErpRepository, LmsRepository};
use edu_persistence::migration::{self, MigrationConfig, MigrationLayout};
use edu_persistence::{global, schema};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// Operator tool for the shared lms/erp database.
///
/// Every domain migrates on its own: its scripts live in their own directory,
/// its history in its own tracking table, and its scripts may only touch
/// tables carrying its prefix.
#[derive(Parser, Debug)]
#[command(name = "eduplat-db")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations (lms, erp or all)
    Migrate {
        #[arg(default_value = "all")]
        scope: Scope,
    },
    /// Revert the last applied migration of a domain
    Rollback { domain: Domain },
    /// Show applied and pending migrations and untracked tables
    Status {
        domain: Option<Domain>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check offline that migration scripts only touch their domain's tables
    Verify {
        domain: Option<Domain>,
        /// Root holding one directory per domain
        #[arg(long, env = "EDUPLAT_MIGRATIONS_DIR")]
        migrations_dir: Option<PathBuf>,
    },
    /// Create an empty migration for a domain
    New {
        domain: Domain,
        name: String,
        /// Root holding one directory per domain
        #[arg(long, env = "EDUPLAT_MIGRATIONS_DIR")]
        migrations_dir: Option<PathBuf>,
    },
    /// Build the client and read one table of each domain
    Check,
}

/// `all` or a single domain.
#[derive(Debug, Clone, Copy)]
struct Scope(Option<Domain>);

impl Scope {
    fn domains(self) -> Vec<Domain> {
        match self.0 {
            Some(d) => vec![d],
            None => Domain::ALL.to_vec(),
        }
    }
}

impl FromStr for Scope {
    type Err = edu_domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Scope(None));
        }
        Domain::from_str(s).map(|d| Scope(Some(d)))
    }
}

#[derive(Debug, Serialize)]
struct DomainStatus {
    domain: Domain,
    tracking_table: String,
    applied: Vec<String>,
    pending: Vec<String>,
    untracked_tables: Vec<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Migrate { scope } => migrate(scope),
        Command::Rollback { domain } => rollback(domain),
        Command::Status { domain, json } => status(Scope(domain), json),
        Command::Verify { domain, migrations_dir } => verify(Scope(domain), migrations_dir.as_deref()),
        Command::New { domain, name, migrations_dir } => new_migration(domain, &name, migrations_dir.as_deref()),
        Command::Check => check(),
    }
}

// Validates DATABASE_URL for every requested domain before touching the database.
fn migration_configs(scope: Scope) -> Result<Vec<MigrationConfig>> {
    scope.domains()
         .into_iter()
         .map(|d| MigrationConfig::for_domain(d).with_context(|| format!("{} migration config", d)))
         .collect()
}

fn layout(domain: Domain, root: Option<&Path>) -> Result<MigrationLayout> {
    let layout = MigrationLayout::for_domain(domain)?;
    Ok(match root {
        Some(root) => layout.with_out_dir(root.join(domain.name())),
        None => layout,
    })
}

fn migrate(scope: Scope) -> Result<()> {
    let configs = migration_configs(scope)?;
    let db = global()?;
    for cfg in &configs {
        let mut conn = db.conn()?;
        let applied = migration::run_pending(&mut conn, &cfg.layout)?;
        tracing::info!(domain = %cfg.layout.domain, count = applied.len(), "migrations applied");
        for version in applied {
            println!("{} {}", cfg.layout.domain, version);
        }
    }
    Ok(())
}

fn rollback(domain: Domain) -> Result<()> {
    let cfg = MigrationConfig::for_domain(domain)?;
    let db = global()?;
    let version = migration::revert_last(&mut *db.conn()?, &cfg.layout)?;
    println!("{} reverted {}", domain, version);
    Ok(())
}

fn status(scope: Scope, json: bool) -> Result<()> {
    let configs = migration_configs(scope)?;
    let db = global()?;
    let mut report = Vec::with_capacity(configs.len());
    for cfg in &configs {
        let mut conn = db.conn()?;
        let known = schema::tables_for(cfg.layout.domain);
        let live = migration::introspect_tables(&mut conn, cfg.layout.filter())?;
        let untracked_tables = live.into_iter().filter(|t| !known.contains(&t.as_str())).collect();
        report.push(DomainStatus { domain: cfg.layout.domain,
                                   tracking_table: cfg.layout.tracking_table().to_string(),
                                   applied: migration::applied(&mut conn, &cfg.layout)?,
                                   pending: migration::pending(&mut conn, &cfg.layout)?,
                                   untracked_tables });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for s in report {
        println!("{} ({})", s.domain, s.tracking_table);
        println!("  applied: {}", s.applied.len());
        for v in &s.pending {
            println!("  pending: {}", v);
        }
        for t in &s.untracked_tables {
            println!("  untracked table: {}", t);
        }
    }
    Ok(())
}

fn verify(scope: Scope, root: Option<&Path>) -> Result<()> {
    for domain in scope.domains() {
        let layout = layout(domain, root)?;
        let report = migration::verify_dir(&layout)?;
        let tables = report.tables.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        println!("{} ok: {} scripts, tables: {}", domain, report.files, tables);
    }
    Ok(())
}

fn new_migration(domain: Domain, name: &str, root: Option<&Path>) -> Result<()> {
    let layout = layout(domain, root)?;
    let dir = migration::scaffold(&layout, name, Utc::now().naive_utc())?;
    println!("{}", dir.display());
    Ok(())
}

fn check() -> Result<()> {
    let db = global().context("building database client")?;
    db.ping().context("database unreachable")?;
    let courses = db.lms().list_courses(false)?;
    let students = db.erp().list_students()?;
    println!("pool: {} connection(s)", db.max_connections());
    println!("lms_courses: {} rows", courses.len());
    println!("erp_students: {} rows", students.len());
    Ok(())
}
