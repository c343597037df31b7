// Offline checks over migration scripts: which tables a script touches and
// whether they all belong to the domain the script is filed under.
use super::MigrationLayout;
use crate::errors::MigrationError;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

static LINE_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"--[^\n]*").expect("comment regex"));
static BLOCK_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("comment regex"));
// Statements naming exactly one table.
static TABLE_REF_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(?ix)
      (?:
          \b(?:
              create\s+(?:(?:global|local)\s+)?(?:temp(?:orary)?\s+|unlogged\s+)?table(?:\s+if\s+not\s+exists)?
            | alter\s+table(?:\s+if\s+exists)?(?:\s+only)?
            | rename\s+to
            | insert\s+into
            | update(?:\s+only)?
            | delete\s+from(?:\s+only)?
            | references
            | create\s+(?:unique\s+)?index(?:\s+concurrently)?(?:\s+if\s+not\s+exists)?(?:\s+"?\w+"?)?\s+on(?:\s+only)?
          )
        | \(\s*like
      )
      \s+
      ((?:"?\w+"?\.)?"?\w+"?)
    "#).expect("table reference regex")
});
// Statements accepting a comma-separated list of tables.
static TABLE_LIST_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(?ix)
      \b(?:
          drop\s+table(?:\s+if\s+exists)?
        | truncate(?:\s+table)?
      )
      \s+
      ((?:only\s+)?(?:"?\w+"?\.)?"?\w+"?(?:\s*,\s*(?:only\s+)?(?:"?\w+"?\.)?"?\w+"?)*)
    "#).expect("table list regex")
});
static MIGRATION_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("name regex"));

// Words that follow `update` without naming a table (`ON UPDATE CASCADE`,
// `FOR UPDATE OF`, trigger events).
const NOT_A_TABLE: &[&str] = &["cascade", "restrict", "set", "no", "on", "of", "or", "nowait", "skip"];

// Drops the schema qualifier. Unquoted identifiers fold to lowercase as in
// Postgres; quoted ones keep their case.
fn normalize_table(raw: &str) -> String {
  let raw = raw.trim();
  let raw = match raw.split_once(char::is_whitespace) {
    Some((head, rest)) if head.eq_ignore_ascii_case("only") => rest.trim_start(),
    _ => raw,
  };
  let name = raw.rsplit('.').next().unwrap_or(raw);
  if name.starts_with('"') {
    name.trim_matches('"').to_string()
  } else {
    name.to_lowercase()
  }
}

/// Tables referenced by DDL/DML statements in `sql`, schema qualifier and
/// quotes stripped, unquoted names lowercased.
pub fn referenced_tables(sql: &str) -> BTreeSet<String> {
  let without_blocks = BLOCK_COMMENT_RE.replace_all(sql, " ");
  let cleaned = LINE_COMMENT_RE.replace_all(&without_blocks, " ");
  let singles = TABLE_REF_RE.captures_iter(&cleaned).filter_map(|c| c.get(1)).map(|m| normalize_table(m.as_str()));
  let lists = TABLE_LIST_RE.captures_iter(&cleaned)
                           .filter_map(|c| c.get(1))
                           .flat_map(|m| m.as_str().split(',').map(normalize_table).collect::<Vec<_>>());
  singles.chain(lists).filter(|t| !NOT_A_TABLE.contains(&t.as_str())).collect()
}

/// Outcome of [`verify_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
  pub files: usize,
  pub tables: BTreeSet<String>,
}

/// Checks that every script under the layout's directory only touches tables
/// accepted by the domain filter.
pub fn verify_dir(layout: &MigrationLayout) -> Result<VerifyReport, MigrationError> {
  let mut report = VerifyReport::default();
  for dir in migration_dirs(&layout.out_dir)? {
    for script in ["up.sql", "down.sql"] {
      let path = dir.join(script);
      if !path.is_file() {
        continue;
      }
      let sql = fs::read_to_string(&path).map_err(|source| MigrationError::Io { path: path.clone(), source })?;
      for table in referenced_tables(&sql) {
        if !layout.filter().matches(&table) {
          return Err(MigrationError::ForeignTable { domain: layout.domain,
                                                    file: path,
                                                    table,
                                                    filter: layout.filter().pattern().to_string() });
        }
        report.tables.insert(table);
      }
      report.files += 1;
    }
  }
  log::debug!("{} migrations verified: {} files, {} tables", layout.domain, report.files, report.tables.len());
  Ok(report)
}

/// Creates `<out_dir>/<YYYY-MM-DD-HHMMSS>_<name>/{up,down}.sql`.
pub fn scaffold(layout: &MigrationLayout, name: &str, now: NaiveDateTime) -> Result<PathBuf, MigrationError> {
  let name = name.trim().to_lowercase().replace(['-', ' '], "_");
  if !MIGRATION_NAME_RE.is_match(&name) {
    return Err(MigrationError::InvalidName(name));
  }
  let dir = layout.out_dir.join(format!("{}_{}", now.format("%Y-%m-%d-%H%M%S"), name));
  let io = |path: &Path| {
    let path = path.to_path_buf();
    move |source| MigrationError::Io { path, source }
  };
  fs::create_dir_all(&dir).map_err(io(&dir))?;
  let prefix = layout.domain.prefix();
  let up = dir.join("up.sql");
  let down = dir.join("down.sql");
  fs::write(&up, format!("-- {} migration: only {}* tables belong here\n", layout.domain, prefix)).map_err(io(&up))?;
  fs::write(&down, "-- revert the statements of up.sql\n").map_err(io(&down))?;
  log::info!("created {} migration {}", layout.domain, dir.display());
  Ok(dir)
}

fn migration_dirs(root: &Path) -> Result<Vec<PathBuf>, MigrationError> {
  let entries = fs::read_dir(root).map_err(|source| MigrationError::Io { path: root.to_path_buf(), source })?;
  let mut dirs = Vec::new();
  for entry in entries {
    let entry = entry.map_err(|source| MigrationError::Io { path: root.to_path_buf(), source })?;
    if entry.path().is_dir() {
      dirs.push(entry.path());
    }
  }
  dirs.sort();
  Ok(dirs)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn finds_created_and_referenced_tables() {
    let sql = r#"
      CREATE TABLE IF NOT EXISTS lms_lessons (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL REFERENCES lms_courses (id) ON DELETE CASCADE ON UPDATE CASCADE
      );
      CREATE UNIQUE INDEX lms_lessons_pos ON "public"."lms_lessons" (course_id, position);
    "#;
    assert_eq!(referenced_tables(sql), set(&["lms_courses", "lms_lessons"]));
  }

  #[test]
  fn ignores_comments() {
    let sql = "-- ALTER TABLE erp_students ADD x INT;\n/* DROP TABLE erp_fee_invoices; */\nDROP TABLE lms_courses;";
    assert_eq!(referenced_tables(sql), set(&["lms_courses"]));
  }

  #[test]
  fn dml_statements_count() {
    let sql = "INSERT INTO erp_students (id) VALUES ('x'); DELETE FROM erp_fee_invoices; TRUNCATE TABLE erp_x;";
    assert_eq!(referenced_tables(sql), set(&["erp_fee_invoices", "erp_students", "erp_x"]));
  }

  #[test]
  fn every_target_of_a_table_list_counts() {
    assert_eq!(referenced_tables("DROP TABLE lms_old, erp_students;"), set(&["erp_students", "lms_old"]));
    assert_eq!(referenced_tables("DROP TABLE IF EXISTS lms_a ,public.erp_b CASCADE;"), set(&["erp_b", "lms_a"]));
    assert_eq!(referenced_tables("TRUNCATE lms_courses, ONLY erp_fee_invoices;"),
               set(&["erp_fee_invoices", "lms_courses"]));
  }

  #[test]
  fn update_targets_count() {
    assert_eq!(referenced_tables("UPDATE erp_students SET email = 'x';"), set(&["erp_students"]));
    assert_eq!(referenced_tables("update only lms_courses set published = true;"), set(&["lms_courses"]));
  }

  #[test]
  fn rename_and_like_targets_count() {
    assert_eq!(referenced_tables("ALTER TABLE lms_courses RENAME TO erp_courses;"),
               set(&["erp_courses", "lms_courses"]));
    assert_eq!(referenced_tables("CREATE TABLE lms_archive (LIKE erp_students INCLUDING ALL);"),
               set(&["erp_students", "lms_archive"]));
    // Renaming a column names no new table.
    assert_eq!(referenced_tables("ALTER TABLE lms_courses RENAME COLUMN title TO name;"), set(&["lms_courses"]));
  }

  #[test]
  fn referential_actions_are_not_tables() {
    let sql = "CREATE TABLE lms_x (c UUID REFERENCES lms_y (id) ON DELETE CASCADE ON UPDATE SET NULL);\n\
               ALTER TABLE lms_z ADD FOREIGN KEY (c) REFERENCES lms_y (id) ON UPDATE CASCADE;\n\
               ALTER TABLE lms_w ADD FOREIGN KEY (c) REFERENCES lms_y (id) ON UPDATE NO ACTION;";
    assert_eq!(referenced_tables(sql), set(&["lms_w", "lms_x", "lms_y", "lms_z"]));
    // Columns merely containing the keyword are ignored.
    assert_eq!(referenced_tables("ALTER TABLE lms_x ADD COLUMN updated_at TIMESTAMPTZ;"), set(&["lms_x"]));
  }

  #[test]
  fn unquoted_names_fold_to_lowercase() {
    assert_eq!(referenced_tables("CREATE TABLE LMS_QUIZZES (id UUID);"), set(&["lms_quizzes"]));
    assert_eq!(referenced_tables("CREATE TABLE Public.Lms_Quizzes (id UUID);"), set(&["lms_quizzes"]));
    assert_eq!(referenced_tables(r#"CREATE TABLE "LMS_Quizzes" (id UUID);"#), set(&["LMS_Quizzes"]));
  }
}
