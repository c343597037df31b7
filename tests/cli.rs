use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn eduplat() -> Command {
  let mut cmd = Command::cargo_bin("eduplat-db").expect("binary built");
  cmd.env_remove("DATABASE_URL").env_remove("EDUPLAT_MIGRATIONS_DIR").env("RUST_LOG", "warn");
  cmd
}

#[test]
fn verify_passes_on_shipped_migrations() {
  eduplat().arg("verify")
           .assert()
           .success()
           .stdout(predicate::str::contains("lms ok").and(predicate::str::contains("erp ok")))
           .stdout(predicate::str::contains("erp_fee_invoices"));
}

#[test]
fn verify_rejects_foreign_table() {
  let root = tempfile::tempdir().unwrap();
  let migration = root.path().join("erp").join("2025-02-01-000000_grades");
  fs::create_dir_all(&migration).unwrap();
  fs::write(migration.join("up.sql"), "CREATE TABLE lms_grades (id UUID PRIMARY KEY);").unwrap();

  eduplat().args(["verify", "erp", "--migrations-dir"])
           .arg(root.path())
           .assert()
           .failure()
           .stderr(predicate::str::contains("lms_grades"));
}

#[test]
fn new_scaffolds_into_domain_directory() {
  let root = tempfile::tempdir().unwrap();
  eduplat().args(["new", "lms", "add_quizzes", "--migrations-dir"])
           .arg(root.path())
           .assert()
           .success()
           .stdout(predicate::str::contains("_add_quizzes"));

  let created = fs::read_dir(root.path().join("lms")).unwrap().count();
  assert_eq!(created, 1);
}

#[test]
fn database_commands_need_database_url() {
  for args in [&["check"][..], &["migrate"][..], &["status", "erp"][..], &["rollback", "lms"][..]] {
    eduplat().args(args)
             .assert()
             .failure()
             .stderr(predicate::str::contains("DATABASE_URL"));
  }
}

#[test]
fn unknown_domain_is_a_usage_error() {
  eduplat().args(["rollback", "crm"]).assert().failure().code(2);
}
