// student.rs
use crate::DomainError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A student as stored in `erp_students`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub id: Uuid,
  pub admission_no: String,
  pub full_name: String,
  pub email: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
  admission_no: String,
  full_name: String,
  email: String,
}

impl NewStudent {
  pub fn new(admission_no: &str, full_name: &str, email: &str) -> Result<Self, DomainError> {
    let admission_no = admission_no.trim().to_uppercase();
    if admission_no.is_empty() {
      return Err(DomainError::ValidationError("admission number cannot be empty".to_string()));
    }
    if full_name.trim().is_empty() {
      return Err(DomainError::ValidationError("student name cannot be empty".to_string()));
    }
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
      Some((local, host)) if !local.is_empty() && !host.is_empty() => {}
      _ => return Err(DomainError::ValidationError(format!("invalid email '{}'", email))),
    }
    Ok(Self { admission_no, full_name: full_name.trim().to_string(), email })
  }

  pub fn admission_no(&self) -> &str {
    &self.admission_no
  }

  pub fn full_name(&self) -> &str {
    &self.full_name
  }

  pub fn email(&self) -> &str {
    &self.email
  }

  pub fn into_student(self, now: DateTime<Utc>) -> Student {
    Student { id: Uuid::new_v4(),
              admission_no: self.admission_no,
              full_name: self.full_name,
              email: self.email,
              created_at: now }
  }
}

/// Fee invoice as stored in `erp_fee_invoices`. Amounts are integer minor
/// units (cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeInvoice {
  pub id: Uuid,
  pub student_id: Uuid,
  pub amount_cents: i64,
  pub currency: String,
  pub due_on: NaiveDate,
  pub paid_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

impl FeeInvoice {
  pub fn is_paid(&self) -> bool {
    self.paid_at.is_some()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeeInvoice {
  student_id: Uuid,
  amount_cents: i64,
  currency: String,
  due_on: NaiveDate,
}

impl NewFeeInvoice {
  pub fn new(student_id: Uuid, amount_cents: i64, currency: &str, due_on: NaiveDate) -> Result<Self, DomainError> {
    if amount_cents <= 0 {
      return Err(DomainError::ValidationError(format!("invoice amount must be positive, got {}", amount_cents)));
    }
    let currency = currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
      return Err(DomainError::ValidationError(format!("invalid currency code '{}'", currency)));
    }
    Ok(Self { student_id, amount_cents, currency: currency.to_string(), due_on })
  }

  pub fn student_id(&self) -> Uuid {
    self.student_id
  }

  pub fn amount_cents(&self) -> i64 {
    self.amount_cents
  }

  pub fn currency(&self) -> &str {
    &self.currency
  }

  pub fn due_on(&self) -> NaiveDate {
    self.due_on
  }

  pub fn into_invoice(self, now: DateTime<Utc>) -> FeeInvoice {
    FeeInvoice { id: Uuid::new_v4(),
                 student_id: self.student_id,
                 amount_cents: self.amount_cents,
                 currency: self.currency,
                 due_on: self.due_on,
                 paid_at: None,
                 created_at: now }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn student_input_is_normalized() {
    let s = NewStudent::new(" adm-001 ", " Ada Lovelace ", "Ada@School.EDU").unwrap();
    assert_eq!(s.admission_no(), "ADM-001");
    assert_eq!(s.full_name(), "Ada Lovelace");
    assert_eq!(s.email(), "ada@school.edu");
  }

  #[test]
  fn rejects_bad_email() {
    assert!(NewStudent::new("A1", "Ada", "ada").is_err());
    assert!(NewStudent::new("A1", "Ada", "@school.edu").is_err());
  }

  #[test]
  fn invoice_rules() {
    let due = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
    assert!(NewFeeInvoice::new(Uuid::new_v4(), 0, "USD", due).is_err());
    assert!(NewFeeInvoice::new(Uuid::new_v4(), 1500, "usd", due).is_err());
    assert!(NewFeeInvoice::new(Uuid::new_v4(), 1500, "EURO", due).is_err());
    let inv = NewFeeInvoice::new(Uuid::new_v4(), 1500, "USD", due).unwrap().into_invoice(Utc::now());
    assert!(!inv.is_paid());
  }
}
