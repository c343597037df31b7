use crate::errors::MigrationError;
use regex::Regex;
use std::fmt;

/// Glob over table names (`*` any run, `?` one character), e.g. `lms_*`.
#[derive(Clone)]
pub struct TableFilter {
  pattern: String,
  regex: Regex,
}

impl TableFilter {
  pub fn new(pattern: &str) -> Result<Self, MigrationError> {
    if pattern.trim().is_empty() {
      return Err(MigrationError::InvalidFilter(pattern.to_string()));
    }
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
      match c {
        '*' => re.push_str(".*"),
        '?' => re.push('.'),
        other => re.push_str(&regex::escape(&other.to_string())),
      }
    }
    re.push('$');
    let regex = Regex::new(&re).map_err(|_| MigrationError::InvalidFilter(pattern.to_string()))?;
    Ok(Self { pattern: pattern.to_string(), regex })
  }

  pub fn matches(&self, table: &str) -> bool {
    self.regex.is_match(table)
  }

  pub fn pattern(&self) -> &str {
    &self.pattern
  }
}

impl fmt::Debug for TableFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("TableFilter").field(&self.pattern).finish()
  }
}

impl fmt::Display for TableFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.pattern)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn glob_semantics() {
    let f = TableFilter::new("lms_*").unwrap();
    assert!(f.matches("lms_courses"));
    assert!(f.matches("lms_"));
    assert!(!f.matches("xlms_courses"));
    assert!(!f.matches("lms"));

    let q = TableFilter::new("erp_?").unwrap();
    assert!(q.matches("erp_a"));
    assert!(!q.matches("erp_ab"));
  }

  #[test]
  fn dots_are_literal() {
    let f = TableFilter::new("public.lms_*").unwrap();
    assert!(f.matches("public.lms_courses"));
    assert!(!f.matches("publicXlms_courses"));
  }

  #[test]
  fn empty_pattern_is_rejected() {
    assert!(TableFilter::new(" ").is_err());
  }
}
