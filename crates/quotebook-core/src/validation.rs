//! Field-level validation errors.
//!
//! Form submissions collect every problem they find instead of stopping at
//! the first one, so the submitter sees all of them at once. Errors are keyed
//! by form field name; [`NON_FIELD`] holds errors that belong to the form as
//! a whole (e.g. a failed login).

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

/// Key for errors that are not attached to a single field.
pub const NON_FIELD: &str = "__all__";

pub const REQUIRED: &str = "This field is required.";
pub const NOT_AN_INTEGER: &str = "Enter a whole number.";
pub const INVALID_CHOICE: &str = "Select a valid choice.";

/// Ordered map of `field → messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  /// Shorthand for a set holding a single error.
  pub fn single(field: &str, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.add(field, message);
    errors
  }

  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self.0.entry(field.to_owned()).or_default().push(message.into());
  }

  pub fn merge(&mut self, other: ValidationErrors) {
    for (field, messages) in other.0 {
      self.0.entry(field).or_default().extend(messages);
    }
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn has(&self, field: &str) -> bool { self.0.contains_key(field) }

  pub fn get(&self, field: &str) -> &[String] {
    self.0.get(field).map(Vec::as_slice).unwrap_or_default()
  }

  /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
  pub fn into_result(self) -> Result<(), Self> {
    if self.is_empty() { Ok(()) } else { Err(self) }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, messages) in &self.0 {
      for message in messages {
        if !first {
          f.write_str("; ")?;
        }
        write!(f, "{field}: {message}")?;
        first = false;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collects_multiple_messages_per_field() {
    let mut errors = ValidationErrors::new();
    errors.add("text", "a");
    errors.add("weight", "b");
    errors.add("text", "c");

    assert_eq!(errors.get("text"), &["a", "c"]);
    assert_eq!(errors.get("weight"), &["b"]);
    assert!(errors.get("source_name").is_empty());
    assert_eq!(errors.to_string(), "text: a; text: c; weight: b");
  }

  #[test]
  fn serialises_as_plain_map() {
    let errors = ValidationErrors::single("weight", "too small");
    let json = serde_json::to_value(&errors).unwrap();
    assert_eq!(json, serde_json::json!({ "weight": ["too small"] }));
  }

  #[test]
  fn empty_set_is_ok() {
    assert!(ValidationErrors::new().into_result().is_ok());
    assert!(ValidationErrors::single(NON_FIELD, "x").into_result().is_err());
  }
}
