//! Quotes and quote submission rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  source::{Source, SourceKind},
  validation::{REQUIRED, ValidationErrors},
};

/// A source may own at most this many quotes at any time.
pub const MAX_QUOTES_PER_SOURCE: i64 = 3;

/// Longest accepted source name, in characters.
pub const MAX_SOURCE_NAME_LEN: usize = 255;

pub const FIELD_TEXT: &str = "text";
pub const FIELD_WEIGHT: &str = "weight";
pub const FIELD_SOURCE_NAME: &str = "source_name";
pub const FIELD_SOURCE_TYPE: &str = "source_type";

pub const WEIGHT_TOO_SMALL: &str = "Weight must be at least 1.";
pub const DUPLICATE_TEXT: &str = "A quote with this text already exists.";
pub const SOURCE_FULL: &str = "A source cannot have more than 3 quotes.";

/// A stored quote together with the source it is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
  pub quote_id:   i64,
  pub text:       String,
  pub source:     Source,
  /// Relative selection weight. Values below 1 are treated as 1 when
  /// sampling; see [`crate::selection`].
  pub weight:     i64,
  pub views:      i64,
  pub likes:      i64,
  pub dislikes:   i64,
  pub created_at: DateTime<Utc>,
  /// `None` once the creating user has been deleted.
  pub created_by: Option<i64>,
}

/// Input to [`crate::store::QuoteStore::submit_quote`].
#[derive(Debug, Clone)]
pub struct NewQuote {
  pub text:        String,
  pub weight:      i64,
  pub source_name: String,
  /// Only used when `source_name` does not exist yet; an existing source
  /// keeps the category it was created with.
  pub source_kind: SourceKind,
  pub created_by:  Option<i64>,
}

impl NewQuote {
  /// Build a submission, trimming surrounding whitespace from free text.
  pub fn new(
    text: impl AsRef<str>,
    weight: i64,
    source_name: impl AsRef<str>,
    source_kind: SourceKind,
  ) -> Self {
    Self {
      text: text.as_ref().trim().to_owned(),
      weight,
      source_name: source_name.as_ref().trim().to_owned(),
      source_kind,
      created_by: None,
    }
  }

  pub fn created_by(mut self, user_id: i64) -> Self {
    self.created_by = Some(user_id);
    self
  }

  /// Checks that need no database access. Uniqueness of the text and the
  /// per-source quota are checked by the store inside its write transaction.
  pub fn check(&self) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if self.weight < 1 {
      errors.add(FIELD_WEIGHT, WEIGHT_TOO_SMALL);
    }
    if self.text.is_empty() {
      errors.add(FIELD_TEXT, REQUIRED);
    }
    if self.source_name.is_empty() {
      errors.add(FIELD_SOURCE_NAME, REQUIRED);
    } else if self.source_name.chars().count() > MAX_SOURCE_NAME_LEN {
      errors.add(
        FIELD_SOURCE_NAME,
        format!("Ensure this value has at most {MAX_SOURCE_NAME_LEN} characters."),
      );
    }
    errors
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trims_free_text() {
    let q = NewQuote::new("  To be  ", 1, " Hamlet\n", SourceKind::Book);
    assert_eq!(q.text, "To be");
    assert_eq!(q.source_name, "Hamlet");
    assert!(q.check().is_empty());
  }

  #[test]
  fn reports_every_shape_problem() {
    let errors = NewQuote::new(" ", 0, "", SourceKind::Other).check();
    assert_eq!(errors.get(FIELD_WEIGHT), &[WEIGHT_TOO_SMALL]);
    assert_eq!(errors.get(FIELD_TEXT), &[REQUIRED]);
    assert_eq!(errors.get(FIELD_SOURCE_NAME), &[REQUIRED]);
  }

  #[test]
  fn rejects_overlong_source_name() {
    let name = "x".repeat(MAX_SOURCE_NAME_LEN + 1);
    let errors = NewQuote::new("text", 1, name, SourceKind::Movie).check();
    assert!(errors.has(FIELD_SOURCE_NAME));
  }
}
