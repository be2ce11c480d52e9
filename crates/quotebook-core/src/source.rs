//! The work a quote is attributed to.
//!
//! Sources are created on first reference by name and are never renamed or
//! re-categorised afterwards.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The category of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  Movie,
  Book,
  Series,
  #[default]
  Other,
}

impl SourceKind {
  pub const ALL: [SourceKind; 4] =
    [Self::Movie, Self::Book, Self::Series, Self::Other];

  /// The string stored in the `kind` column and accepted in query strings.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Movie => "movie",
      Self::Book => "book",
      Self::Series => "series",
      Self::Other => "other",
    }
  }
}

impl fmt::Display for SourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown source kind: {0:?}")]
pub struct UnknownSourceKind(pub String);

impl FromStr for SourceKind {
  type Err = UnknownSourceKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| UnknownSourceKind(s.to_owned()))
  }
}

/// A named work. Names are globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
  pub source_id: i64,
  pub name:      String,
  pub kind:      SourceKind,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_every_kind() {
    for kind in SourceKind::ALL {
      assert_eq!(kind.as_str().parse::<SourceKind>(), Ok(kind));
    }
    assert!("podcast".parse::<SourceKind>().is_err());
    assert!("".parse::<SourceKind>().is_err());
  }

  #[test]
  fn unknown_kind_names_the_input() {
    let err = "podcast".parse::<SourceKind>().unwrap_err();
    assert_eq!(err, UnknownSourceKind("podcast".into()));
    assert_eq!(err.to_string(), r#"unknown source kind: "podcast""#);
    let _: &dyn std::error::Error = &err;
  }
}
