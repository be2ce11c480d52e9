//! Error types for `quotebook-core`.

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Domain rejections shared by every store backend.
#[derive(Debug, Error)]
pub enum Error {
  #[error("quote not found: {0}")]
  QuoteNotFound(i64),

  #[error("comment not found: {0}")]
  CommentNotFound(i64),

  #[error("user not found: {0}")]
  UserNotFound(i64),

  #[error("quote {0} was not created by this user")]
  NotQuoteCreator(i64),

  #[error("comment {0} was not written by this user")]
  NotCommentAuthor(i64),

  #[error("validation failed: {0}")]
  Validation(ValidationErrors),
}

impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self { Self::Validation(errors) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
