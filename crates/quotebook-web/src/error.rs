//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  extract::rejection::FormRejection,
  http::StatusCode,
  response::{IntoResponse, Redirect, Response},
};
use quotebook_core::{ValidationErrors, store::StoreError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("not found")]
  NotFound,
  #[error("permission denied")]
  Forbidden,
  /// Browser request by an anonymous visitor; sends them to the login page.
  #[error("login required")]
  LoginRequired { next: String },
  /// Fragment request (or the submit page) by an anonymous visitor.
  #[error("login required")]
  LoginPrompt,
  #[error("validation failed: {0}")]
  Validation(ValidationErrors),
  #[error("bad request: {0}")]
  BadRequest(String),
  /// Body could not be read as a form; answered with axum's own status.
  #[error(transparent)]
  Form(#[from] FormRejection),
  #[error("password hashing failed: {0}")]
  PasswordHash(String),
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Split a backend error into a domain rejection or an opaque failure.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    match e.into_domain() {
      Ok(domain) => domain.into(),
      Err(e) => Error::Store(Box::new(e)),
    }
  }
}

impl From<quotebook_core::Error> for Error {
  fn from(e: quotebook_core::Error) -> Self {
    use quotebook_core::Error as E;
    match e {
      E::QuoteNotFound(_) | E::CommentNotFound(_) | E::UserNotFound(_) => {
        Error::NotFound
      }
      E::NotQuoteCreator(_) | E::NotCommentAuthor(_) => Error::Forbidden,
      E::Validation(errors) => Error::Validation(errors),
    }
  }
}

impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self { Error::Validation(errors) }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
      Error::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
      Error::LoginRequired { next } => {
        Redirect::to(&format!("/login/?next={}", encode_query_value(&next)))
          .into_response()
      }
      Error::LoginPrompt => (
        StatusCode::UNAUTHORIZED,
        Json(json!({
          "detail": "Log in to continue.",
          "login": "/login/",
          "signup": "/signup/",
        })),
      )
        .into_response(),
      Error::Validation(errors) => {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(errors)).into_response()
      }
      Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
      Error::Form(rejection) => rejection.into_response(),
      Error::PasswordHash(msg) => {
        tracing::error!(error = %msg, "password hashing failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
          .into_response()
      }
      Error::Store(e) => {
        tracing::error!(error = %e, "store error");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
          .into_response()
      }
    }
  }
}

/// Percent-encode everything outside the unreserved set and `/`.
fn encode_query_value(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for b in s.bytes() {
    if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~' | b'/') {
      out.push(b as char);
    } else {
      out.push_str(&format!("%{b:02X}"));
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn domain_errors_map_to_statuses() {
    let status = |e: quotebook_core::Error| Error::from(e).into_response().status();
    assert_eq!(status(quotebook_core::Error::QuoteNotFound(1)), StatusCode::NOT_FOUND);
    assert_eq!(status(quotebook_core::Error::NotCommentAuthor(1)), StatusCode::FORBIDDEN);
    assert_eq!(
      status(ValidationErrors::single("text", "bad").into()),
      StatusCode::UNPROCESSABLE_ENTITY
    );
  }

  #[test]
  fn login_redirect_keeps_the_path() {
    let res = Error::LoginRequired { next: "/q/7/?a=b".into() }.into_response();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()["location"], "/login/?next=/q/7/%3Fa%3Db");
  }
}
