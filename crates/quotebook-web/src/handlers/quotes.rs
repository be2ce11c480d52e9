//! Submitting and deleting quotes.

use axum::{
  Form, Json,
  extract::{Path, State, rejection::FormRejection},
  response::Response,
};
use quotebook_core::{
  ValidationErrors,
  quote::{FIELD_SOURCE_NAME, FIELD_SOURCE_TYPE, FIELD_TEXT, FIELD_WEIGHT, NewQuote},
  source::SourceKind,
  store::QuoteStore,
  validation::{INVALID_CHOICE, NOT_AN_INTEGER, REQUIRED},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::see_other;
use crate::{AppState, auth::Visitor, error::Error};

/// The submission form as posted; parsed field by field so every problem is
/// reported at once.
#[derive(Debug, Default, Deserialize)]
pub struct QuoteForm {
  #[serde(default)]
  pub text:        String,
  #[serde(default)]
  pub weight:      String,
  #[serde(default)]
  pub source_name: String,
  #[serde(default)]
  pub source_type: String,
}

impl QuoteForm {
  fn parse(&self) -> Result<NewQuote, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let weight = self.weight.trim();
    let weight = if weight.is_empty() {
      errors.add(FIELD_WEIGHT, REQUIRED);
      None
    } else {
      match weight.parse::<i64>() {
        Ok(w) => Some(w),
        Err(_) => {
          errors.add(FIELD_WEIGHT, NOT_AN_INTEGER);
          None
        }
      }
    };

    let kind = self.source_type.trim();
    let kind = if kind.is_empty() {
      errors.add(FIELD_SOURCE_TYPE, REQUIRED);
      None
    } else {
      match kind.parse::<SourceKind>() {
        Ok(k) => Some(k),
        Err(_) => {
          errors.add(FIELD_SOURCE_TYPE, INVALID_CHOICE);
          None
        }
      }
    };

    // Placeholders only stand in while there are errors to report; a weight
    // of 1 passes the range check so it adds nothing of its own.
    let input = NewQuote::new(
      &self.text,
      weight.unwrap_or(1),
      &self.source_name,
      kind.unwrap_or_default(),
    );
    errors.merge(input.check());

    errors.into_result().map(|()| input)
  }
}

fn form_descriptor() -> Value {
  let kinds: Vec<&str> = SourceKind::ALL.iter().map(|k| k.as_str()).collect();
  json!({
    "fields": [FIELD_TEXT, FIELD_WEIGHT, FIELD_SOURCE_NAME, FIELD_SOURCE_TYPE],
    "source_types": kinds,
    "initial": { "weight": 1 },
  })
}

pub async fn add_form<S>(
  State(_state): State<AppState<S>>,
  visitor: Visitor,
) -> Result<Json<Value>, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  visitor.user.as_ref().ok_or(Error::LoginPrompt)?;
  Ok(Json(form_descriptor()))
}

pub async fn add<S>(
  State(state): State<AppState<S>>,
  visitor: Visitor,
  form: Result<Form<QuoteForm>, FormRejection>,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  let user = visitor.user.as_ref().ok_or(Error::LoginPrompt)?;
  let Form(form) = form?;
  let input = form.parse()?.created_by(user.user_id);

  let quote = state
    .store
    .submit_quote(input)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(
    quote_id = quote.quote_id,
    source = %quote.source.name,
    user_id = user.user_id,
    "quote submitted"
  );

  Ok(see_other("/"))
}

pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Path(quote_id): Path<i64>,
  visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  let user = visitor.require_user()?;
  state
    .store
    .delete_quote(quote_id, user.user_id)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(quote_id, user_id = user.user_id, "quote deleted");

  Ok(see_other("/"))
}
