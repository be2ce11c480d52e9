//! Comments: posting, liking, disliking and deleting.

use axum::{
  Form, Json,
  extract::{Path, State, rejection::FormRejection},
  response::{IntoResponse, Response},
};
use quotebook_core::{
  ValidationErrors,
  comment::{CommentVoteValue, FIELD_PARENT_ID, NewComment},
  store::QuoteStore,
  validation::NOT_AN_INTEGER,
};
use serde::Deserialize;

use super::{quote_path, see_other};
use crate::{AppState, auth::Visitor, error::Error};

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
  #[serde(default)]
  pub text:      String,
  /// Empty means a top-level comment.
  #[serde(default)]
  pub parent_id: String,
}

impl CommentForm {
  fn parse(&self, quote_id: i64, author_id: i64) -> Result<NewComment, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut input = NewComment::new(quote_id, author_id, &self.text);

    let parent = self.parent_id.trim();
    if !parent.is_empty() {
      match parent.parse::<i64>() {
        Ok(id) => input = input.reply_to(id),
        Err(_) => errors.add(FIELD_PARENT_ID, NOT_AN_INTEGER),
      }
    }

    errors.merge(input.check());
    errors.into_result().map(|()| input)
  }
}

async fn threads_response<S: QuoteStore>(
  state: &AppState<S>,
  quote_id: i64,
) -> Result<Response, Error> {
  let threads = state
    .store
    .comment_threads(quote_id)
    .await
    .map_err(Error::from_store)?;
  Ok(Json(threads).into_response())
}

pub async fn add<S>(
  State(state): State<AppState<S>>,
  Path(quote_id): Path<i64>,
  mut visitor: Visitor,
  form: Result<Form<CommentForm>, FormRejection>,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  visitor.next = quote_path(quote_id);
  let user = visitor.require_user()?;
  let Form(form) = form?;

  state
    .store
    .get_quote(quote_id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;

  let input = form.parse(quote_id, user.user_id)?;
  let comment = state
    .store
    .add_comment(input)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(
    comment_id = comment.comment_id,
    quote_id,
    parent_id = ?comment.parent_id,
    user_id = user.user_id,
    "comment added"
  );

  if visitor.htmx {
    threads_response(&state, quote_id).await
  } else {
    Ok(see_other(&quote_path(quote_id)))
  }
}

pub async fn like<S>(
  State(state): State<AppState<S>>,
  Path(comment_id): Path<i64>,
  visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  click(&state, comment_id, CommentVoteValue::Like, &visitor).await
}

pub async fn dislike<S>(
  State(state): State<AppState<S>>,
  Path(comment_id): Path<i64>,
  visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  click(&state, comment_id, CommentVoteValue::Dislike, &visitor).await
}

async fn click<S: QuoteStore>(
  state: &AppState<S>,
  comment_id: i64,
  value: CommentVoteValue,
  visitor: &Visitor,
) -> Result<Response, Error> {
  let user = visitor.require_user()?;
  let outcome = state
    .store
    .vote_comment(comment_id, user.user_id, value)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(
    comment_id,
    user_id = user.user_id,
    state = ?outcome.state,
    "comment vote"
  );

  if visitor.htmx {
    Ok(Json(outcome).into_response())
  } else {
    Ok(see_other(&quote_path(outcome.comment.quote_id)))
  }
}

pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Path(comment_id): Path<i64>,
  visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  let user = visitor.require_user()?;
  let deleted = state
    .store
    .delete_comment(comment_id, user.user_id)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(comment_id, quote_id = deleted.quote_id, "comment deleted");

  if visitor.htmx {
    threads_response(&state, deleted.quote_id).await
  } else {
    Ok(see_other(&quote_path(deleted.quote_id)))
  }
}
