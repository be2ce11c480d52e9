//! Anonymous like/dislike on quotes.

use axum::{
  Json,
  extract::{Path, State},
  response::{IntoResponse, Response},
};
use quotebook_core::{store::QuoteStore, vote::VoteKind};
use serde::Serialize;

use super::see_other;
use crate::{AppState, auth::Visitor, error::Error};

/// The vote buttons of a quote after a click.
#[derive(Debug, Serialize)]
pub struct VoteBlock {
  pub quote_id: i64,
  pub likes:    i64,
  pub dislikes: i64,
  pub voted:    bool,
}

pub async fn like<S>(
  State(state): State<AppState<S>>,
  Path(quote_id): Path<i64>,
  visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  vote(&state, quote_id, VoteKind::Like, visitor).await
}

pub async fn dislike<S>(
  State(state): State<AppState<S>>,
  Path(quote_id): Path<i64>,
  visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  vote(&state, quote_id, VoteKind::Dislike, visitor).await
}

async fn vote<S: QuoteStore>(
  state: &AppState<S>,
  quote_id: i64,
  kind: VoteKind,
  mut visitor: Visitor,
) -> Result<Response, Error> {
  state
    .store
    .get_quote(quote_id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;
  visitor.ensure_session(state.store.as_ref()).await?;

  let outcome = state
    .store
    .cast_vote(quote_id, kind, visitor.identity())
    .await
    .map_err(Error::from_store)?;

  if outcome.recorded {
    tracing::info!(quote_id, kind = kind.as_str(), "vote recorded");
  } else {
    tracing::debug!(quote_id, kind = kind.as_str(), "repeat vote ignored");
  }

  let res = if visitor.htmx {
    Json(VoteBlock {
      quote_id,
      likes: outcome.quote.likes,
      dislikes: outcome.quote.dislikes,
      voted: true,
    })
    .into_response()
  } else {
    see_other("/")
  };
  Ok(visitor.respond(&state.config, res))
}
