//! Read-only pages: the random quote, a single quote, the popular list and
//! the dashboard.

use axum::{
  Json,
  extract::{Path, Query, State},
  response::{IntoResponse, Response},
};
use quotebook_core::{
  comment::CommentThread,
  quote::Quote,
  report::{Page, PopularQuery, SortKey},
  source::SourceKind,
  store::QuoteStore,
  user::User,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::Visitor, error::Error};

/// Everything a quote page shows.
#[derive(Debug, Serialize)]
pub struct QuotePage {
  pub quote:    Option<Quote>,
  /// This visitor already voted on the quote.
  pub voted:    bool,
  pub comments: Vec<CommentThread>,
  pub user:     Option<User>,
}

async fn quote_page<S: QuoteStore>(
  state: &AppState<S>,
  visitor: &Visitor,
  quote: Option<Quote>,
) -> Result<QuotePage, Error> {
  let Some(quote) = quote else {
    return Ok(QuotePage {
      quote:    None,
      voted:    false,
      comments: Vec::new(),
      user:     visitor.user.clone(),
    });
  };

  let voted = state
    .store
    .has_voted(quote.quote_id, visitor.identity())
    .await
    .map_err(Error::from_store)?;
  let comments = state
    .store
    .comment_threads(quote.quote_id)
    .await
    .map_err(Error::from_store)?;

  Ok(QuotePage { quote: Some(quote), voted, comments, user: visitor.user.clone() })
}

pub async fn home<S>(
  State(state): State<AppState<S>>,
  mut visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  visitor.ensure_session(state.store.as_ref()).await?;
  let quote = state
    .store
    .view_random_quote()
    .await
    .map_err(Error::from_store)?;
  let page = quote_page(&state, &visitor, quote).await?;
  Ok(visitor.respond(&state.config, Json(page)))
}

pub async fn quote_detail<S>(
  State(state): State<AppState<S>>,
  Path(quote_id): Path<i64>,
  mut visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  let quote = state
    .store
    .view_quote(quote_id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;
  visitor.ensure_session(state.store.as_ref()).await?;
  let page = quote_page(&state, &visitor, Some(quote)).await?;
  Ok(visitor.respond(&state.config, Json(page)))
}

// ─── Popular ─────────────────────────────────────────────────────────────────

/// Raw query string; every field is parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct PopularParams {
  pub source: Option<String>,
  #[serde(rename = "type")]
  pub kind:   Option<String>,
  pub sort:   Option<String>,
  pub page:   Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PopularPage {
  #[serde(flatten)]
  pub page:   Page<Quote>,
  /// The filters as understood, for echoing back into the form.
  pub source: String,
  #[serde(rename = "type")]
  pub kind:   String,
  pub sort:   SortKey,
}

pub async fn popular<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<PopularParams>,
) -> Result<Json<PopularPage>, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  let per_page = state.config.page_size;
  let source = params.source.unwrap_or_default().trim().to_owned();
  let kind_raw = params.kind.unwrap_or_default().trim().to_owned();
  let sort = SortKey::parse_lenient(params.sort.as_deref());

  let kind = if kind_raw.is_empty() {
    None
  } else {
    match kind_raw.parse::<SourceKind>() {
      Ok(kind) => Some(kind),
      // No source has an unknown kind.
      Err(_) => {
        return Ok(Json(PopularPage {
          page: Page::empty(per_page),
          source,
          kind: kind_raw,
          sort,
        }));
      }
    }
  };

  let query = PopularQuery {
    source: (!source.is_empty()).then(|| source.clone()),
    kind,
    sort,
    page: params.page.as_deref().and_then(|p| p.trim().parse().ok()),
    per_page,
  };
  let page = state.store.popular(&query).await.map_err(Error::from_store)?;

  Ok(Json(PopularPage { page, source, kind: kind_raw, sort }))
}

pub async fn dashboard<S>(State(state): State<AppState<S>>) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  let dashboard = state.store.dashboard().await.map_err(Error::from_store)?;
  Ok(Json(dashboard).into_response())
}
