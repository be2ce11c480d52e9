pub mod account;
pub mod comments;
pub mod pages;
pub mod quotes;
pub mod votes;

use axum::response::{IntoResponse, Redirect, Response};

/// 303 to a page of this site.
pub(crate) fn see_other(to: &str) -> Response { Redirect::to(to).into_response() }

pub(crate) fn quote_path(quote_id: i64) -> String { format!("/q/{quote_id}/") }
