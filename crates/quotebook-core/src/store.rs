//! The `QuoteStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `quotebook-store-sqlite`). The HTTP layer depends on this abstraction, not
//! on any concrete backend.
//!
//! Every mutating method is one atomic unit: the check it performs and the
//! writes it makes either all happen or none do, and counters are only ever
//! adjusted in place next to the ledger row that justifies the change.

use std::future::Future;

use crate::{
  comment::{
    Comment, CommentThread, CommentVoteOutcome, CommentVoteValue, NewComment,
  },
  quote::{NewQuote, Quote},
  report::{Dashboard, Page, PopularQuery},
  source::Source,
  user::{Credentials, SessionRecord, User},
  vote::{Identity, Vote, VoteKind, VoteOutcome},
};

/// Backend errors that may wrap a domain rejection.
///
/// Lets callers tell "quote 7 does not exist" apart from "the disk is full"
/// without knowing the backend's error type.
pub trait StoreError: std::error::Error + Send + Sync + Sized + 'static {
  /// `Ok` with the domain error if this is one, otherwise `Err(self)`.
  fn into_domain(self) -> Result<crate::Error, Self>;
}

/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait QuoteStore: Send + Sync {
  type Error: StoreError;

  // ── Users & sessions ──────────────────────────────────────────────────

  /// Create an account. The username must pass
  /// [`check_username`](crate::user::check_username) and be unused.
  fn create_user(
    &self,
    username: String,
    password_hash: String,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_credentials(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  /// Remove an account. Quotes it created survive with `created_by` cleared;
  /// its comments and comment votes are removed, and counters of comments it
  /// had voted on are decremented accordingly.
  fn delete_user(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Start a new session with a fresh random key, optionally bound to a user.
  fn create_session(
    &self,
    user_id: Option<i64>,
  ) -> impl Future<Output = Result<SessionRecord, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    session_key: String,
  ) -> impl Future<Output = Result<Option<SessionRecord>, Self::Error>> + Send + '_;

  fn delete_session(
    &self,
    session_key: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Sources & quotes ──────────────────────────────────────────────────

  /// Validate and store a quote, creating its source on first use.
  ///
  /// Rejects with a validation error when the weight is below 1, the text is
  /// already used, or the named source already owns
  /// [`MAX_QUOTES_PER_SOURCE`](crate::quote::MAX_QUOTES_PER_SOURCE) quotes.
  fn submit_quote(
    &self,
    input: NewQuote,
  ) -> impl Future<Output = Result<Quote, Self::Error>> + Send + '_;

  /// Read a quote without counting a view.
  fn get_quote(
    &self,
    quote_id: i64,
  ) -> impl Future<Output = Result<Option<Quote>, Self::Error>> + Send + '_;

  /// Read a quote and count one view.
  fn view_quote(
    &self,
    quote_id: i64,
  ) -> impl Future<Output = Result<Option<Quote>, Self::Error>> + Send + '_;

  /// Pick a quote by weight (see [`crate::selection`]) and count one view.
  /// `None` when there are no quotes.
  fn view_random_quote(
    &self,
  ) -> impl Future<Output = Result<Option<Quote>, Self::Error>> + Send + '_;

  /// Delete a quote created by `user_id`, with its votes and comments.
  fn delete_quote(
    &self,
    quote_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_source(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Source>, Self::Error>> + Send + '_;

  // ── Votes ─────────────────────────────────────────────────────────────

  /// Record a vote unless `identity` already voted on this quote; in that
  /// case nothing changes and `recorded` is `false`.
  fn cast_vote(
    &self,
    quote_id: i64,
    kind: VoteKind,
    identity: Identity,
  ) -> impl Future<Output = Result<VoteOutcome, Self::Error>> + Send + '_;

  fn has_voted(
    &self,
    quote_id: i64,
    identity: Identity,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_votes(
    &self,
    quote_id: i64,
  ) -> impl Future<Output = Result<Vec<Vote>, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Store a comment. A parent on another quote (or a missing parent) is
  /// dropped; a parent that is itself a reply is replaced by its own parent.
  fn add_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    comment_id: i64,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Top-level comments of a quote with their replies, newest first.
  fn comment_threads(
    &self,
    quote_id: i64,
  ) -> impl Future<Output = Result<Vec<CommentThread>, Self::Error>> + Send + '_;

  /// Apply one like/dislike click by `user_id` to a comment.
  fn vote_comment(
    &self,
    comment_id: i64,
    user_id: i64,
    click: CommentVoteValue,
  ) -> impl Future<Output = Result<CommentVoteOutcome, Self::Error>> + Send + '_;

  /// Delete a comment written by `user_id` together with its replies.
  /// Returns the deleted comment.
  fn delete_comment(
    &self,
    comment_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  // ── Reports ───────────────────────────────────────────────────────────

  fn popular<'a>(
    &'a self,
    query: &'a PopularQuery,
  ) -> impl Future<Output = Result<Page<Quote>, Self::Error>> + Send + 'a;

  fn dashboard(
    &self,
  ) -> impl Future<Output = Result<Dashboard, Self::Error>> + Send + '_;
}
