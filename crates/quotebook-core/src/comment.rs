//! Threaded comments and the per-user comment vote state machine.
//!
//! Threads are two levels deep: top-level comments and their direct replies.
//! Each comment carries denormalised `likes`/`dislikes` counters that must
//! always equal the number of `+1`/`-1` rows in the comment vote ledger. The
//! ledger holds at most one row per `(comment, user)`, so a user's relation to
//! a comment is one of three states, and every click is a transition between
//! them with fixed counter deltas (see [`CommentVoteState::click`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{REQUIRED, ValidationErrors};

pub const FIELD_TEXT: &str = "text";
pub const FIELD_PARENT_ID: &str = "parent_id";

// ─── Comments ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id: i64,
  pub quote_id:   i64,
  pub author_id:  i64,
  pub author:     String,
  pub text:       String,
  /// Set for replies; always points at a top-level comment of the same quote.
  pub parent_id:  Option<i64>,
  pub likes:      i64,
  pub dislikes:   i64,
  pub created_at: DateTime<Utc>,
}

/// A top-level comment and its direct replies, both newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentThread {
  pub comment: Comment,
  pub replies: Vec<Comment>,
}

/// Input to [`crate::store::QuoteStore::add_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub quote_id:  i64,
  pub author_id: i64,
  pub text:      String,
  /// Dropped by the store when it names a comment on another quote.
  pub parent_id: Option<i64>,
}

impl NewComment {
  pub fn new(quote_id: i64, author_id: i64, text: impl AsRef<str>) -> Self {
    Self {
      quote_id,
      author_id,
      text: text.as_ref().trim().to_owned(),
      parent_id: None,
    }
  }

  pub fn reply_to(mut self, parent_id: i64) -> Self {
    self.parent_id = Some(parent_id);
    self
  }

  pub fn check(&self) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if self.text.is_empty() {
      errors.add(FIELD_TEXT, REQUIRED);
    }
    errors
  }
}

// ─── Comment votes ───────────────────────────────────────────────────────────

/// A click on a comment's like or dislike button; also the stored vote value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentVoteValue {
  Like,
  Dislike,
}

impl CommentVoteValue {
  /// Value stored in the `value` column.
  pub fn as_i64(self) -> i64 {
    match self {
      Self::Like => 1,
      Self::Dislike => -1,
    }
  }

  pub fn from_i64(value: i64) -> Option<Self> {
    match value {
      1 => Some(Self::Like),
      -1 => Some(Self::Dislike),
      _ => None,
    }
  }
}

/// A user's current relation to a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentVoteState {
  #[default]
  NoVote,
  Liked,
  Disliked,
}

/// What a click does to the ledger row and to the comment counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
  pub next:           CommentVoteState,
  pub likes_delta:    i64,
  pub dislikes_delta: i64,
}

impl Transition {
  /// The ledger value after the transition; `None` means the row is removed.
  pub fn stored_value(&self) -> Option<CommentVoteValue> { self.next.value() }
}

impl CommentVoteState {
  pub fn from_value(value: Option<CommentVoteValue>) -> Self {
    match value {
      None => Self::NoVote,
      Some(CommentVoteValue::Like) => Self::Liked,
      Some(CommentVoteValue::Dislike) => Self::Disliked,
    }
  }

  pub fn value(self) -> Option<CommentVoteValue> {
    match self {
      Self::NoVote => None,
      Self::Liked => Some(CommentVoteValue::Like),
      Self::Disliked => Some(CommentVoteValue::Dislike),
    }
  }

  /// Clicking the same button again withdraws the vote; clicking the other
  /// button switches it.
  pub fn click(self, click: CommentVoteValue) -> Transition {
    use CommentVoteState::*;
    use CommentVoteValue::{Dislike, Like};

    let (next, likes_delta, dislikes_delta) = match (self, click) {
      (NoVote, Like) => (Liked, 1, 0),
      (NoVote, Dislike) => (Disliked, 0, 1),
      (Liked, Like) => (NoVote, -1, 0),
      (Disliked, Dislike) => (NoVote, 0, -1),
      (Liked, Dislike) => (Disliked, -1, 1),
      (Disliked, Like) => (Liked, 1, -1),
    };
    Transition { next, likes_delta, dislikes_delta }
  }
}

/// Result of [`crate::store::QuoteStore::vote_comment`].
#[derive(Debug, Clone, Serialize)]
pub struct CommentVoteOutcome {
  pub comment: Comment,
  pub state:   CommentVoteState,
}

#[cfg(test)]
mod tests {
  use super::{CommentVoteState::*, CommentVoteValue::*, *};

  #[test]
  fn transition_table() {
    let cases = [
      (NoVote, Like, Liked, 1, 0),
      (NoVote, Dislike, Disliked, 0, 1),
      (Liked, Like, NoVote, -1, 0),
      (Disliked, Dislike, NoVote, 0, -1),
      (Liked, Dislike, Disliked, -1, 1),
      (Disliked, Like, Liked, 1, -1),
    ];
    for (from, click, next, dl, dd) in cases {
      let t = from.click(click);
      assert_eq!(t, Transition { next, likes_delta: dl, dislikes_delta: dd });
    }
  }

  #[test]
  fn counters_follow_state_over_any_click_sequence() {
    // Walk every click sequence up to length 8 and check the running counters
    // always equal what the final single ledger row implies.
    for len in 0..=8u32 {
      for bits in 0..(1u32 << len) {
        let mut state = NoVote;
        let (mut likes, mut dislikes) = (0i64, 0i64);
        for i in 0..len {
          let click = if bits & (1 << i) == 0 { Like } else { Dislike };
          let t = state.click(click);
          likes += t.likes_delta;
          dislikes += t.dislikes_delta;
          state = t.next;
        }
        assert_eq!(likes, i64::from(state == Liked));
        assert_eq!(dislikes, i64::from(state == Disliked));
      }
    }
  }

  #[test]
  fn stored_value_roundtrip() {
    for value in [Like, Dislike] {
      assert_eq!(CommentVoteValue::from_i64(value.as_i64()), Some(value));
      assert_eq!(CommentVoteState::from_value(Some(value)).value(), Some(value));
    }
    assert_eq!(CommentVoteValue::from_i64(0), None);
  }

  #[test]
  fn blank_comment_is_rejected() {
    assert!(NewComment::new(1, 1, "   ").check().has(FIELD_TEXT));
    assert!(NewComment::new(1, 1, "nice").check().is_empty());
  }
}
