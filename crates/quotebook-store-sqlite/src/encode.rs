//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 UTC strings with fixed microsecond
//! precision, so ordering by the text column is chronological. Enumerations
//! are stored as their lowercase names.

use chrono::{DateTime, SecondsFormat, Utc};
use quotebook_core::{
  comment::Comment,
  quote::Quote,
  source::{Source, SourceKind},
  user::{SessionRecord, User},
  vote::{Identity, Vote, VoteKind},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_source_kind(s: &str) -> Result<SourceKind> {
  s.parse().map_err(|e: quotebook_core::source::UnknownSourceKind| {
    Error::Decode(e.to_string())
  })
}

pub fn decode_vote_kind(s: &str) -> Result<VoteKind> {
  match s {
    "like" => Ok(VoteKind::Like),
    "dislike" => Ok(VoteKind::Dislike),
    other => Err(Error::Decode(format!("unknown vote kind: {other:?}"))),
  }
}

// ─── Column lists ────────────────────────────────────────────────────────────

/// Columns read by [`RawQuote::from_row`], in order.
pub const QUOTE_SELECT: &str = "
  SELECT q.quote_id, q.text, q.weight, q.views, q.likes, q.dislikes,
         q.created_at, q.created_by, s.source_id, s.name, s.kind
  FROM quotes q
  JOIN sources s ON s.source_id = q.source_id";

/// Columns read by [`RawComment::from_row`], in order.
pub const COMMENT_SELECT: &str = "
  SELECT c.comment_id, c.quote_id, c.user_id, u.username, c.text,
         c.parent_id, c.likes, c.dislikes, c.created_at
  FROM comments c
  JOIN users u ON u.user_id = c.user_id";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `quotes` row joined with its source.
pub struct RawQuote {
  pub quote_id:    i64,
  pub text:        String,
  pub weight:      i64,
  pub views:       i64,
  pub likes:       i64,
  pub dislikes:    i64,
  pub created_at:  String,
  pub created_by:  Option<i64>,
  pub source_id:   i64,
  pub source_name: String,
  pub source_kind: String,
}

impl RawQuote {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      quote_id:    row.get(0)?,
      text:        row.get(1)?,
      weight:      row.get(2)?,
      views:       row.get(3)?,
      likes:       row.get(4)?,
      dislikes:    row.get(5)?,
      created_at:  row.get(6)?,
      created_by:  row.get(7)?,
      source_id:   row.get(8)?,
      source_name: row.get(9)?,
      source_kind: row.get(10)?,
    })
  }

  pub fn into_quote(self) -> Result<Quote> {
    Ok(Quote {
      quote_id:   self.quote_id,
      text:       self.text,
      source:     Source {
        source_id: self.source_id,
        name:      self.source_name,
        kind:      decode_source_kind(&self.source_kind)?,
      },
      weight:     self.weight,
      views:      self.views,
      likes:      self.likes,
      dislikes:   self.dislikes,
      created_at: decode_dt(&self.created_at)?,
      created_by: self.created_by,
    })
  }
}

/// Raw values read from a `comments` row joined with its author.
pub struct RawComment {
  pub comment_id: i64,
  pub quote_id:   i64,
  pub author_id:  i64,
  pub author:     String,
  pub text:       String,
  pub parent_id:  Option<i64>,
  pub likes:      i64,
  pub dislikes:   i64,
  pub created_at: String,
}

impl RawComment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id: row.get(0)?,
      quote_id:   row.get(1)?,
      author_id:  row.get(2)?,
      author:     row.get(3)?,
      text:       row.get(4)?,
      parent_id:  row.get(5)?,
      likes:      row.get(6)?,
      dislikes:   row.get(7)?,
      created_at: row.get(8)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id: self.comment_id,
      quote_id:   self.quote_id,
      author_id:  self.author_id,
      author:     self.author,
      text:       self.text,
      parent_id:  self.parent_id,
      likes:      self.likes,
      dislikes:   self.dislikes,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `users` row (without the hash).
pub struct RawUser {
  pub user_id:    i64,
  pub username:   String,
  pub created_at: String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    self.user_id,
      username:   self.username,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawSession {
  pub session_key: String,
  pub user_id:     Option<i64>,
  pub created_at:  String,
  pub expires_at:  String,
}

impl RawSession {
  pub fn into_session(self) -> Result<SessionRecord> {
    Ok(SessionRecord {
      session_key: self.session_key,
      user_id:     self.user_id,
      created_at:  decode_dt(&self.created_at)?,
      expires_at:  decode_dt(&self.expires_at)?,
    })
  }
}

pub struct RawVote {
  pub vote_id:     i64,
  pub quote_id:    i64,
  pub kind:        String,
  pub session_key: Option<String>,
  pub ip_address:  Option<String>,
  pub created_at:  String,
}

impl RawVote {
  pub fn into_vote(self) -> Result<Vote> {
    Ok(Vote {
      vote_id:    self.vote_id,
      quote_id:   self.quote_id,
      kind:       decode_vote_kind(&self.kind)?,
      identity:   Identity::new(self.session_key, self.ip_address),
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let b = Utc.timestamp_opt(1_700_000_000, 5_000).unwrap();
    let c = Utc.timestamp_opt(1_700_000_001, 0).unwrap();
    let (ea, eb, ec) = (encode_dt(a), encode_dt(b), encode_dt(c));
    assert!(ea < eb && eb < ec, "{ea} {eb} {ec}");
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn unknown_enum_values_are_decode_errors() {
    assert!(matches!(decode_source_kind("radio"), Err(Error::Decode(_))));
    assert!(matches!(decode_vote_kind("meh"), Err(Error::Decode(_))));
    assert_eq!(decode_vote_kind("like").unwrap(), VoteKind::Like);
  }
}
