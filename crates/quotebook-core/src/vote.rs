//! Quote votes and voter identity.
//!
//! A vote is cast at most once per `(quote, identity)`. Identities match
//! loosely: an existing vote blocks a new one when *either* the session key
//! *or* the IP address is equal. A visitor behind a shared address therefore
//! shares one vote per quote with everybody else on that address.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quote::Quote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
  Like,
  Dislike,
}

impl VoteKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Like => "like",
      Self::Dislike => "dislike",
    }
  }
}

impl fmt::Display for VoteKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Who is voting: a per-browser session token and/or the client address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub session_key: Option<String>,
  pub ip_address:  Option<String>,
}

impl Identity {
  pub fn new(
    session_key: impl Into<Option<String>>,
    ip_address: impl Into<Option<String>>,
  ) -> Self {
    Self { session_key: session_key.into(), ip_address: ip_address.into() }
  }

  /// An identity with neither part can never match an earlier vote.
  pub fn is_empty(&self) -> bool {
    self.session_key.is_none() && self.ip_address.is_none()
  }
}

/// One row of the vote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
  pub vote_id:    i64,
  pub quote_id:   i64,
  pub kind:       VoteKind,
  pub identity:   Identity,
  pub created_at: DateTime<Utc>,
}

/// Result of [`crate::store::QuoteStore::cast_vote`].
#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
  /// `false` when the identity had already voted and nothing changed.
  pub recorded: bool,
  /// The quote with its counters as of the end of the transaction.
  pub quote:    Quote,
}
