//! [`SqliteStore`], the SQLite implementation of [`QuoteStore`].

use std::path::Path;

use chrono::{Duration, Utc};
use quotebook_core::{
  Error as CoreError,
  comment::{
    Comment, CommentThread, CommentVoteOutcome, CommentVoteState,
    CommentVoteValue, NewComment,
  },
  quote::{
    DUPLICATE_TEXT, FIELD_SOURCE_NAME, FIELD_TEXT, MAX_QUOTES_PER_SOURCE,
    NewQuote, Quote, SOURCE_FULL,
  },
  report::{
    Dashboard, Page, PageWindow, PopularQuery, SortKey, SourceLikes,
    TOP_SOURCES_LIMIT, Totals,
  },
  selection,
  source::Source,
  store::QuoteStore,
  user::{
    Credentials, FIELD_USERNAME, SESSION_TTL_DAYS, SessionRecord,
    USERNAME_TAKEN, User, check_username,
  },
  validation::ValidationErrors,
  vote::{Identity, Vote, VoteKind, VoteOutcome},
};
use rand::RngCore as _;
use rusqlite::{
  Connection, ErrorCode, OptionalExtension as _, TransactionBehavior,
};

use crate::{
  Error, Result,
  encode::{
    COMMENT_SELECT, QUOTE_SELECT, RawComment, RawQuote, RawSession, RawUser,
    RawVote, decode_source_kind, encode_dt,
  },
  schema::{MIGRATE_V1_TO_V2, SCHEMA},
};

/// Result of work done inside a transaction closure: the outer `Result` is a
/// database failure, the inner one a domain rejection (which rolls back).
type TxOutcome<T> = tokio_rusqlite::Result<std::result::Result<T, CoreError>>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quotebook store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  pub(crate) async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let version: i64 =
          conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 1 {
          migrate_v1_to_v2(conn)?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn migrate_v1_to_v2(conn: &mut Connection) -> rusqlite::Result<()> {
  let tx = conn.transaction()?;
  tx.execute_batch(MIGRATE_V1_TO_V2)?;

  let names = {
    let mut stmt = tx.prepare("SELECT source_id, name FROM sources")?;
    let rows = stmt
      .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    rows
  };
  for (source_id, name) in names {
    tx.execute(
      "UPDATE sources SET name_folded = ?1 WHERE source_id = ?2",
      rusqlite::params![fold(&name), source_id],
    )?;
  }

  tx.commit()
}

// ─── Connection-level helpers ────────────────────────────────────────────────

fn now() -> String { encode_dt(Utc::now()) }

/// Case folding for source search. SQLite's `LIKE` only folds ASCII.
fn fold(s: &str) -> String { s.to_lowercase() }

/// 256 random bits, hex encoded.
fn new_session_key() -> String {
  let mut bytes = [0u8; 32];
  rand::rngs::OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// Escape `%`, `_` and the escape character itself for `LIKE … ESCAPE '\'`.
fn escape_like(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

fn load_quote(conn: &Connection, quote_id: i64) -> rusqlite::Result<Option<RawQuote>> {
  conn
    .query_row(
      &format!("{QUOTE_SELECT} WHERE q.quote_id = ?1"),
      rusqlite::params![quote_id],
      RawQuote::from_row,
    )
    .optional()
}

fn load_comment(
  conn: &Connection,
  comment_id: i64,
) -> rusqlite::Result<Option<RawComment>> {
  conn
    .query_row(
      &format!("{COMMENT_SELECT} WHERE c.comment_id = ?1"),
      rusqlite::params![comment_id],
      RawComment::from_row,
    )
    .optional()
}

fn exists(conn: &Connection, sql: &str, id: i64) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(sql, rusqlite::params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

/// Translate constraint failures raised while inserting a quote back into
/// the form errors the pre-checks would have produced.
fn quote_constraint_error(e: &rusqlite::Error) -> Option<ValidationErrors> {
  match e {
    rusqlite::Error::SqliteFailure(f, Some(msg))
      if f.code == ErrorCode::ConstraintViolation =>
    {
      if msg.contains("source quota exceeded") {
        Some(ValidationErrors::single(FIELD_SOURCE_NAME, SOURCE_FULL))
      } else if msg.contains("quotes.text") {
        Some(ValidationErrors::single(FIELD_TEXT, DUPLICATE_TEXT))
      } else {
        None
      }
    }
    _ => None,
  }
}

fn sort_clause(sort: SortKey) -> &'static str {
  match sort {
    SortKey::Likes => "q.likes DESC, q.views DESC, q.quote_id DESC",
    SortKey::Views => "q.views DESC, q.likes DESC, q.quote_id DESC",
    SortKey::Created => "q.created_at DESC, q.quote_id DESC",
  }
}

// ─── QuoteStore impl ─────────────────────────────────────────────────────────

impl QuoteStore for SqliteStore {
  type Error = Error;

  // ── Users & sessions ──────────────────────────────────────────────────────

  async fn create_user(&self, username: String, password_hash: String) -> Result<User> {
    let username = username.trim().to_owned();
    check_username(&username)
      .into_result()
      .map_err(CoreError::from)?;

    let created_at = now();
    let outcome: std::result::Result<RawUser, CoreError> = self
      .conn
      .call(move |conn| -> TxOutcome<RawUser> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let taken = tx
          .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            rusqlite::params![username],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(Err(ValidationErrors::single(FIELD_USERNAME, USERNAME_TAKEN).into()));
        }

        tx.execute(
          "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![username, password_hash, created_at],
        )?;
        let user_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Ok(RawUser { user_id, username, created_at }))
      })
      .await?;

    outcome?.into_user()
  }

  async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, username, created_at FROM users WHERE user_id = ?1",
            rusqlite::params![user_id],
            |row| {
              Ok(RawUser {
                user_id:    row.get(0)?,
                username:   row.get(1)?,
                created_at: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn find_credentials(&self, username: String) -> Result<Option<Credentials>> {
    let raw: Option<(RawUser, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, username, created_at, password_hash
             FROM users WHERE username = ?1",
            rusqlite::params![username.trim()],
            |row| {
              Ok((
                RawUser {
                  user_id:    row.get(0)?,
                  username:   row.get(1)?,
                  created_at: row.get(2)?,
                },
                row.get(3)?,
              ))
            },
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(user, password_hash)| {
        Ok(Credentials { user: user.into_user()?, password_hash })
      })
      .transpose()
  }

  async fn delete_user(&self, user_id: i64) -> Result<()> {
    let outcome = self
      .conn
      .call(move |conn| -> TxOutcome<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !exists(&tx, "SELECT 1 FROM users WHERE user_id = ?1", user_id)? {
          return Ok(Err(CoreError::UserNotFound(user_id)));
        }

        // Take this user's votes back out of the counters before the cascade
        // removes the ledger rows.
        tx.execute(
          "UPDATE comments SET
             likes = likes - (
               SELECT COUNT(*) FROM comment_votes v
               WHERE v.comment_id = comments.comment_id
                 AND v.user_id = ?1 AND v.value = 1),
             dislikes = dislikes - (
               SELECT COUNT(*) FROM comment_votes v
               WHERE v.comment_id = comments.comment_id
                 AND v.user_id = ?1 AND v.value = -1)
           WHERE comment_id IN (
             SELECT comment_id FROM comment_votes WHERE user_id = ?1)",
          rusqlite::params![user_id],
        )?;
        tx.execute("DELETE FROM users WHERE user_id = ?1", rusqlite::params![user_id])?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    Ok(outcome?)
  }

  async fn create_session(&self, user_id: Option<i64>) -> Result<SessionRecord> {
    let created = Utc::now();
    let raw = RawSession {
      session_key: new_session_key(),
      user_id,
      created_at: encode_dt(created),
      expires_at: encode_dt(created + Duration::days(SESSION_TTL_DAYS)),
    };

    let key = raw.session_key.clone();
    let at = raw.created_at.clone();
    let expires = raw.expires_at.clone();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
          "DELETE FROM sessions WHERE expires_at <= ?1",
          rusqlite::params![at],
        )?;
        tx.execute(
          "INSERT INTO sessions (session_key, user_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![key, user_id, at, expires],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    raw.into_session()
  }

  async fn get_session(&self, session_key: String) -> Result<Option<SessionRecord>> {
    let at = now();
    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT session_key, user_id, created_at, expires_at
             FROM sessions
             WHERE session_key = ?1 AND expires_at > ?2",
            rusqlite::params![session_key, at],
            |row| {
              Ok(RawSession {
                session_key: row.get(0)?,
                user_id:     row.get(1)?,
                created_at:  row.get(2)?,
                expires_at:  row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn delete_session(&self, session_key: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM sessions WHERE session_key = ?1",
          rusqlite::params![session_key],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Sources & quotes ──────────────────────────────────────────────────────

  async fn submit_quote(&self, input: NewQuote) -> Result<Quote> {
    let created_at = now();

    let outcome = self
      .conn
      .call(move |conn| -> TxOutcome<RawQuote> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut errors = input.check();

        if !input.text.is_empty() {
          let duplicate = tx
            .query_row(
              "SELECT 1 FROM quotes WHERE text = ?1",
              rusqlite::params![input.text],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if duplicate {
            errors.add(FIELD_TEXT, DUPLICATE_TEXT);
          }
        }

        let existing: Option<(i64, i64)> = tx
          .query_row(
            "SELECT s.source_id, COUNT(q.quote_id)
             FROM sources s
             LEFT JOIN quotes q ON q.source_id = s.source_id
             WHERE s.name = ?1
             GROUP BY s.source_id",
            rusqlite::params![input.source_name],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        if existing.is_some_and(|(_, count)| count >= MAX_QUOTES_PER_SOURCE) {
          errors.add(FIELD_SOURCE_NAME, SOURCE_FULL);
        }

        if !errors.is_empty() {
          return Ok(Err(errors.into()));
        }

        // First submission under a name fixes the category.
        let source_id = match existing {
          Some((id, _)) => id,
          None => {
            tx.execute(
              "INSERT INTO sources (name, name_folded, kind) VALUES (?1, ?2, ?3)",
              rusqlite::params![
                input.source_name,
                fold(&input.source_name),
                input.source_kind.as_str(),
              ],
            )?;
            tx.last_insert_rowid()
          }
        };

        let inserted = tx.execute(
          "INSERT INTO quotes (text, source_id, weight, created_at, created_by)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            input.text,
            source_id,
            input.weight,
            created_at,
            input.created_by,
          ],
        );
        if let Err(e) = &inserted {
          if let Some(errors) = quote_constraint_error(e) {
            return Ok(Err(errors.into()));
          }
        }
        inserted?;

        let quote_id = tx.last_insert_rowid();
        let raw = load_quote(&tx, quote_id)?;
        tx.commit()?;

        Ok(raw.ok_or(CoreError::QuoteNotFound(quote_id)))
      })
      .await?;

    outcome?.into_quote()
  }

  async fn get_quote(&self, quote_id: i64) -> Result<Option<Quote>> {
    let raw = self
      .conn
      .call(move |conn| Ok(load_quote(conn, quote_id)?))
      .await?;

    raw.map(RawQuote::into_quote).transpose()
  }

  async fn view_quote(&self, quote_id: i64) -> Result<Option<Quote>> {
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let touched = tx.execute(
          "UPDATE quotes SET views = views + 1 WHERE quote_id = ?1",
          rusqlite::params![quote_id],
        )?;
        if touched == 0 {
          return Ok(None);
        }
        let raw = load_quote(&tx, quote_id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawQuote::into_quote).transpose()
  }

  async fn view_random_quote(&self) -> Result<Option<Quote>> {
    let raw = self
      .conn
      .call(|conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidates = {
          let mut stmt = tx.prepare("SELECT quote_id, weight FROM quotes")?;
          stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let Some(quote_id) = selection::pick(&candidates, &mut rand::thread_rng())
        else {
          return Ok(None);
        };

        tx.execute(
          "UPDATE quotes SET views = views + 1 WHERE quote_id = ?1",
          rusqlite::params![quote_id],
        )?;
        let raw = load_quote(&tx, quote_id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawQuote::into_quote).transpose()
  }

  async fn delete_quote(&self, quote_id: i64, user_id: i64) -> Result<()> {
    let outcome = self
      .conn
      .call(move |conn| -> TxOutcome<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let created_by: Option<Option<i64>> = tx
          .query_row(
            "SELECT created_by FROM quotes WHERE quote_id = ?1",
            rusqlite::params![quote_id],
            |row| row.get(0),
          )
          .optional()?;

        match created_by {
          None => return Ok(Err(CoreError::QuoteNotFound(quote_id))),
          Some(creator) if creator != Some(user_id) => {
            return Ok(Err(CoreError::NotQuoteCreator(quote_id)));
          }
          Some(_) => {}
        }

        tx.execute("DELETE FROM quotes WHERE quote_id = ?1", rusqlite::params![quote_id])?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    Ok(outcome?)
  }

  async fn get_source(&self, name: String) -> Result<Option<Source>> {
    let raw: Option<(i64, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT source_id, name, kind FROM sources WHERE name = ?1",
            rusqlite::params![name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(source_id, name, kind)| {
        Ok(Source { source_id, name, kind: decode_source_kind(&kind)? })
      })
      .transpose()
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  async fn cast_vote(
    &self,
    quote_id: i64,
    kind: VoteKind,
    identity: Identity,
  ) -> Result<VoteOutcome> {
    let created_at = now();

    let outcome = self
      .conn
      .call(move |conn| -> TxOutcome<(bool, RawQuote)> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !exists(&tx, "SELECT 1 FROM quotes WHERE quote_id = ?1", quote_id)? {
          return Ok(Err(CoreError::QuoteNotFound(quote_id)));
        }

        let already: bool = tx.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM votes
             WHERE quote_id = ?1 AND (session_key = ?2 OR ip_address = ?3))",
          rusqlite::params![quote_id, identity.session_key, identity.ip_address],
          |row| row.get(0),
        )?;

        if !already {
          tx.execute(
            "INSERT INTO votes (quote_id, kind, session_key, ip_address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
              quote_id,
              kind.as_str(),
              identity.session_key,
              identity.ip_address,
              created_at,
            ],
          )?;
          let bump = match kind {
            VoteKind::Like => "UPDATE quotes SET likes = likes + 1 WHERE quote_id = ?1",
            VoteKind::Dislike => {
              "UPDATE quotes SET dislikes = dislikes + 1 WHERE quote_id = ?1"
            }
          };
          tx.execute(bump, rusqlite::params![quote_id])?;
        }

        let raw = load_quote(&tx, quote_id)?;
        tx.commit()?;

        Ok(raw.map(|r| (!already, r)).ok_or(CoreError::QuoteNotFound(quote_id)))
      })
      .await?;

    let (recorded, raw) = outcome?;
    Ok(VoteOutcome { recorded, quote: raw.into_quote()? })
  }

  async fn has_voted(&self, quote_id: i64, identity: Identity) -> Result<bool> {
    let voted = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM votes
             WHERE quote_id = ?1 AND (session_key = ?2 OR ip_address = ?3))",
          rusqlite::params![quote_id, identity.session_key, identity.ip_address],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(voted)
  }

  async fn list_votes(&self, quote_id: i64) -> Result<Vec<Vote>> {
    let raws: Vec<RawVote> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT vote_id, quote_id, kind, session_key, ip_address, created_at
           FROM votes WHERE quote_id = ?1 ORDER BY vote_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![quote_id], |row| {
            Ok(RawVote {
              vote_id:     row.get(0)?,
              quote_id:    row.get(1)?,
              kind:        row.get(2)?,
              session_key: row.get(3)?,
              ip_address:  row.get(4)?,
              created_at:  row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVote::into_vote).collect()
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn add_comment(&self, input: NewComment) -> Result<Comment> {
    input.check().into_result().map_err(CoreError::from)?;
    let created_at = now();

    let outcome = self
      .conn
      .call(move |conn| -> TxOutcome<RawComment> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !exists(&tx, "SELECT 1 FROM quotes WHERE quote_id = ?1", input.quote_id)? {
          return Ok(Err(CoreError::QuoteNotFound(input.quote_id)));
        }
        if !exists(&tx, "SELECT 1 FROM users WHERE user_id = ?1", input.author_id)? {
          return Ok(Err(CoreError::UserNotFound(input.author_id)));
        }

        let parent_id = match input.parent_id {
          None => None,
          Some(pid) => tx
            .query_row(
              "SELECT quote_id, parent_id FROM comments WHERE comment_id = ?1",
              rusqlite::params![pid],
              |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<i64>>(1)?)),
            )
            .optional()?
            .filter(|(quote_id, _)| *quote_id == input.quote_id)
            .map(|(_, grandparent)| grandparent.unwrap_or(pid)),
        };

        tx.execute(
          "INSERT INTO comments (quote_id, user_id, text, parent_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            input.quote_id,
            input.author_id,
            input.text,
            parent_id,
            created_at,
          ],
        )?;
        let comment_id = tx.last_insert_rowid();
        let raw = load_comment(&tx, comment_id)?;
        tx.commit()?;

        Ok(raw.ok_or(CoreError::CommentNotFound(comment_id)))
      })
      .await?;

    outcome?.into_comment()
  }

  async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>> {
    let raw = self
      .conn
      .call(move |conn| Ok(load_comment(conn, comment_id)?))
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn comment_threads(&self, quote_id: i64) -> Result<Vec<CommentThread>> {
    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{COMMENT_SELECT}
           WHERE c.quote_id = ?1
           ORDER BY c.created_at DESC, c.comment_id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![quote_id], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let comments: Vec<Comment> = raws
      .into_iter()
      .map(RawComment::into_comment)
      .collect::<Result<_>>()?;

    // Rows arrive newest first, so pushing in order keeps both levels sorted.
    let (top, replies): (Vec<Comment>, Vec<Comment>) =
      comments.into_iter().partition(|c| c.parent_id.is_none());
    let mut threads: Vec<CommentThread> = top
      .into_iter()
      .map(|comment| CommentThread { comment, replies: Vec::new() })
      .collect();
    for reply in replies {
      if let Some(thread) = threads
        .iter_mut()
        .find(|t| Some(t.comment.comment_id) == reply.parent_id)
      {
        thread.replies.push(reply);
      }
    }

    Ok(threads)
  }

  async fn vote_comment(
    &self,
    comment_id: i64,
    user_id: i64,
    click: CommentVoteValue,
  ) -> Result<CommentVoteOutcome> {
    let created_at = now();

    let outcome = self
      .conn
      .call(move |conn| -> TxOutcome<(RawComment, CommentVoteState)> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !exists(&tx, "SELECT 1 FROM comments WHERE comment_id = ?1", comment_id)? {
          return Ok(Err(CoreError::CommentNotFound(comment_id)));
        }
        if !exists(&tx, "SELECT 1 FROM users WHERE user_id = ?1", user_id)? {
          return Ok(Err(CoreError::UserNotFound(user_id)));
        }

        let current: Option<i64> = tx
          .query_row(
            "SELECT value FROM comment_votes WHERE comment_id = ?1 AND user_id = ?2",
            rusqlite::params![comment_id, user_id],
            |row| row.get(0),
          )
          .optional()?;

        let state =
          CommentVoteState::from_value(current.and_then(CommentVoteValue::from_i64));
        let transition = state.click(click);

        match (current, transition.stored_value()) {
          (None, Some(value)) => {
            tx.execute(
              "INSERT INTO comment_votes (comment_id, user_id, value, created_at)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![comment_id, user_id, value.as_i64(), created_at],
            )?;
          }
          (Some(_), Some(value)) => {
            tx.execute(
              "UPDATE comment_votes SET value = ?3
               WHERE comment_id = ?1 AND user_id = ?2",
              rusqlite::params![comment_id, user_id, value.as_i64()],
            )?;
          }
          (Some(_), None) => {
            tx.execute(
              "DELETE FROM comment_votes WHERE comment_id = ?1 AND user_id = ?2",
              rusqlite::params![comment_id, user_id],
            )?;
          }
          (None, None) => {}
        }

        tx.execute(
          "UPDATE comments
           SET likes = likes + ?2, dislikes = dislikes + ?3
           WHERE comment_id = ?1",
          rusqlite::params![
            comment_id,
            transition.likes_delta,
            transition.dislikes_delta,
          ],
        )?;

        let raw = load_comment(&tx, comment_id)?;
        tx.commit()?;

        Ok(
          raw
            .map(|r| (r, transition.next))
            .ok_or(CoreError::CommentNotFound(comment_id)),
        )
      })
      .await?;

    let (raw, state) = outcome?;
    Ok(CommentVoteOutcome { comment: raw.into_comment()?, state })
  }

  async fn delete_comment(&self, comment_id: i64, user_id: i64) -> Result<Comment> {
    let outcome = self
      .conn
      .call(move |conn| -> TxOutcome<RawComment> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(raw) = load_comment(&tx, comment_id)? else {
          return Ok(Err(CoreError::CommentNotFound(comment_id)));
        };
        if raw.author_id != user_id {
          return Ok(Err(CoreError::NotCommentAuthor(comment_id)));
        }

        // Replies go with it through ON DELETE CASCADE.
        tx.execute(
          "DELETE FROM comments WHERE comment_id = ?1",
          rusqlite::params![comment_id],
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    outcome?.into_comment()
  }

  // ── Reports ───────────────────────────────────────────────────────────────

  async fn popular(&self, query: &PopularQuery) -> Result<Page<Quote>> {
    let pattern = query
      .source
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(|s| format!("%{}%", escape_like(&fold(s))));
    let kind = query.kind.map(|k| k.as_str());
    let order = sort_clause(query.sort);
    let requested = query.page;
    let per_page = query.per_page;

    let (raws, window, total): (Vec<RawQuote>, PageWindow, i64) = self
      .conn
      .call(move |conn| {
        let filter = "
          WHERE (?1 IS NULL OR s.name_folded LIKE ?1 ESCAPE '\\')
            AND (?2 IS NULL OR s.kind = ?2)";

        let total: i64 = conn.query_row(
          &format!(
            "SELECT COUNT(*) FROM quotes q
             JOIN sources s ON s.source_id = q.source_id
             {filter}"
          ),
          rusqlite::params![pattern, kind],
          |row| row.get(0),
        )?;

        let window = PageWindow::resolve(requested, total, per_page);

        let mut stmt = conn.prepare(&format!(
          "{QUOTE_SELECT}
           {filter}
           ORDER BY {order}
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![pattern, kind, window.limit, window.offset],
            RawQuote::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, window, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawQuote::into_quote)
      .collect::<Result<Vec<_>>>()?;
    Ok(Page::new(items, window, total))
  }

  async fn dashboard(&self) -> Result<Dashboard> {
    let dashboard = self
      .conn
      .call(|conn| {
        let mut totals: Totals = conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(views), 0),
                  COALESCE(SUM(likes), 0),
                  COALESCE(SUM(dislikes), 0)
           FROM quotes",
          [],
          |row| {
            Ok(Totals {
              quotes:   row.get(0)?,
              views:    row.get(1)?,
              likes:    row.get(2)?,
              dislikes: row.get(3)?,
              sources:  0,
            })
          },
        )?;
        totals.sources =
          conn.query_row("SELECT COUNT(*) FROM sources", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
          "SELECT s.name, SUM(q.likes) AS total_likes
           FROM quotes q
           JOIN sources s ON s.source_id = q.source_id
           GROUP BY s.source_id
           ORDER BY total_likes DESC, s.name ASC
           LIMIT ?1",
        )?;
        let top_sources = stmt
          .query_map(rusqlite::params![TOP_SOURCES_LIMIT], |row| {
            Ok(SourceLikes { name: row.get(0)?, total_likes: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Dashboard { totals, top_sources })
      })
      .await?;

    Ok(dashboard)
  }
}
