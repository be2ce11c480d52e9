//! SQL schema for the Quotebook SQLite store.
//!
//! Executed once at connection startup. Migrations are gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

-- Anonymous visitors have a session with a NULL user_id.
CREATE TABLE IF NOT EXISTS sessions (
    session_key TEXT PRIMARY KEY,
    user_id     INTEGER REFERENCES users(user_id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

-- name_folded is the Unicode-lowercased name, used for searching.
CREATE TABLE IF NOT EXISTS sources (
    source_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE CHECK (name <> ''),
    name_folded TEXT NOT NULL,
    kind        TEXT NOT NULL CHECK (kind IN ('movie', 'book', 'series', 'other'))
);

-- weight is left unconstrained; values below 1 are clamped when sampling.
CREATE TABLE IF NOT EXISTS quotes (
    quote_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    text       TEXT NOT NULL UNIQUE CHECK (text <> ''),
    source_id  INTEGER NOT NULL REFERENCES sources(source_id) ON DELETE CASCADE,
    weight     INTEGER NOT NULL DEFAULT 1,
    views      INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
    likes      INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
    dislikes   INTEGER NOT NULL DEFAULT 0 CHECK (dislikes >= 0),
    created_at TEXT NOT NULL,
    created_by INTEGER REFERENCES users(user_id) ON DELETE SET NULL
);

-- Row-level backstop for the per-source quota checked by submit_quote.
CREATE TRIGGER IF NOT EXISTS quotes_source_quota
BEFORE INSERT ON quotes
WHEN (SELECT COUNT(*) FROM quotes WHERE source_id = NEW.source_id) >= 3
BEGIN
    SELECT RAISE(ABORT, 'source quota exceeded');
END;

-- Append-only; rows leave only with their quote.
CREATE TABLE IF NOT EXISTS votes (
    vote_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    quote_id    INTEGER NOT NULL REFERENCES quotes(quote_id) ON DELETE CASCADE,
    kind        TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
    session_key TEXT,
    ip_address  TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    quote_id   INTEGER NOT NULL REFERENCES quotes(quote_id) ON DELETE CASCADE,
    user_id    INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    text       TEXT NOT NULL CHECK (text <> ''),
    parent_id  INTEGER REFERENCES comments(comment_id) ON DELETE CASCADE,
    likes      INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
    dislikes   INTEGER NOT NULL DEFAULT 0 CHECK (dislikes >= 0),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comment_votes (
    comment_vote_id INTEGER PRIMARY KEY AUTOINCREMENT,
    comment_id      INTEGER NOT NULL REFERENCES comments(comment_id) ON DELETE CASCADE,
    user_id         INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    value           INTEGER NOT NULL CHECK (value IN (1, -1)),
    created_at      TEXT NOT NULL,
    UNIQUE (comment_id, user_id)
);

CREATE INDEX IF NOT EXISTS quotes_source_created_idx ON quotes(source_id, created_at);
CREATE INDEX IF NOT EXISTS quotes_likes_idx          ON quotes(likes);
CREATE INDEX IF NOT EXISTS votes_quote_session_idx   ON votes(quote_id, session_key);
CREATE INDEX IF NOT EXISTS votes_quote_ip_idx        ON votes(quote_id, ip_address);
CREATE INDEX IF NOT EXISTS comments_quote_created_idx ON comments(quote_id, created_at);
CREATE INDEX IF NOT EXISTS comments_parent_idx       ON comments(parent_id);
CREATE INDEX IF NOT EXISTS sessions_user_idx         ON sessions(user_id);
CREATE INDEX IF NOT EXISTS sessions_expires_idx      ON sessions(expires_at);

PRAGMA user_version = 2;
";

/// Brings a version 1 database up to version 2. Old sessions get an empty
/// expiry, which sorts before every timestamp, so they lapse at once.
/// `sources.name_folded` is backfilled from Rust afterwards.
pub const MIGRATE_V1_TO_V2: &str = "
ALTER TABLE sessions ADD COLUMN expires_at TEXT NOT NULL DEFAULT '';
ALTER TABLE sources ADD COLUMN name_folded TEXT NOT NULL DEFAULT '';
";
