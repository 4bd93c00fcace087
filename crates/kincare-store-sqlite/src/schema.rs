//! SQL schema for the Kincare SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// `advice`, `tasks` and `sessions` carry no foreign key to
/// `members`: records outlive the member they were written for.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    external_id  TEXT NOT NULL UNIQUE,
    nickname     TEXT,
    avatar_url   TEXT,
    full_name    TEXT,
    gender       TEXT,
    age          INTEGER,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS members (
    member_id      TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL REFERENCES users(user_id),
    name           TEXT NOT NULL,
    relation       TEXT NOT NULL,   -- '本人' marks the user themself
    gender         TEXT,
    age            INTEGER,
    height         REAL,
    weight         REAL,
    allergies      TEXT,
    meds           TEXT,
    special_status TEXT,
    tags           TEXT NOT NULL DEFAULT '{}',   -- JSON TagProfile
    created_at     TEXT NOT NULL
);

-- Advice is never updated after insert.
CREATE TABLE IF NOT EXISTS advice (
    advice_id   TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    member_id   TEXT NOT NULL,
    title       TEXT NOT NULL,
    reason      TEXT NOT NULL DEFAULT '',
    tags        TEXT NOT NULL DEFAULT '[]',
    detail      TEXT NOT NULL DEFAULT '[]',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    task_id     TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    member_id   TEXT NOT NULL,
    title       TEXT NOT NULL,
    freq        TEXT NOT NULL DEFAULT '',
    due         TEXT NOT NULL DEFAULT '',
    done        INTEGER NOT NULL DEFAULT 0,
    detail      TEXT NOT NULL DEFAULT '[]',
    logs        TEXT NOT NULL DEFAULT '[]',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id   TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    member_id    TEXT NOT NULL,
    title        TEXT NOT NULL,
    title_state  TEXT NOT NULL DEFAULT 'default',   -- 'default' | 'summarized'
    created_at   TEXT NOT NULL
);

-- Messages are append-only; they are only removed with their session.
CREATE TABLE IF NOT EXISTS messages (
    message_id  TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL REFERENCES sessions(session_id),
    role        TEXT NOT NULL,   -- 'user' | 'assistant'
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS members_user_idx     ON members(user_id);
CREATE INDEX IF NOT EXISTS advice_owner_idx     ON advice(user_id, member_id);
CREATE INDEX IF NOT EXISTS tasks_owner_idx      ON tasks(user_id, member_id);
CREATE INDEX IF NOT EXISTS sessions_user_idx    ON sessions(user_id);
CREATE INDEX IF NOT EXISTS messages_session_idx ON messages(session_id, created_at);

PRAGMA user_version = 1;
";
