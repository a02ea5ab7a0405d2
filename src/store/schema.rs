//! Table definitions, applied idempotently at server start.

use rusqlite::Connection;

use super::error::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id                  INTEGER PRIMARY KEY,
    login               TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name                TEXT,
    html_url            TEXT,
    type                TEXT,
    company             TEXT,
    location            TEXT,
    created_at          TEXT,
    updated_at          TEXT,
    last_sync_repos     TEXT,
    last_sync_followers TEXT,
    is_tracked          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS repositories (
    id                INTEGER PRIMARY KEY,
    owner_id          INTEGER NOT NULL REFERENCES users(id),
    name              TEXT NOT NULL,
    full_name         TEXT NOT NULL,
    private           INTEGER NOT NULL,
    html_url          TEXT,
    description       TEXT,
    language          TEXT,
    forks_count       INTEGER,
    stargazers_count  INTEGER,
    watchers_count    INTEGER,
    open_issues_count INTEGER,
    is_fork           INTEGER NOT NULL,
    default_branch    TEXT,
    created_at        TEXT,
    updated_at        TEXT,
    pushed_at         TEXT
);

CREATE TABLE IF NOT EXISTS followers (
    followed_id INTEGER NOT NULL REFERENCES users(id),
    follower_id INTEGER NOT NULL REFERENCES users(id),
    PRIMARY KEY (followed_id, follower_id)
);

CREATE INDEX IF NOT EXISTS ix_users_login ON users(login);
CREATE INDEX IF NOT EXISTS ix_users_is_tracked ON users(is_tracked);
CREATE INDEX IF NOT EXISTS ix_repositories_owner_id ON repositories(owner_id);
CREATE INDEX IF NOT EXISTS ix_repositories_language ON repositories(language);
CREATE INDEX IF NOT EXISTS ix_followers_follower_id ON followers(follower_id);
";

pub(crate) fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
