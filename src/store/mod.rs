//! Relational cache of GitHub users, repositories and followers
//!
//! A [`Database`] is shared by the whole server and only knows where the data
//! lives. Every client session opens its own [`Store`], a single SQLite
//! connection whose statements run on tokio's blocking pool. Calls on one
//! store are serialized by a mutex; separate stores rely on SQLite locking
//! (WAL journal plus a busy timeout) for concurrent writers.

mod error;
mod schema;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use compact_str::CompactString;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument};

pub use error::{Result, StoreError};

use crate::{
    domain::{FollowerDto, FollowerRow, RepoRow, RepositoryDto, UserDto, UserRecord},
    id::UserId,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection factory for the relay database
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the tables if they are missing
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn init_schema(&self) -> Result<()> {
        let store = self.connect().await?;
        store.call(|conn| schema::create_schema(conn)).await?;
        debug!("Database schema ready");
        Ok(())
    }

    /// Open a dedicated connection for one client session
    pub async fn connect(&self) -> Result<Store> {
        let path = self.path.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&path)).await??;
        Ok(Store { conn: Arc::new(Mutex::new(conn)) })
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        // Best effort; Connection::open reports the real failure.
        if let Err(e) = std::fs::create_dir_all(parent) {
            debug!(dir = %parent.display(), error = %e, "Failed to create database directory");
        }
    }

    let conn = Connection::open(path)
        .map_err(|source| StoreError::Open { path: path.to_path_buf(), source })?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

/// One session's connection to the relay database
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Run `f` against the connection on the blocking pool
    async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await?
    }

    /// Insert a user or refresh every profile field of an existing one
    #[instrument(skip(self, user), fields(login = %user.login))]
    pub async fn upsert_user(&self, user: UserDto) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO users
                   (id, login, name, html_url, type, company, location, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                   login = excluded.login,
                   name = excluded.name,
                   html_url = excluded.html_url,
                   type = excluded.type,
                   company = excluded.company,
                   location = excluded.location,
                   created_at = excluded.created_at,
                   updated_at = excluded.updated_at",
                params![
                    user.id,
                    user.login.as_str(),
                    user.name.as_deref(),
                    user.html_url.as_deref(),
                    user.kind.as_deref(),
                    user.company.as_deref(),
                    user.location.as_deref(),
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Flag a user as one a client logged in with
    pub async fn mark_user_tracked(&self, id: UserId) -> Result<()> {
        self.call(move |conn| {
            conn.execute("UPDATE users SET is_tracked = 1 WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    pub async fn user_by_login(&self, login: &str) -> Result<Option<UserRecord>> {
        let login = CompactString::from(login);
        self.call(move |conn| {
            let record = conn
                .query_row(
                    "SELECT id, login, name, html_url, last_sync_repos, last_sync_followers,
                            is_tracked
                     FROM users WHERE login = ?1",
                    params![login.as_str()],
                    |row| {
                        Ok(UserRecord {
                            id: row.get(0)?,
                            login: row.get::<_, String>(1)?.into(),
                            name: row.get::<_, Option<String>>(2)?.map(Into::into),
                            html_url: row.get::<_, Option<String>>(3)?.map(Into::into),
                            last_sync_repos: row.get(4)?,
                            last_sync_followers: row.get(5)?,
                            is_tracked: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    /// Resolve a stored login to its GitHub id
    pub async fn user_id_by_login(&self, login: &str) -> Result<UserId> {
        let login = CompactString::from(login);
        self.call(move |conn| {
            conn.query_row(
                "SELECT id FROM users WHERE login = ?1",
                params![login.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::unknown_user(login))
        })
        .await
    }

    /// Upsert a batch of repositories for one owner, returning how many were written
    #[instrument(skip(self, repos), fields(owner_id = %owner_id, repo_count = repos.len()))]
    pub async fn upsert_repos(&self, owner_id: UserId, repos: Vec<RepositoryDto>) -> Result<usize> {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO repositories
                       (id, owner_id, name, full_name, private, html_url, description, language,
                        forks_count, stargazers_count, watchers_count, open_issues_count, is_fork,
                        default_branch, created_at, updated_at, pushed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                     ON CONFLICT(id) DO UPDATE SET
                       owner_id = excluded.owner_id,
                       name = excluded.name,
                       full_name = excluded.full_name,
                       private = excluded.private,
                       html_url = excluded.html_url,
                       description = excluded.description,
                       language = excluded.language,
                       forks_count = excluded.forks_count,
                       stargazers_count = excluded.stargazers_count,
                       watchers_count = excluded.watchers_count,
                       open_issues_count = excluded.open_issues_count,
                       is_fork = excluded.is_fork,
                       default_branch = excluded.default_branch,
                       created_at = excluded.created_at,
                       updated_at = excluded.updated_at,
                       pushed_at = excluded.pushed_at",
                )?;
                for repo in &repos {
                    stmt.execute(params![
                        repo.id,
                        owner_id,
                        repo.name.as_str(),
                        repo.full_name.as_str(),
                        repo.private,
                        repo.html_url.as_deref(),
                        repo.description.as_deref(),
                        repo.language.as_deref(),
                        repo.forks_count,
                        repo.stargazers_count,
                        repo.watchers_count,
                        repo.open_issues_count,
                        repo.fork,
                        repo.default_branch.as_deref(),
                        repo.created_at,
                        repo.updated_at,
                        repo.pushed_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(repos.len())
        })
        .await
    }

    pub async fn mark_last_sync_repos(&self, id: UserId) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "UPDATE users SET last_sync_repos = ?1 WHERE id = ?2",
                params![Utc::now(), id],
            )?;
            Ok(())
        })
        .await
    }

    /// Stored repositories of `login`, most starred first
    pub async fn repos_by_owner(&self, login: &str) -> Result<Vec<RepoRow>> {
        let login = CompactString::from(login);
        self.call(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT r.name, r.language, r.stargazers_count
                 FROM repositories r
                 JOIN users u ON u.id = r.owner_id
                 WHERE u.login = ?1
                 ORDER BY r.stargazers_count DESC, r.name ASC",
            )?;
            let rows = stmt
                .query_map(params![login.as_str()], |row| {
                    Ok(RepoRow {
                        name: row.get::<_, String>(0)?.into(),
                        language: row.get::<_, Option<String>>(1)?.map(Into::into),
                        stars: row.get::<_, Option<u32>>(2)?.unwrap_or(0),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    /// Record `followers` as following `followed_id`, returning how many were written
    ///
    /// Followers are stored as minimal users (id, login, url). A profile that is
    /// already cached keeps its other fields.
    #[instrument(skip(self, followers), fields(followed_id = %followed_id, follower_count = followers.len()))]
    pub async fn upsert_followers(
        &self,
        followed_id: UserId,
        followers: Vec<FollowerDto>,
    ) -> Result<usize> {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut upsert_user = tx.prepare_cached(
                    "INSERT INTO users (id, login, html_url) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET
                       login = excluded.login,
                       html_url = excluded.html_url",
                )?;
                let mut insert_relation = tx.prepare_cached(
                    "INSERT OR IGNORE INTO followers (followed_id, follower_id) VALUES (?1, ?2)",
                )?;
                for follower in &followers {
                    upsert_user.execute(params![
                        follower.id,
                        follower.login.as_str(),
                        follower.html_url.as_deref(),
                    ])?;
                    insert_relation.execute(params![followed_id, follower.id])?;
                }
            }
            tx.commit()?;
            Ok(followers.len())
        })
        .await
    }

    pub async fn mark_last_sync_followers(&self, id: UserId) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "UPDATE users SET last_sync_followers = ?1 WHERE id = ?2",
                params![Utc::now(), id],
            )?;
            Ok(())
        })
        .await
    }

    /// Stored followers of `login`, alphabetically
    pub async fn followers_of(&self, login: &str) -> Result<Vec<FollowerRow>> {
        let login = CompactString::from(login);
        self.call(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT u2.login, u2.html_url
                 FROM followers f
                 JOIN users u1 ON u1.id = f.followed_id
                 JOIN users u2 ON u2.id = f.follower_id
                 WHERE u1.login = ?1
                 ORDER BY u2.login ASC",
            )?;
            let rows = stmt
                .query_map(params![login.as_str()], |row| {
                    Ok(FollowerRow {
                        login: row.get::<_, String>(0)?.into(),
                        html_url: row.get::<_, Option<String>>(1)?.map(Into::into),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn count_repos(&self, owner_id: UserId) -> Result<u64> {
        self.call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM repositories WHERE owner_id = ?1",
                params![owner_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    pub async fn count_followers(&self, followed_id: UserId) -> Result<u64> {
        self.call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM followers WHERE followed_id = ?1",
                params![followed_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::id::RepoId;

    async fn store() -> (TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("relay.db"));
        db.init_schema().await.unwrap();
        let store = db.connect().await.unwrap();
        (dir, store)
    }

    fn user(id: u64, login: &str) -> UserDto {
        UserDto {
            id: UserId::new(id),
            login: login.into(),
            name: Some("The Octocat".into()),
            kind: Some("User".into()),
            ..UserDto::default()
        }
    }

    fn repo(id: u64, name: &str, language: Option<&str>, stars: u32) -> RepositoryDto {
        RepositoryDto {
            id: RepoId::new(id),
            name: name.into(),
            full_name: format!("octocat/{name}").into(),
            language: language.map(Into::into),
            stargazers_count: stars,
            ..RepositoryDto::default()
        }
    }

    fn follower(id: u64, login: &str) -> FollowerDto {
        FollowerDto {
            id: UserId::new(id),
            login: login.into(),
            html_url: Some(format!("https://github.com/{login}").into()),
        }
    }

    #[tokio::test]
    async fn upsert_user_then_lookup_is_case_insensitive() {
        let (_dir, store) = store().await;
        store.upsert_user(user(1, "octocat")).await.unwrap();

        let record = store.user_by_login("OctoCat").await.unwrap().unwrap();
        assert_eq!(record.id, UserId::new(1));
        assert_eq!(record.name.as_deref(), Some("The Octocat"));
        assert!(!record.is_tracked);
        assert!(record.last_sync_repos.is_none());

        store.mark_user_tracked(record.id).await.unwrap();
        let record = store.user_by_login("octocat").await.unwrap().unwrap();
        assert!(record.is_tracked);
    }

    #[tokio::test]
    async fn unknown_login_has_no_id() {
        let (_dir, store) = store().await;
        assert!(store.user_by_login("ghost").await.unwrap().is_none());
        assert!(matches!(
            store.user_id_by_login("ghost").await,
            Err(StoreError::UnknownUser { login }) if login == "ghost"
        ));
    }

    #[tokio::test]
    async fn repos_are_upserted_and_ordered_by_stars_then_name() {
        let (_dir, store) = store().await;
        store.upsert_user(user(1, "octocat")).await.unwrap();

        let written = store
            .upsert_repos(
                UserId::new(1),
                vec![
                    repo(10, "zeta", Some("Rust"), 5),
                    repo(11, "alpha", None, 5),
                    repo(12, "beta", Some("Go"), 40),
                ],
            )
            .await
            .unwrap();
        assert_eq!(written, 3);

        // Second sync updates in place instead of duplicating.
        store
            .upsert_repos(UserId::new(1), vec![repo(10, "zeta", Some("Rust"), 50)])
            .await
            .unwrap();

        let rows = store.repos_by_owner("octocat").await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["zeta", "beta", "alpha"]);
        assert_eq!(rows[0].stars, 50);
        assert_eq!(rows[2].language, None);
        assert_eq!(store.count_repos(UserId::new(1)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn followers_keep_existing_profiles() {
        let (_dir, store) = store().await;
        store.upsert_user(user(1, "octocat")).await.unwrap();
        store.upsert_user(user(2, "hubot")).await.unwrap();

        let written = store
            .upsert_followers(UserId::new(1), vec![follower(3, "zoe"), follower(2, "hubot")])
            .await
            .unwrap();
        assert_eq!(written, 2);

        // Re-syncing the same relation is a no-op.
        store
            .upsert_followers(UserId::new(1), vec![follower(2, "hubot")])
            .await
            .unwrap();

        let rows = store.followers_of("octocat").await.unwrap();
        let logins: Vec<_> = rows.iter().map(|r| r.login.as_str()).collect();
        assert_eq!(logins, ["hubot", "zoe"]);
        assert_eq!(store.count_followers(UserId::new(1)).await.unwrap(), 2);

        let hubot = store.user_by_login("hubot").await.unwrap().unwrap();
        assert_eq!(hubot.name.as_deref(), Some("The Octocat"));
    }

    #[tokio::test]
    async fn sync_marks_are_recorded() {
        let (_dir, store) = store().await;
        store.upsert_user(user(1, "octocat")).await.unwrap();

        let before = Utc::now();
        store.mark_last_sync_followers(UserId::new(1)).await.unwrap();
        let at = Utc.with_ymd_and_hms(2025, 11, 16, 12, 48, 0).unwrap();
        store
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET last_sync_repos = ?1 WHERE id = 1",
                    params![at],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let record = store.user_by_login("octocat").await.unwrap().unwrap();
        assert_eq!(record.last_sync_repos, Some(at));
        assert!(record.last_sync_followers.unwrap() >= before);
    }

    #[tokio::test]
    async fn sessions_share_data_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("nested").join("relay.db"));
        db.init_schema().await.unwrap();

        let first = db.connect().await.unwrap();
        let second = db.connect().await.unwrap();
        first.upsert_user(user(7, "mona")).await.unwrap();

        assert_eq!(second.user_id_by_login("mona").await.unwrap(), UserId::new(7));
    }

    #[tokio::test]
    async fn uncreatable_directory_surfaces_as_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let db = Database::new(blocker.join("relay.db"));
        assert!(matches!(db.connect().await, Err(StoreError::Open { .. })));
    }
}
