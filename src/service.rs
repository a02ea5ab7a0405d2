//! High-level sync operations between the GitHub API and the store

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::{
    client::GithubApi,
    domain::{FollowerRow, RepoRow, UserRecord, UserStatus},
    result::{RelayError, Result},
    store::Store,
};

/// Orchestrates API calls and store writes for one session
#[derive(Debug, Clone)]
pub struct SyncService {
    api: Arc<GithubApi>,
    store: Store,
}

impl SyncService {
    pub fn new(api: Arc<GithubApi>, store: Store) -> Self {
        Self { api, store }
    }

    /// Validate `login` on GitHub, cache the profile and mark it tracked
    #[instrument(skip(self))]
    pub async fn set_current_user(&self, login: &str) -> Result<UserRecord> {
        let user = self.api.get_user(login).await?;
        let canonical = user.login.clone();
        let id = user.id;

        self.store.upsert_user(user).await?;
        self.store.mark_user_tracked(id).await?;
        info!(login = %canonical, user_id = %id, "Tracking GitHub user");

        self.store
            .user_by_login(&canonical)
            .await?
            .ok_or_else(|| RelayError::general(format!("User '{canonical}' vanished after upsert")))
    }

    /// Refresh the repositories of a stored user, returning how many were written
    #[instrument(skip(self))]
    pub async fn sync_repos(&self, login: &str) -> Result<usize> {
        let owner_id = self.store.user_id_by_login(login).await?;
        let repos = self.api.user_repos(login).await?;
        let written = self.store.upsert_repos(owner_id, repos).await?;
        self.store.mark_last_sync_repos(owner_id).await?;
        debug!(written, "Repositories synced");
        Ok(written)
    }

    /// Refresh the followers of a stored user, returning how many were written
    #[instrument(skip(self))]
    pub async fn sync_followers(&self, login: &str) -> Result<usize> {
        let user_id = self.store.user_id_by_login(login).await?;
        let followers = self.api.user_followers(login).await?;
        let written = self.store.upsert_followers(user_id, followers).await?;
        self.store.mark_last_sync_followers(user_id).await?;
        debug!(written, "Followers synced");
        Ok(written)
    }

    pub async fn show_repos(&self, login: &str) -> Result<Vec<RepoRow>> {
        Ok(self.store.repos_by_owner(login).await?)
    }

    pub async fn show_followers(&self, login: &str) -> Result<Vec<FollowerRow>> {
        Ok(self.store.followers_of(login).await?)
    }

    /// Summarize what the store holds for `login`
    pub async fn user_status(&self, login: &str) -> Result<UserStatus> {
        let Some(record) = self.store.user_by_login(login).await? else {
            return Ok(UserStatus::missing());
        };

        let repos_count = self.store.count_repos(record.id).await?;
        let followers_count = self.store.count_followers(record.id).await?;
        Ok(UserStatus::from_record(&record, repos_count, followers_count))
    }
}
