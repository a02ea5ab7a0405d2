use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::Deserialize;

use crate::id::{RepoId, UserId};

/// A user profile as returned by `GET /users/{login}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDto {
    pub id: UserId,
    pub login: CompactString,
    pub name: Option<CompactString>,
    pub html_url: Option<CompactString>,
    #[serde(rename = "type")]
    pub kind: Option<CompactString>,
    pub company: Option<CompactString>,
    pub location: Option<CompactString>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryDto {
    pub id: RepoId,
    pub name: CompactString,
    pub full_name: CompactString,
    #[serde(default)]
    pub private: bool,
    pub html_url: Option<CompactString>,
    pub description: Option<CompactString>,
    pub language: Option<CompactString>,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub watchers_count: u32,
    #[serde(default)]
    pub open_issues_count: u32,
    #[serde(default)]
    pub fork: bool,
    pub default_branch: Option<CompactString>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowerDto {
    pub id: UserId,
    pub login: CompactString,
    pub html_url: Option<CompactString>,
}

/// A row of the `users` table
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub login: CompactString,
    pub name: Option<CompactString>,
    pub html_url: Option<CompactString>,
    pub last_sync_repos: Option<DateTime<Utc>>,
    pub last_sync_followers: Option<DateTime<Utc>>,
    pub is_tracked: bool,
}

/// Compact repository listing: name, language, stars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRow {
    pub name: CompactString,
    pub language: Option<CompactString>,
    pub stars: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerRow {
    pub login: CompactString,
    pub html_url: Option<CompactString>,
}

/// Summary of what the store holds for one login
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStatus {
    pub exists: bool,
    pub login: Option<CompactString>,
    pub name: Option<CompactString>,
    pub last_sync_repos: Option<DateTime<Utc>>,
    pub last_sync_followers: Option<DateTime<Utc>>,
    pub repos_count: u64,
    pub followers_count: u64,
}

impl UserStatus {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn from_record(record: &UserRecord, repos_count: u64, followers_count: u64) -> Self {
        Self {
            exists: true,
            login: Some(record.login.clone()),
            name: record.name.clone(),
            last_sync_repos: record.last_sync_repos,
            last_sync_followers: record.last_sync_followers,
            repos_count,
            followers_count,
        }
    }

    /// Last-sync timestamp for the given resource
    pub fn last_sync(&self, kind: SyncKind) -> Option<DateTime<Utc>> {
        match kind {
            SyncKind::Repos => self.last_sync_repos,
            SyncKind::Followers => self.last_sync_followers,
        }
    }
}

/// The two resources a session can refresh from GitHub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Repos,
    Followers,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Repos => "repos",
            SyncKind::Followers => "followers",
        }
    }
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_dto_defaults_missing_counters() {
        let json = r#"{
            "id": 1296269,
            "name": "Hello-World",
            "full_name": "octocat/Hello-World",
            "language": null,
            "created_at": "2011-01-26T19:01:12Z"
        }"#;
        let repo: RepositoryDto = serde_json::from_str(json).unwrap();

        assert_eq!(repo.id, RepoId::new(1296269));
        assert_eq!(repo.stargazers_count, 0);
        assert!(!repo.private);
        assert!(!repo.fork);
        assert!(repo.language.is_none());
        assert_eq!(
            repo.created_at.unwrap().to_rfc3339(),
            "2011-01-26T19:01:12+00:00"
        );
    }

    #[test]
    fn user_dto_maps_type_field() {
        let json = r#"{"id": 1, "login": "octocat", "type": "User", "name": null}"#;
        let user: UserDto = serde_json::from_str(json).unwrap();

        assert_eq!(user.kind.as_deref(), Some("User"));
        assert!(user.name.is_none());
    }

    #[test]
    fn missing_status_reports_nothing_stored() {
        let status = UserStatus::missing();
        assert!(!status.exists);
        assert_eq!(status.repos_count, 0);
        assert!(status.last_sync(SyncKind::Followers).is_none());
    }
}
