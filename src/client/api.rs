//! GitHub REST transport: requests, pagination and error mapping

use chrono::{DateTime, Utc};
use compact_str::{CompactString, format_compact};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header::HeaderMap};
use serde::Deserialize;
use tracing::{debug, instrument, trace};
use url::Url;

use super::{
    config::ClientConfig,
    error::{ClientError, Result},
};
use crate::domain::{FollowerDto, RepositoryDto, UserDto};

const API_VERSION: &str = "2022-11-28";

/// Thin wrapper over `reqwest` for the endpoints the relay needs
#[derive(Debug)]
pub struct GithubApi {
    client: Client,
    config: ClientConfig,
}

/// Body GitHub sends with error statuses
#[derive(Debug, Deserialize)]
struct GithubApiError {
    message: CompactString,
}

impl GithubApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request.timeout)
            .user_agent(config.request.user_agent.as_str())
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self { client, config })
    }

    /// Fetch a single user profile, failing with `NotFound` for unknown logins
    #[instrument(skip(self))]
    pub async fn get_user(&self, login: &str) -> Result<UserDto> {
        let url = self.endpoint(&["users", login])?;
        self.get_json(url).await
    }

    /// Fetch every repository owned by the user
    #[instrument(skip(self))]
    pub async fn user_repos(&self, login: &str) -> Result<Vec<RepositoryDto>> {
        let url = self.endpoint(&["users", login, "repos"])?;
        let repos = self
            .paginate(url, &[("type", "owner"), ("sort", "full_name")])
            .await?;
        debug!(repo_count = repos.len(), "Successfully fetched repositories");
        Ok(repos)
    }

    /// Fetch every follower of the user
    #[instrument(skip(self))]
    pub async fn user_followers(&self, login: &str) -> Result<Vec<FollowerDto>> {
        let url = self.endpoint(&["users", login, "followers"])?;
        let followers = self.paginate(url, &[]).await?;
        debug!(follower_count = followers.len(), "Successfully fetched followers");
        Ok(followers)
    }

    /// Walk a page-numbered listing until an empty or short page
    async fn paginate<T>(&self, url: Url, params: &[(&str, &str)]) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let per_page = self.config.request.per_page;
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut page_url = url.clone();
            {
                let mut query = page_url.query_pairs_mut();
                for (key, value) in params {
                    query.append_pair(key, value);
                }
                query.append_pair("per_page", &per_page.to_string());
                query.append_pair("page", &page.to_string());
            }

            let batch: Vec<T> = self.get_json(page_url).await?;
            let fetched = batch.len();
            trace!(page, fetched, "Fetched page");
            items.extend(batch);

            if fetched == 0 || fetched < per_page as usize {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Join path segments onto the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|_| ClientError::invalid_url(self.config.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::invalid_url(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `url` and decode the JSON body
    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self.authenticated_request(url).send().await?;
        self.handle_response(response).await
    }

    /// GET with GitHub's media type, API version and optional bearer token
    fn authenticated_request(&self, url: Url) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);

        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Decode a success body, or map the status onto a `ClientError`
    async fn handle_response<T>(&self, response: Response) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url_path = response.url().path().to_string();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                debug!(path = %url_path, error = %e, "Failed to parse response body");
                ClientError::json_parse(url_path, "Failed to parse response", e)
            })
        } else {
            Err(error_from_status(status, &headers, &body, &url_path))
        }
    }
}

/// Map a non-success response onto a `ClientError`
fn error_from_status(status: StatusCode, headers: &HeaderMap, body: &str, path: &str) -> ClientError {
    let message = serde_json::from_str::<GithubApiError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.into());

    match status.as_u16() {
        401 => ClientError::Authentication,
        403 if rate_limit_exhausted(headers) => ClientError::rate_limit(rate_limit_reset(headers)),
        404 => ClientError::not_found(path),
        422 => ClientError::github_api(format_compact!("Validation Failed: {}", message)),
        429 => ClientError::rate_limit(rate_limit_reset(headers)),
        code => ClientError::github_api(format_compact!("HTTP {}: {}", code, message)),
    }
}

fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0")
}

fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;
    use crate::client::config::DEFAULT_BASE_URL;

    fn api(base_url: &str) -> GithubApi {
        GithubApi::new(ClientConfig::new(base_url, None)).unwrap()
    }

    #[test]
    fn endpoint_encodes_segments() {
        let url = api(DEFAULT_BASE_URL)
            .endpoint(&["users", "octo cat", "repos"])
            .unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/users/octo%20cat/repos");
    }

    #[test]
    fn endpoint_keeps_enterprise_prefix() {
        let url = api("https://ghe.example.com/api/v3/")
            .endpoint(&["users", "octocat"])
            .unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/users/octocat");
    }

    #[test]
    fn forbidden_with_exhausted_quota_is_rate_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let err = error_from_status(StatusCode::FORBIDDEN, &headers, "{}", "/users/x");
        match err {
            ClientError::RateLimit { reset_at } => {
                assert_eq!(reset_at.unwrap().timestamp(), 1_700_000_000)
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plain_forbidden_keeps_github_message() {
        let err = error_from_status(
            StatusCode::FORBIDDEN,
            &HeaderMap::new(),
            r#"{"message": "Resource not accessible"}"#,
            "/users/x",
        );
        assert_eq!(err.to_string(), "GitHub API error: HTTP 403: Resource not accessible");
    }

    #[test]
    fn not_found_is_detectable() {
        let err = error_from_status(StatusCode::NOT_FOUND, &HeaderMap::new(), "", "/users/ghost");
        assert!(err.is_not_found());
    }
}
