pub mod types;

pub use types::{PrDetail, PrState, PullRequestSummary, Repo};

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::fetch::FallbackFetcher;

const API_BASE: &str = "https://api.github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";

const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const CLIENT_IDENT: &str = "pr-fetcher/0.1";

/// Timeout for the simple single-call operations (issues, readme, file).
const SIMPLE_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the pull-request listing, which feeds the fallback path.
const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Filenames probed for a repository README, fixed order, first match wins.
const README_CANDIDATES: [&str; 4] = ["README.md", "README.rst", "README.txt", "README"];

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("GitHub token is not a valid header value")]
    InvalidToken,

    #[error("no open pull requests found")]
    EmptyListing,

    #[error("index {index} is out of range for a listing of {len} pull requests")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Fetch(#[from] crate::fetch::FetchError),
}

/// Client for the GitHub REST and raw-content hosts. Immutable after
/// construction, so it can be shared across concurrently dispatched
/// operations without locking.
pub struct GitHubClient {
    api_base: String,
    raw_base: String,
    headers: HeaderMap,
    client: Client,
    fetcher: FallbackFetcher,
}

impl GitHubClient {
    pub fn new(config: &Config, allow_insecure_fallback: bool) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_IDENT));
        if let Some(token) = config.github_token() {
            let mut value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|_| GitHubError::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let fetcher = FallbackFetcher::new(allow_insecure_fallback);
        debug!(strategies = ?fetcher.strategy_names(), "configured fetch strategies");

        Ok(Self {
            api_base: API_BASE.to_string(),
            raw_base: RAW_BASE.to_string(),
            headers,
            client: Client::builder().build()?,
            fetcher,
        })
    }

    /// Override the API and raw-content hosts.
    #[cfg(test)]
    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        raw_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.raw_base = raw_base.into();
        self
    }

    /// List pull requests for a repository, most recently updated first.
    /// One GET; on any failure the whole listing fails. Never returns a
    /// partial list.
    #[instrument(skip(self, repo), fields(repo = %repo.full_name()))]
    pub async fn list_pull_requests(
        &self,
        repo: &Repo,
        state: &str,
        per_page: u32,
    ) -> Result<Vec<PullRequestSummary>, GitHubError> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_base, repo.owner, repo.name);
        debug!(state, per_page, "listing pull requests");
        let per_page = per_page.to_string();
        let items: Vec<PullItem> = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(&[
                ("state", state),
                ("per_page", per_page.as_str()),
                ("sort", "updated"),
                ("direction", "desc"),
            ])
            .timeout(LISTING_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(count = items.len(), "received pull request listing");
        Ok(items.into_iter().map(PullItem::into_summary).collect())
    }

    /// Resolve a ONE-BASED position in the current open-PR listing to a
    /// full PR detail payload, fetched through the fallback chain.
    ///
    /// `index` is a position in the freshly fetched listing (1 = most
    /// recently updated open PR), not a PR number.
    #[instrument(skip(self, repo), fields(repo = %repo.full_name()))]
    pub async fn specified_pr(&self, repo: &Repo, index: usize) -> Result<PrDetail, GitHubError> {
        let all_prs = self.list_pull_requests(repo, "open", 30).await?;
        if all_prs.is_empty() {
            return Err(GitHubError::EmptyListing);
        }

        let number = index
            .checked_sub(1)
            .and_then(|i| all_prs.get(i))
            .map(|pr| pr.number)
            .ok_or(GitHubError::IndexOutOfRange {
                index,
                len: all_prs.len(),
            })?;
        debug!(pr_number = number, "resolved listing position to PR number");

        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_base, repo.owner, repo.name, number
        );
        let fetched = self.fetcher.fetch(&url, &self.headers).await?;

        Ok(PrDetail {
            latest_pr: fetched.payload,
            method_used: fetched.method.to_string(),
            all_prs,
        })
    }

    /// Fetch the raw issue list for a repository. `per_page` is capped at
    /// the API maximum of 100.
    #[instrument(skip(self, repo), fields(repo = %repo.full_name()))]
    pub async fn repository_issues(
        &self,
        repo: &Repo,
        state: &str,
        per_page: u32,
    ) -> Result<Value, GitHubError> {
        let url = format!("{}/repos/{}/{}/issues", self.api_base, repo.owner, repo.name);
        debug!(state, per_page, "fetching issues");
        let per_page = per_page.min(100).to_string();
        let issues = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(&[("state", state), ("per_page", per_page.as_str())])
            .timeout(SIMPLE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(issues)
    }

    /// Fetch the repository README from the raw-content host, probing the
    /// candidate filenames in fixed order. Transport errors on one
    /// candidate are swallowed and the next is tried; None when all four
    /// miss. "Not found" and "network failure" are indistinguishable here.
    #[instrument(skip(self, repo), fields(repo = %repo.full_name()))]
    pub async fn repository_readme(&self, repo: &Repo, branch: &str) -> Option<String> {
        for filename in README_CANDIDATES {
            let url = format!(
                "{}/{}/{}/{}/{}",
                self.raw_base, repo.owner, repo.name, branch, filename
            );
            match self.client.get(&url).timeout(SIMPLE_TIMEOUT).send().await {
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(text) => {
                        debug!(filename, "README candidate found");
                        return Some(text);
                    }
                    Err(err) => debug!(filename, error = %err, "failed to read README body"),
                },
                Ok(response) => {
                    debug!(filename, status = %response.status(), "README candidate missing");
                }
                Err(err) => debug!(filename, error = %err, "README candidate fetch failed"),
            }
        }
        None
    }

    /// Fetch one file through the contents endpoint and decode it as
    /// UTF-8 text. Any non-success status, unexpected encoding, or decode
    /// failure yields None.
    #[instrument(skip(self, repo), fields(repo = %repo.full_name()))]
    pub async fn repository_file(
        &self,
        repo: &Repo,
        file_path: &str,
        branch: &str,
    ) -> Option<String> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, repo.owner, repo.name, file_path
        );

        let response = match self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .query(&[("ref", branch)])
            .timeout(SIMPLE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!(file_path, error = %err, "contents request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(file_path, status = %response.status(), "contents request returned non-success");
            return None;
        }

        let body: ContentsResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                debug!(file_path, error = %err, "contents response was not the expected shape");
                return None;
            }
        };
        if body.encoding != "base64" {
            debug!(file_path, encoding = %body.encoding, "unexpected contents encoding");
            return None;
        }

        // GitHub wraps base64 bodies with newlines; strip whitespace first.
        let cleaned: String = body
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = match BASE64.decode(cleaned) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(file_path, error = %err, "contents body was not valid base64");
                return None;
            }
        };
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(err) => {
                debug!(file_path, error = %err, "decoded contents were not valid UTF-8");
                None
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct PullUser {
    login: String,
}

#[derive(serde::Deserialize)]
struct PullItem {
    number: u64,
    title: String,
    state: PrState,
    user: PullUser,
    html_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PullItem {
    fn into_summary(self) -> PullRequestSummary {
        PullRequestSummary {
            number: self.number,
            title: self.title,
            state: self.state,
            author: self.user.login,
            url: self.html_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(serde::Deserialize)]
struct ContentsResponse {
    content: String,
    #[serde(default)]
    encoding: String,
}
