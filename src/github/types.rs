use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coordinates of a remote repository. Carries no validation of its own;
/// nonsense values are rejected by the remote service's error response.
#[derive(Debug, Clone)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// State of a pull request as reported by the listing endpoint. Merged
/// PRs show up as closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

/// Projection of one pull request out of the listing response.
/// Ordering of a listing is whatever the remote returned (update-time
/// descending is requested); numbers are unique within one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// open or closed
    pub state: PrState,
    /// Author's GitHub login
    pub author: String,
    /// Browser-facing URL of the PR
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of resolving a listing position to a full PR detail payload.
#[derive(Debug, Clone, Serialize)]
pub struct PrDetail {
    /// Raw detail payload from the pulls endpoint
    pub latest_pr: Value,
    /// Name of the fetch strategy that succeeded
    pub method_used: String,
    /// The listing the position was resolved against
    pub all_prs: Vec<PullRequestSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_full_name() {
        let repo = Repo::new("octocat", "Hello-World");
        assert_eq!(repo.full_name(), "octocat/Hello-World");
    }

    #[test]
    fn test_pr_state_deserializes_lowercase() {
        let open: PrState = serde_json::from_str("\"open\"").unwrap();
        let closed: PrState = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(open, PrState::Open);
        assert_eq!(closed, PrState::Closed);
    }

    #[test]
    fn test_summary_round_trips_timestamps() {
        let summary = PullRequestSummary {
            number: 1347,
            title: "Amazing new feature".to_string(),
            state: PrState::Open,
            author: "octocat".to_string(),
            url: "https://github.com/octocat/Hello-World/pull/1347".to_string(),
            created_at: "2011-01-26T19:01:12Z".parse().unwrap(),
            updated_at: "2011-01-26T19:14:43Z".parse().unwrap(),
        };
        let encoded = serde_json::to_string(&summary).unwrap();
        let decoded: PullRequestSummary = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, summary);
    }
}
