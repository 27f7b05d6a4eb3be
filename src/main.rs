mod config;
mod fetch;
mod github;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use github::{GitHubClient, Repo};

/// pr-fetcher — tool surface exposing GitHub repository read operations
/// (list PRs, PR detail with TLS fallback, issues, README, file) as JSON
/// on stdout. Logs go to stderr so stdout stays machine-readable.
#[derive(Parser, Debug)]
#[command(name = "pr-fetcher", version, about)]
struct Cli {
    /// Enable the insecure TLS fallback strategies (certificate
    /// verification disabled). Off by default; enabling logs a warning.
    #[arg(long, global = true)]
    insecure_fallback: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List pull requests for a repository
    ListPrs {
        owner: String,
        repo: String,
        #[arg(long, value_enum, default_value_t = StateArg::Open)]
        state: StateArg,
        #[arg(long, default_value_t = 30)]
        per_page: u32,
    },
    /// Fetch full details for one PR, selected by its position in the
    /// current open-PR listing (1 = most recently updated)
    PrDetail {
        owner: String,
        repo: String,
        /// 1-based position in the open-PR listing, NOT a PR number
        #[arg(long, default_value_t = 1)]
        index: usize,
    },
    /// List issues for a repository
    Issues {
        owner: String,
        repo: String,
        #[arg(long, value_enum, default_value_t = StateArg::Open)]
        state: StateArg,
        /// Number of issues per page (capped at 100)
        #[arg(long, default_value_t = 30)]
        per_page: u32,
    },
    /// Fetch the repository README text
    Readme {
        owner: String,
        repo: String,
        #[arg(long, default_value = "main")]
        branch: String,
    },
    /// Fetch one file from the repository as UTF-8 text
    File {
        owner: String,
        repo: String,
        path: String,
        #[arg(long, default_value = "main")]
        branch: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StateArg {
    Open,
    Closed,
    All,
}

impl StateArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = config::Config::load()?;
    let allow_insecure = cli.insecure_fallback || config.fetch.allow_insecure_fallback;
    debug!(allow_insecure, "building GitHub client");
    let client = GitHubClient::new(&config, allow_insecure)?;

    // Every operation failure becomes a structured JSON value; nothing
    // past this point escapes as a process fault.
    let output = match cli.command {
        Command::ListPrs {
            owner,
            repo,
            state,
            per_page,
        } => {
            let repo = Repo::new(owner, repo);
            match client
                .list_pull_requests(&repo, state.as_str(), per_page)
                .await
            {
                Ok(prs) => serde_json::to_value(prs)?,
                Err(err) => json!({"success": false, "error": err.to_string()}),
            }
        }
        Command::PrDetail { owner, repo, index } => {
            let repo = Repo::new(owner, repo);
            match client.specified_pr(&repo, index).await {
                Ok(detail) => json!({
                    "success": true,
                    "latest_pr": detail.latest_pr,
                    "method_used": detail.method_used,
                    "all_prs": detail.all_prs,
                }),
                Err(err) => json!({"success": false, "error": err.to_string()}),
            }
        }
        Command::Issues {
            owner,
            repo,
            state,
            per_page,
        } => {
            let repo = Repo::new(owner, repo);
            match client
                .repository_issues(&repo, state.as_str(), per_page)
                .await
            {
                Ok(issues) => issues,
                Err(err) => json!({"error": format!("Failed to fetch issues: {err}")}),
            }
        }
        Command::Readme {
            owner,
            repo,
            branch,
        } => {
            let repo = Repo::new(owner, repo);
            serde_json::to_value(client.repository_readme(&repo, &branch).await)?
        }
        Command::File {
            owner,
            repo,
            path,
            branch,
        } => {
            let repo = Repo::new(owner, repo);
            serde_json::to_value(client.repository_file(&repo, &path, &branch).await)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
