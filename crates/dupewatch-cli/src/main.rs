//! dupewatch - duplicate detection and detector effectiveness tracking
//!
//! ## Commands
//!
//! - `check`: look for duplicates of a new issue and comment on confident matches
//! - `classify-closed`: record the outcome of a closed issue on the project board
//! - `classify-open`: sweep open, triaged issues the detector commented on
//! - `magnets`: regenerate the duplicate-magnet catalog

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dupewatch_core::config::CONFIG_ENV;
use dupewatch_core::{
    build_catalog, publish_catalog, DuplicateDetector, DupewatchConfig, EffectivenessTracker,
};
use dupewatch_oracle::{AnthropicConfig, AnthropicOracle, ClassificationOracle};
use dupewatch_store::{GitHubClient, GitHubConfig, IssueNumber, IssueStore, ProjectBoard};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "dupewatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Duplicate issue detection and detector effectiveness tracking", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// GitHub token with issue, team and project access
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Anthropic API key (only needed by `check`)
    #[arg(long, global = true, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check an issue for duplicates and comment on high-confidence matches
    Check {
        /// Issue number to check
        issue: u64,

        /// Log the comment instead of posting it
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify a closed issue and record it on the project board
    ClassifyClosed {
        /// Issue number that was closed
        issue: u64,

        /// Login of whoever closed it
        closer: String,

        /// Close reason reported by GitHub (duplicate, not_planned, completed)
        #[arg(default_value = "")]
        state_reason: String,
    },

    /// Record open, triaged issues the detector commented on
    ClassifyOpen,

    /// Regenerate the duplicate-magnet catalog
    Magnets {
        /// Write the catalog into this issue's body instead of printing it
        #[arg(long)]
        issue_number: Option<u64>,

        /// Maximum pages of open issues to scan
        #[arg(long, default_value = "100")]
        max_pages: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    dupewatch_core::telemetry::init_tracing(cli.json, level);

    let config = DupewatchConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    config.validate().context("Invalid config")?;

    let github = github_client(&config, cli.github_token.as_deref())?;

    let output = match cli.command {
        Commands::Check { issue, dry_run } => {
            let oracle = anthropic_oracle(&config, cli.anthropic_api_key.as_deref())?;
            cmd_check(&github, &oracle, &config, issue, dry_run).await?
        }
        Commands::ClassifyClosed {
            issue,
            closer,
            state_reason,
        } => cmd_classify_closed(&github, &github, &config, issue, &closer, &state_reason).await?,
        Commands::ClassifyOpen => cmd_classify_open(&github, &github, &config).await?,
        Commands::Magnets {
            issue_number,
            max_pages,
        } => cmd_magnets(&github, issue_number, max_pages).await?,
    };

    if let Some(text) = output {
        println!("{}", text);
    }
    Ok(())
}

fn github_client(config: &DupewatchConfig, token: Option<&str>) -> Result<GitHubClient> {
    let token = token
        .filter(|t| !t.is_empty())
        .context("GITHUB_TOKEN is not set")?;
    let github_config = GitHubConfig::new(&config.repo.owner, &config.repo.name, token)
        .with_project_number(config.tracker.project_number);
    GitHubClient::new(github_config).context("Failed to create GitHub client")
}

fn anthropic_oracle(config: &DupewatchConfig, api_key: Option<&str>) -> Result<AnthropicOracle> {
    let api_key = api_key
        .filter(|k| !k.is_empty())
        .context("ANTHROPIC_API_KEY is not set")?;
    AnthropicOracle::new(AnthropicConfig::new(api_key).with_model(&config.oracle.model))
        .context("Failed to create Anthropic client")
}

/// Run the detector; the report is printed as JSON.
async fn cmd_check<S, O>(
    store: &S,
    oracle: &O,
    config: &DupewatchConfig,
    issue: u64,
    dry_run: bool,
) -> Result<Option<String>>
where
    S: IssueStore + ?Sized,
    O: ClassificationOracle + ?Sized,
{
    let detector = DuplicateDetector::new(store, oracle, &config.detector);
    let report = detector
        .check(IssueNumber(issue), dry_run, Utc::now().date_naive())
        .await
        .with_context(|| format!("duplicate check failed for #{}", issue))?;
    Ok(Some(serde_json::to_string_pretty(&report)?))
}

async fn cmd_classify_closed<S, B>(
    store: &S,
    board: &B,
    config: &DupewatchConfig,
    issue: u64,
    closer: &str,
    state_reason: &str,
) -> Result<Option<String>>
where
    S: IssueStore + ?Sized,
    B: ProjectBoard + ?Sized,
{
    let tracker = EffectivenessTracker::new(store, board, config)?;
    let record = tracker
        .classify_closed(IssueNumber(issue), closer, state_reason)
        .await
        .with_context(|| format!("classification failed for #{}", issue))?;
    if record.is_none() {
        info!("Not a trackable outcome, nothing recorded");
    }
    Ok(Some(serde_json::to_string_pretty(&record)?))
}

async fn cmd_classify_open<S, B>(
    store: &S,
    board: &B,
    config: &DupewatchConfig,
) -> Result<Option<String>>
where
    S: IssueStore + ?Sized,
    B: ProjectBoard + ?Sized,
{
    let tracker = EffectivenessTracker::new(store, board, config)?;
    let summary = tracker
        .classify_open()
        .await
        .context("open issue sweep failed")?;
    Ok(Some(serde_json::to_string_pretty(&summary)?))
}

/// Print the catalog, or write it to `issue_number` when given.
async fn cmd_magnets<S>(
    store: &S,
    issue_number: Option<u64>,
    max_pages: usize,
) -> Result<Option<String>>
where
    S: IssueStore + ?Sized,
{
    let Some(body) = build_catalog(store, max_pages)
        .await
        .context("Failed to scan issues for duplicates")?
    else {
        info!("No issues with 2+ duplicates found");
        return Ok(None);
    };

    match issue_number {
        Some(number) => {
            publish_catalog(store, IssueNumber(number), &body)
                .await
                .with_context(|| format!("Failed to update #{}", number))?;
            Ok(None)
        }
        None => Ok(Some(body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupewatch_oracle::fakes::ScriptedOracle;
    use dupewatch_store::fakes::{MemoryIssueStore, MemoryProjectBoard};
    use dupewatch_store::{BoardSchema, DuplicateEvent, Issue, IssueState, OpenIssueDuplicates};

    #[test]
    fn test_parse_classify_closed_without_reason() {
        let cli = Cli::try_parse_from(["dupewatch", "classify-closed", "12", "alice"]).unwrap();
        match cli.command {
            Commands::ClassifyClosed {
                issue,
                closer,
                state_reason,
            } => {
                assert_eq!(issue, 12);
                assert_eq!(closer, "alice");
                assert_eq!(state_reason, "");
            }
            _ => panic!("expected classify-closed"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["dupewatch", "check", "7", "--dry-run", "--json", "-v"]).unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Check {
                issue: 7,
                dry_run: true
            }
        ));
    }

    #[test]
    fn test_magnets_defaults() {
        let cli = Cli::try_parse_from(["dupewatch", "magnets"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Magnets {
                issue_number: None,
                max_pages: 100
            }
        ));
    }

    #[test]
    fn test_missing_token_is_reported() {
        let err = github_client(&DupewatchConfig::default(), Some(""))
            .err()
            .unwrap();
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    fn store_with_magnet() -> MemoryIssueStore {
        MemoryIssueStore::new()
            .with_issue(Issue::new(46355, "Duplicate magnets", "bot"))
            .with_open_duplicates(OpenIssueDuplicates {
                number: IssueNumber(10),
                url: "https://github.com/zed-industries/zed/issues/10".to_string(),
                labels: vec!["area:editor".to_string()],
                duplicates: [11, 12]
                    .into_iter()
                    .map(|n| DuplicateEvent {
                        number: IssueNumber(n),
                        state: IssueState::Closed,
                    })
                    .collect(),
            })
    }

    #[tokio::test]
    async fn test_magnets_prints_without_issue_number() {
        let store = store_with_magnet();
        let output = cmd_magnets(&store, None, 1).await.unwrap().unwrap();
        assert!(output.contains("## editor"));
        assert!(store.body_updates().is_empty());
    }

    #[tokio::test]
    async fn test_magnets_publishes_with_issue_number() {
        let store = store_with_magnet();
        let output = cmd_magnets(&store, Some(46355), 1).await.unwrap();
        assert!(output.is_none());
        assert_eq!(store.body_updates().len(), 1);
    }

    #[tokio::test]
    async fn test_check_prints_skipped_report() {
        let store = MemoryIssueStore::new()
            .with_issue(Issue::new(3, "Add tabs", "alice").with_kind("Feature"));
        let oracle = ScriptedOracle::new();
        let output = cmd_check(&store, &oracle, &DupewatchConfig::default(), 3, true)
            .await
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["skipped"], true);
    }

    #[tokio::test]
    async fn test_classify_closed_untracked_prints_null() {
        let store = MemoryIssueStore::new().with_issue(Issue::new(3, "Crash", "alice"));
        let board = MemoryProjectBoard::new(BoardSchema::new("P"));
        let output = cmd_classify_closed(
            &store,
            &board,
            &DupewatchConfig::default(),
            3,
            "alice",
            "completed",
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(output, "null");
    }
}
