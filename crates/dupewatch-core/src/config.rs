//! dupewatch configuration.
//!
//! Every field has a default, so an absent file or a partial one is fine:
//!
//! ```toml
//! [repo]
//! owner = "zed-industries"
//! name = "zed"
//!
//! [detector]
//! tracking_issue = 46355
//! collapse_prefixes = ["languages", "parity", "tooling"]
//!
//! [tracker]
//! project_number = 76
//!
//! [[tracker.timeline]]
//! version = "v2"
//! deployed_at = "2026-03-02T00:00:00Z"
//! ```
//!
//! Secrets are never read from the file.

use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bot_version::{BotDeployment, BotVersionTimeline};
use crate::candidates::{CandidateLimits, DEFAULT_STOPWORDS};
use crate::error::{DupewatchError, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DUPEWATCH_CONFIG";
/// Environment override of `tracker.project_number`.
pub const PROJECT_NUMBER_ENV: &str = "PROJECT_NUMBER";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DupewatchConfig {
    pub repo: RepoConfig,
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub owner: String,
    pub name: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        RepoConfig {
            owner: "zed-industries".to_string(),
            name: "zed".to_string(),
        }
    }
}

/// Duplicate detector settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Issue whose body holds the magnet catalog
    pub tracking_issue: u64,
    /// Members of this team are never checked or tracked
    pub staff_team: String,
    /// Issue types the detector looks at
    pub eligible_types: Vec<String>,
    /// Area families summarized as one taxonomy line
    pub collapse_prefixes: Vec<String>,
    pub stopwords: Vec<String>,
    pub max_queries: usize,
    pub results_per_query: u32,
    pub recency_days: u32,
    /// Magnets enriched and shown to the oracle
    pub magnet_limit: usize,
    pub search_result_limit: usize,
    pub body_preview_chars: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let limits = CandidateLimits::default();
        DetectorConfig {
            tracking_issue: 46355,
            staff_team: "staff".to_string(),
            eligible_types: vec!["Bug".to_string(), "Crash".to_string()],
            collapse_prefixes: vec![
                "languages".to_string(),
                "parity".to_string(),
                "tooling".to_string(),
            ],
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            max_queries: limits.max_queries,
            results_per_query: limits.results_per_query,
            recency_days: limits.recency_days,
            magnet_limit: 10,
            search_result_limit: limits.search_result_limit,
            body_preview_chars: limits.body_preview_chars,
        }
    }
}

impl DetectorConfig {
    pub fn candidate_limits(&self) -> CandidateLimits {
        CandidateLimits {
            stopwords: self.stopwords.clone(),
            max_queries: self.max_queries,
            results_per_query: self.results_per_query,
            recency_days: self.recency_days,
            search_result_limit: self.search_result_limit,
            body_preview_chars: self.body_preview_chars,
        }
    }

    pub fn is_eligible_type(&self, kind: Option<&str>) -> bool {
        kind.is_some_and(|k| self.eligible_types.iter().any(|t| t == k))
    }
}

/// Effectiveness tracker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Login the detector comments as
    pub bot_login: String,
    /// App slug used in `commenter:app/` searches
    pub bot_app_slug: String,
    pub comment_prefix: String,
    pub needs_triage_label: String,
    /// Open issues created before this are never swept
    pub bot_start_date: NaiveDate,
    pub project_number: u64,
    /// Detector deployments, newest first
    pub timeline: Vec<BotDeployment>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let bot_start_date = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap_or_default();
        TrackerConfig {
            bot_login: "zed-community-bot[bot]".to_string(),
            bot_app_slug: "zed-community-bot".to_string(),
            comment_prefix: crate::comment::DETECTOR_COMMENT_PREFIX.to_string(),
            needs_triage_label: "state:needs triage".to_string(),
            bot_start_date,
            project_number: 76,
            timeline: vec![BotDeployment::new(
                "v1",
                bot_start_date.and_time(NaiveTime::MIN).and_utc(),
            )],
        }
    }
}

impl TrackerConfig {
    pub fn bot_timeline(&self) -> Result<BotVersionTimeline> {
        BotVersionTimeline::new(self.timeline.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub model: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            model: dupewatch_oracle::anthropic::DEFAULT_MODEL.to_string(),
        }
    }
}

impl DupewatchConfig {
    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DupewatchError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// File if given, defaults otherwise, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = env(PROJECT_NUMBER_ENV).filter(|v| !v.is_empty()) {
            self.tracker.project_number = raw.trim().parse().map_err(|_| {
                DupewatchError::Config(format!(
                    "{} must be an integer, got '{}'",
                    PROJECT_NUMBER_ENV, raw
                ))
            })?;
        }
        Ok(())
    }

    /// Check everything that can be checked without the network.
    pub fn validate(&self) -> Result<()> {
        if self.repo.owner.is_empty() || self.repo.name.is_empty() {
            return Err(DupewatchError::Config(
                "repo.owner and repo.name must be set".to_string(),
            ));
        }
        if self.detector.max_queries == 0 {
            return Err(DupewatchError::Config(
                "detector.max_queries must be at least 1".to_string(),
            ));
        }
        if self.tracker.bot_timeline()?.is_empty() {
            return Err(DupewatchError::Config(
                "tracker.timeline needs at least one deployment".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reproduce_deployment() {
        let config = DupewatchConfig::default();
        assert_eq!(config.repo.owner, "zed-industries");
        assert_eq!(config.detector.tracking_issue, 46355);
        assert_eq!(config.tracker.project_number, 76);
        assert_eq!(
            config.tracker.bot_start_date,
            NaiveDate::from_ymd_opt(2026, 2, 18).unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = DupewatchConfig::from_toml("[detector]\nmax_queries = 3\n").unwrap();
        assert_eq!(config.detector.max_queries, 3);
        assert_eq!(config.detector.results_per_query, 15);
        assert_eq!(config.repo.name, "zed");
    }

    #[test]
    fn test_project_number_override() {
        let mut config = DupewatchConfig::default();
        config
            .apply_env_overrides(|key| (key == PROJECT_NUMBER_ENV).then(|| "12".to_string()))
            .unwrap();
        assert_eq!(config.tracker.project_number, 12);
    }

    #[test]
    fn test_empty_project_number_is_ignored() {
        let mut config = DupewatchConfig::default();
        config.apply_env_overrides(|_| Some(String::new())).unwrap();
        assert_eq!(config.tracker.project_number, 76);
    }

    #[test]
    fn test_non_integer_project_number_is_rejected() {
        let mut config = DupewatchConfig::default();
        let err = config
            .apply_env_overrides(|_| Some("seventy-six".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
    }

    #[tokio::test]
    async fn test_default_timeline_labels_commented_outcomes() {
        use crate::outcome::{CloseReason, OutcomeClassifier, OutcomeEvent};
        use chrono::{TimeZone, Utc};
        use dupewatch_store::fakes::MemoryIssueStore;

        let config = DupewatchConfig::default();
        let classifier = OutcomeClassifier::new(config.tracker.bot_timeline().unwrap());
        let event = OutcomeEvent::closed(1, "reporter", "reporter", CloseReason::Duplicate)
            .with_detector_comment(Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap(), &[10]);

        let record = classifier
            .classify(&event, &MemoryIssueStore::new())
            .await
            .unwrap();
        assert_eq!(record.bot_version.as_deref(), Some("v1"));
    }

    #[test]
    fn test_empty_timeline_fails_validation() {
        let mut config = DupewatchConfig::default();
        config.tracker.timeline.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least one deployment"));
    }

    #[test]
    fn test_eligible_types() {
        let detector = DetectorConfig::default();
        assert!(detector.is_eligible_type(Some("Crash")));
        assert!(!detector.is_eligible_type(Some("Feature")));
        assert!(!detector.is_eligible_type(None));
    }
}
