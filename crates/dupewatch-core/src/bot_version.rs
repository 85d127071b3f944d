//! Which detector deployment was live at a given instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DupewatchError, Result};

/// A detector version and when it went live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotDeployment {
    pub version: String,
    pub deployed_at: DateTime<Utc>,
}

impl BotDeployment {
    pub fn new(version: &str, deployed_at: DateTime<Utc>) -> Self {
        BotDeployment {
            version: version.to_string(),
            deployed_at,
        }
    }
}

/// Deployments, newest first, strictly descending by `deployed_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BotVersionTimeline {
    deployments: Vec<BotDeployment>,
}

impl BotVersionTimeline {
    /// Validate ordering. Equal or ascending neighbours are rejected.
    pub fn new(deployments: Vec<BotDeployment>) -> Result<Self> {
        if let Some(pair) = deployments
            .windows(2)
            .find(|pair| pair[0].deployed_at <= pair[1].deployed_at)
        {
            return Err(DupewatchError::InvalidTimeline(format!(
                "{} ({}) is listed before {} ({}); entries must be newest first",
                pair[0].version, pair[0].deployed_at, pair[1].version, pair[1].deployed_at
            )));
        }
        Ok(BotVersionTimeline { deployments })
    }

    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
    }

    pub fn deployments(&self) -> &[BotDeployment] {
        &self.deployments
    }

    /// Version live at `at`; before the first deployment, the oldest version.
    ///
    /// `None` only for an empty timeline.
    pub fn resolve(&self, at: DateTime<Utc>) -> Option<&str> {
        self.deployments
            .iter()
            .find(|d| d.deployed_at <= at)
            .or_else(|| self.deployments.last())
            .map(|d| d.version.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    fn timeline() -> BotVersionTimeline {
        BotVersionTimeline::new(vec![
            BotDeployment::new("v2", at(20)),
            BotDeployment::new("v1", at(10)),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_between_and_after() {
        let t = timeline();
        assert_eq!(t.resolve(at(15)), Some("v1"));
        assert_eq!(t.resolve(at(20)), Some("v2"));
        assert_eq!(t.resolve(at(25)), Some("v2"));
        assert_eq!(t.resolve(at(10)), Some("v1"));
    }

    #[test]
    fn test_resolve_before_first_deployment_falls_back_to_oldest() {
        assert_eq!(timeline().resolve(at(1)), Some("v1"));
    }

    #[test]
    fn test_empty_timeline_resolves_nothing() {
        let t = BotVersionTimeline::new(Vec::new()).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.resolve(at(1)), None);
    }

    #[test]
    fn test_ascending_timeline_is_rejected() {
        let err = BotVersionTimeline::new(vec![
            BotDeployment::new("v1", at(10)),
            BotDeployment::new("v2", at(20)),
        ])
        .unwrap_err();
        assert!(matches!(err, DupewatchError::InvalidTimeline(_)));
    }

    #[test]
    fn test_equal_instants_are_rejected() {
        assert!(BotVersionTimeline::new(vec![
            BotDeployment::new("v2", at(10)),
            BotDeployment::new("v1", at(10)),
        ])
        .is_err());
    }
}
