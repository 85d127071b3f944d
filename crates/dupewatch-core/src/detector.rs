//! Duplicate detector: decide whether a new report duplicates a known issue.
//!
//! 1. Eligibility: bug/crash reports from non-staff authors only.
//! 2. Area detection by the oracle against the repository taxonomy.
//! 3. Magnets from the tracking issue, filtered by the detected areas.
//! 4. Keyword, area and error-pattern searches.
//! 5. Oracle judgment over magnets plus search results.
//! 6. A comment when at least one match is high confidence.

use chrono::NaiveDate;
use dupewatch_oracle::{ClassificationOracle, DuplicateMatch, DuplicateVerdict, ReportText};
use dupewatch_store::{Issue, IssueNumber, IssueStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::candidates::{filter_magnets_by_areas, CandidateAssembler};
use crate::catalog::{enrich_magnets, parse_catalog, Magnet};
use crate::comment::render_duplicate_comment;
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::obs;
use crate::taxonomy::{area_labels, collapse_taxonomy, render_taxonomy};

/// The checked issue, as echoed in a [`CheckReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub number: IssueNumber,
    pub title: String,
    pub author: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl From<&Issue> for IssueSummary {
    fn from(issue: &Issue) -> Self {
        IssueSummary {
            number: issue.number,
            title: issue.title.clone(),
            author: issue.author.clone(),
            kind: issue.kind.clone(),
        }
    }
}

/// Outcome of one detector run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<IssueSummary>,
    #[serde(default)]
    pub detected_areas: Vec<String>,
    #[serde(default)]
    pub magnets_count: usize,
    #[serde(default)]
    pub search_results_count: usize,
    /// Every match the oracle returned, whatever the confidence
    #[serde(default)]
    pub matches: Vec<DuplicateMatch>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub commented: bool,
}

impl CheckReport {
    fn skipped() -> Self {
        CheckReport {
            skipped: true,
            issue: None,
            detected_areas: Vec::new(),
            magnets_count: 0,
            search_results_count: 0,
            matches: Vec::new(),
            summary: String::new(),
            commented: false,
        }
    }
}

/// Runs the detection pipeline against one store and one oracle.
pub struct DuplicateDetector<'a, S: ?Sized, O: ?Sized> {
    store: &'a S,
    oracle: &'a O,
    config: DetectorConfig,
    assembler: CandidateAssembler,
}

impl<'a, S, O> DuplicateDetector<'a, S, O>
where
    S: IssueStore + ?Sized,
    O: ClassificationOracle + ?Sized,
{
    pub fn new(store: &'a S, oracle: &'a O, config: &DetectorConfig) -> Self {
        DuplicateDetector {
            store,
            oracle,
            assembler: CandidateAssembler::new(config.candidate_limits()),
            config: config.clone(),
        }
    }

    /// Bug or crash report whose author is not on the staff team.
    pub async fn is_eligible(&self, issue: &Issue) -> Result<bool> {
        if !self.config.is_eligible_type(issue.kind.as_deref()) {
            info!(
                "Skipping: issue type '{}' is not a bug/crash report",
                issue.kind.as_deref().unwrap_or("none")
            );
            return Ok(false);
        }
        if !issue.author.is_empty()
            && self
                .store
                .is_team_member(&self.config.staff_team, &issue.author)
                .await?
        {
            info!(
                "Skipping: author '{}' is a {} member",
                issue.author, self.config.staff_team
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Areas of the report according to the oracle; empty when none apply.
    pub async fn detect_areas(&self, report: &ReportText) -> Result<Vec<String>> {
        let labels = area_labels(&self.store.list_labels().await?);
        info!("Found {} area labels", labels.len());
        let taxonomy = render_taxonomy(&collapse_taxonomy(&labels, &self.config.collapse_prefixes));

        let areas = self
            .oracle
            .detect_areas(report, &taxonomy)
            .await?
            .into_areas();
        info!("Detected areas: {:?}", areas);
        Ok(areas)
    }

    /// The magnet catalog currently in the tracking issue.
    pub async fn load_catalog(&self) -> Result<Vec<Magnet>> {
        let tracking = IssueNumber(self.config.tracking_issue);
        info!("Parsing duplicate magnets from {}", tracking);
        let issue = self.store.fetch_issue(tracking).await?;
        Ok(parse_catalog(&issue.body))
    }

    /// Check one issue. With `dry_run` the comment is logged, not posted.
    pub async fn check(
        &self,
        number: IssueNumber,
        dry_run: bool,
        today: NaiveDate,
    ) -> Result<CheckReport> {
        info!("Fetching issue {}", number);
        let issue = self.store.fetch_issue(number).await?;
        debug!(
            "Title: {}, type: {:?}, author: {}",
            issue.title, issue.kind, issue.author
        );
        if !self.is_eligible(&issue).await? {
            return Ok(CheckReport::skipped());
        }

        let report = ReportText {
            number: issue.number,
            title: issue.title.clone(),
            body: issue.body.clone(),
        };

        let detected_areas = self.detect_areas(&report).await?;
        let catalog = self.load_catalog().await?;
        let relevant = filter_magnets_by_areas(&catalog, &detected_areas);
        let search_results = self
            .assembler
            .search(&report, &detected_areas, self.store, today)
            .await;

        let verdict = if relevant.is_empty() && search_results.is_empty() {
            DuplicateVerdict::empty("No potential duplicates to analyze")
        } else {
            let mut top: Vec<Magnet> = relevant
                .iter()
                .take(self.config.magnet_limit)
                .cloned()
                .collect();
            enrich_magnets(&mut top, self.store, self.config.body_preview_chars).await?;

            let candidates = self.assembler.assemble(&top, &search_results);
            if candidates.is_empty() {
                DuplicateVerdict::empty("No candidates to analyze")
            } else {
                info!("Analyzing {} candidates", candidates.len());
                let briefs: Vec<_> = candidates.iter().map(|c| c.brief()).collect();
                let verdict = self.oracle.judge_duplicates(&report, &briefs).await?;
                info!("Found {} potential matches", verdict.matches.len());
                verdict
            }
        };

        let commented = self.comment_if_confident(number, &verdict, dry_run).await;

        Ok(CheckReport {
            skipped: false,
            issue: Some(IssueSummary::from(&issue)),
            detected_areas,
            magnets_count: relevant.len(),
            search_results_count: search_results.len(),
            matches: verdict.matches,
            summary: verdict.summary,
            commented,
        })
    }

    /// Post the duplicate comment for high-confidence matches.
    ///
    /// A failed post is logged; the run still succeeds.
    async fn comment_if_confident(
        &self,
        number: IssueNumber,
        verdict: &DuplicateVerdict,
        dry_run: bool,
    ) -> bool {
        let confident = verdict.high_confidence();
        if confident.is_empty() {
            return false;
        }

        let body = render_duplicate_comment(&confident);
        if dry_run {
            info!("Dry run - would post comment:\n{}", body);
            return false;
        }

        info!("Posting comment for high-confidence match(es)");
        match self.store.post_comment(number, &body).await {
            Ok(()) => {
                obs::emit_comment_posted(number, confident.len());
                true
            }
            Err(err) => {
                warn!("Failed to post comment on {}: {}", number, err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_report_serializes_compactly() {
        let json = serde_json::to_value(CheckReport::skipped()).unwrap();
        assert_eq!(json["skipped"], true);
        assert!(json.get("issue").is_none());
    }

    #[test]
    fn test_issue_summary_uses_type_key() {
        let issue = Issue::new(7, "Crash on start", "alice").with_kind("Crash");
        let json = serde_json::to_value(IssueSummary::from(&issue)).unwrap();
        assert_eq!(json["type"], "Crash");
        assert_eq!(json["number"], 7);
    }
}
