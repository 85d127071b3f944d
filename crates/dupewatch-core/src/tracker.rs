//! Effectiveness tracker: classify issues and record the outcome on the board.
//!
//! Two entry points:
//! - [`EffectivenessTracker::classify_closed`] runs when an issue is closed.
//! - [`EffectivenessTracker::classify_open`] sweeps open, triaged issues the
//!   detector commented on and records them as noise.

use dupewatch_store::{Issue, IssueNumber, IssueStore, ProjectBoard, SearchQuery};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::board::BoardSync;
use crate::comment::{find_detector_comment, parse_suggested_issues};
use crate::config::DupewatchConfig;
use crate::error::Result;
use crate::obs;
use crate::outcome::{CloseReason, DetectorComment, OutcomeClassifier, OutcomeEvent, OutcomeRecord};

/// Page size of the sweep search. Older issues are expected on the board already.
const SWEEP_PAGE_SIZE: u32 = 100;

/// Why a swept issue was left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum SkipReason {
    IneligibleType(Option<String>),
    StaffAuthor(String),
    AlreadyOnBoard,
    NoDetectorComment,
    NotTracked,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::IneligibleType(Some(kind)) => write!(f, "type is {}", kind),
            SkipReason::IneligibleType(None) => write!(f, "issue has no type"),
            SkipReason::StaffAuthor(author) => write!(f, "author {} is staff", author),
            SkipReason::AlreadyOnBoard => write!(f, "already on the board"),
            SkipReason::NoDetectorComment => write!(f, "no detector comment found"),
            SkipReason::NotTracked => write!(f, "not a trackable outcome"),
        }
    }
}

/// Result of sweeping one issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepItem {
    Added(OutcomeRecord),
    Skipped(SkipReason),
}

/// An issue the sweep could not process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub number: IssueNumber,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub added: usize,
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepSummary {
    fn record(&mut self, number: IssueNumber, item: Result<SweepItem>) {
        match item {
            Ok(SweepItem::Added(record)) => {
                info!("{}: added as {}", number, record.outcome.label());
                self.added += 1;
            }
            Ok(SweepItem::Skipped(reason)) => {
                info!("{}: skipping, {}", number, reason);
                self.skipped += 1;
            }
            Err(err) => {
                warn!("{}: error processing issue, skipping: {}", number, err);
                self.failures.push(SweepFailure {
                    number,
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Classifies issues and upserts the outcome on the project board.
pub struct EffectivenessTracker<'a, S: ?Sized, B: ?Sized> {
    store: &'a S,
    board: BoardSync<'a, B>,
    classifier: OutcomeClassifier,
    config: DupewatchConfig,
}

impl<'a, S, B> EffectivenessTracker<'a, S, B>
where
    S: IssueStore + ?Sized,
    B: ProjectBoard + ?Sized,
{
    /// Fails if the configured bot version timeline is out of order.
    pub fn new(store: &'a S, board: &'a B, config: &DupewatchConfig) -> Result<Self> {
        Ok(EffectivenessTracker {
            store,
            board: BoardSync::new(board),
            classifier: OutcomeClassifier::new(config.tracker.bot_timeline()?),
            config: config.clone(),
        })
    }

    async fn is_staff(&self, login: &str) -> Result<bool> {
        if login.is_empty() {
            return Ok(false);
        }
        Ok(self
            .store
            .is_team_member(&self.config.detector.staff_team, login)
            .await?)
    }

    async fn detector_comment(&self, number: IssueNumber) -> Result<Option<DetectorComment>> {
        let comments = self.store.list_comments(number).await?;
        let tracker = &self.config.tracker;
        Ok(
            find_detector_comment(&comments, &tracker.bot_login, &tracker.comment_prefix).map(
                |comment| DetectorComment {
                    posted_at: comment.created_at,
                    suggested: parse_suggested_issues(&comment.body),
                },
            ),
        )
    }

    fn awaiting_triage(&self, issue: &Issue) -> bool {
        issue.has_label(&self.config.tracker.needs_triage_label)
    }

    /// Classify a closed issue; `None` when it is not a trackable outcome.
    pub async fn classify_closed(
        &self,
        number: IssueNumber,
        closer: &str,
        state_reason: &str,
    ) -> Result<Option<OutcomeRecord>> {
        let reason = CloseReason::parse(state_reason);
        info!("Classifying closed issue {}", number);
        info!("Closer: {}, state_reason: {}", closer, reason);

        let issue = self.store.fetch_issue(number).await?;
        info!(
            "Author: {}, type: {}",
            issue.author,
            issue.kind.as_deref().unwrap_or("none")
        );

        let mut event = OutcomeEvent::closed(number.get(), &issue.author, closer, reason);
        event.awaiting_triage = self.awaiting_triage(&issue);
        if self.is_staff(&issue.author).await? {
            info!("Skipping: author '{}' is a staff member", issue.author);
            return Ok(None);
        }

        event.detector_comment = self.detector_comment(number).await?;
        info!("Bot commented: {}", event.detector_comment.is_some());

        let Some(record) = self.classifier.classify(&event, self.store).await else {
            return Ok(None);
        };
        self.board.upsert(&issue.node_id, &record).await?;
        Ok(Some(record))
    }

    async fn sweep_item(&self, issue: &Issue) -> Result<SweepItem> {
        if !self.config.detector.is_eligible_type(issue.kind.as_deref()) {
            return Ok(SweepItem::Skipped(SkipReason::IneligibleType(
                issue.kind.clone(),
            )));
        }
        if self.is_staff(&issue.author).await? {
            return Ok(SweepItem::Skipped(SkipReason::StaffAuthor(
                issue.author.clone(),
            )));
        }
        if self.board.is_on_board(&issue.node_id).await? {
            return Ok(SweepItem::Skipped(SkipReason::AlreadyOnBoard));
        }
        let Some(comment) = self.detector_comment(issue.number).await? else {
            return Ok(SweepItem::Skipped(SkipReason::NoDetectorComment));
        };

        let mut event = OutcomeEvent::open(issue.number.get(), &issue.author);
        event.awaiting_triage = self.awaiting_triage(issue);
        event.detector_comment = Some(comment);

        match self.classifier.classify(&event, self.store).await {
            Some(record) => {
                self.board.upsert(&issue.node_id, &record).await?;
                Ok(SweepItem::Added(record))
            }
            None => Ok(SweepItem::Skipped(SkipReason::NotTracked)),
        }
    }

    /// Sweep open, triaged, detector-commented issues.
    ///
    /// Only the search itself is load-bearing; per-issue failures are
    /// collected in the summary.
    pub async fn classify_open(&self) -> Result<SweepSummary> {
        info!("Classifying open issues");
        let tracker = &self.config.tracker;
        let query = SearchQuery::open_issues(SWEEP_PAGE_SIZE)
            .commented_by_app(tracker.bot_app_slug.as_str())
            .without_label(tracker.needs_triage_label.as_str())
            .created_since(tracker.bot_start_date);
        info!(
            "Search query: {}",
            query.to_query_string(&self.config.repo.owner, &self.config.repo.name)
        );

        let issues = self.store.search_issues(&query).await?;
        info!("Found {} candidate issues", issues.len());

        let mut summary = SweepSummary::default();
        for issue in &issues {
            let item = self.sweep_item(issue).await;
            summary.record(issue.number, item);
        }

        info!(
            "Done: added {}, skipped {}, errors {}",
            summary.added,
            summary.skipped,
            summary.failures.len()
        );
        obs::emit_sweep_finished(summary.added, summary.skipped, summary.failures.len());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            SkipReason::IneligibleType(Some("Feature".to_string())).to_string(),
            "type is Feature"
        );
        assert_eq!(
            SkipReason::StaffAuthor("alice".to_string()).to_string(),
            "author alice is staff"
        );
    }

    #[test]
    fn test_summary_counts_failures_separately() {
        let mut summary = SweepSummary::default();
        summary.record(IssueNumber(1), Ok(SweepItem::Skipped(SkipReason::AlreadyOnBoard)));
        summary.record(
            IssueNumber(2),
            Err(crate::error::DupewatchError::Config("boom".to_string())),
        );
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.added, 0);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].number, IssueNumber(2));
        assert!(summary.failures[0].reason.contains("boom"));
    }
}
