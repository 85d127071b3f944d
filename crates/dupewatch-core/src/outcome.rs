//! Outcome classification: how did the detector do on one issue?
//!
//! A decision table over four facts: whether the detector commented, whether
//! the issue is still open, who closed it relative to its author, and the
//! closure reason.
//!
//! | detector commented | closer             | reason    | outcome             | status          |
//! |--------------------|--------------------|-----------|---------------------|-----------------|
//! | yes                | author             | duplicate | Success             | Auto-classified |
//! | yes                | author             | other     | Success             | Needs review    |
//! | yes                | someone else       | duplicate | Assist              | depends on target |
//! | yes                | someone else       | other     | Noise               | Needs review    |
//! | no                 | anyone             | duplicate | Missed opportunity  | Auto-classified |
//! | no                 | anyone / open      | other     | *(not tracked)*     |                 |
//! | yes                | open, triaged      |           | Noise               | Auto-classified |
//!
//! Staff-authored issues are never classified.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dupewatch_store::{IssueNumber, IssueStore, StoreResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bot_version::BotVersionTimeline;
use crate::obs;

/// Why an issue was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Duplicate,
    NotPlanned,
    Completed,
    /// Missing or unrecognised reason; never written to the board
    Unknown,
}

impl CloseReason {
    /// Lenient parse: anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "duplicate" => CloseReason::Duplicate,
            "not_planned" => CloseReason::NotPlanned,
            "completed" => CloseReason::Completed,
            _ => CloseReason::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Duplicate => "duplicate",
            CloseReason::NotPlanned => "not_planned",
            CloseReason::Completed => "completed",
            CloseReason::Unknown => "unknown",
        }
    }

    /// Whether the board accepts this value in its "Closed as" field.
    pub fn is_recordable(&self) -> bool {
        !matches!(self, CloseReason::Unknown)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The detector's comment on an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorComment {
    pub posted_at: DateTime<Utc>,
    /// Issues the comment suggested, in order; empty if none could be parsed
    pub suggested: Vec<IssueNumber>,
}

/// Everything the classifier needs to know about one issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub number: IssueNumber,
    pub author: String,
    pub author_is_staff: bool,
    /// Login that closed the issue; `None` while open
    pub closer: Option<String>,
    /// `None` while open
    pub close_reason: Option<CloseReason>,
    /// Still carries the needs-triage label
    pub awaiting_triage: bool,
    pub detector_comment: Option<DetectorComment>,
}

impl OutcomeEvent {
    pub fn open(number: u64, author: &str) -> Self {
        OutcomeEvent {
            number: IssueNumber(number),
            author: author.to_string(),
            author_is_staff: false,
            closer: None,
            close_reason: None,
            awaiting_triage: false,
            detector_comment: None,
        }
    }

    pub fn closed(number: u64, author: &str, closer: &str, reason: CloseReason) -> Self {
        OutcomeEvent {
            closer: Some(closer.to_string()),
            close_reason: Some(reason),
            ..Self::open(number, author)
        }
    }

    pub fn with_detector_comment(mut self, posted_at: DateTime<Utc>, suggested: &[u64]) -> Self {
        self.detector_comment = Some(DetectorComment {
            posted_at,
            suggested: suggested.iter().copied().map(IssueNumber).collect(),
        });
        self
    }

    pub fn by_staff(mut self) -> Self {
        self.author_is_staff = true;
        self
    }

    pub fn awaiting_triage(mut self) -> Self {
        self.awaiting_triage = true;
        self
    }
}

/// Effectiveness category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Author closed their own report after the detector commented
    Success,
    /// A maintainer closed it as a duplicate after the detector commented
    Assist,
    /// The detector commented on something that was not a duplicate
    Noise,
    /// Closed as a duplicate without the detector noticing
    MissedOpportunity,
}

impl Outcome {
    /// Option name on the project board.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::Assist => "Assist",
            Outcome::Noise => "Noise",
            Outcome::MissedOpportunity => "Missed opportunity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    AutoClassified,
    NeedsReview,
}

impl ReviewStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::AutoClassified => "Auto-classified",
            ReviewStatus::NeedsReview => "Needs review",
        }
    }
}

/// Classification result, ready to be written to the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub number: IssueNumber,
    pub outcome: Outcome,
    pub status: ReviewStatus,
    pub closed_as: Option<CloseReason>,
    /// Why a record needs review
    pub notes: Option<String>,
    pub bot_version: Option<String>,
}

/// Which issue a report was marked a duplicate of.
#[async_trait]
pub trait DuplicateTargetLookup: Send + Sync {
    async fn canonical_target(&self, number: IssueNumber) -> StoreResult<Option<IssueNumber>>;
}

#[async_trait]
impl<S> DuplicateTargetLookup for S
where
    S: IssueStore + ?Sized,
{
    async fn canonical_target(&self, number: IssueNumber) -> StoreResult<Option<IssueNumber>> {
        self.duplicate_target(number).await
    }
}

struct Verdict {
    outcome: Outcome,
    status: ReviewStatus,
    closed_as: Option<CloseReason>,
    notes: Option<String>,
}

impl Verdict {
    fn auto(outcome: Outcome, closed_as: Option<CloseReason>) -> Self {
        Verdict {
            outcome,
            status: ReviewStatus::AutoClassified,
            closed_as,
            notes: None,
        }
    }

    fn review(outcome: Outcome, closed_as: Option<CloseReason>, notes: String) -> Self {
        Verdict {
            outcome,
            status: ReviewStatus::NeedsReview,
            closed_as,
            notes: Some(notes),
        }
    }
}

fn format_numbers(numbers: &[IssueNumber]) -> String {
    numbers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decision table over [`OutcomeEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct OutcomeClassifier {
    timeline: BotVersionTimeline,
}

impl OutcomeClassifier {
    pub fn new(timeline: BotVersionTimeline) -> Self {
        OutcomeClassifier { timeline }
    }

    /// Classify one issue, or `None` if it is not a trackable outcome.
    ///
    /// `lookup` is consulted only for a maintainer closing as duplicate
    /// after the detector suggested something. A failed lookup yields a
    /// needs-review record instead of an error.
    pub async fn classify<L>(&self, event: &OutcomeEvent, lookup: &L) -> Option<OutcomeRecord>
    where
        L: DuplicateTargetLookup + ?Sized,
    {
        if event.author_is_staff {
            debug!("Skipping {}: author {} is staff", event.number, event.author);
            return None;
        }

        let verdict = match (&event.detector_comment, &event.closer) {
            (Some(_), None) if event.awaiting_triage => {
                debug!("Skipping {}: still awaiting triage", event.number);
                return None;
            }
            (Some(_), None) => Verdict::auto(Outcome::Noise, None),
            (Some(comment), Some(closer)) => {
                let reason = event.close_reason.unwrap_or(CloseReason::Unknown);
                if *closer == event.author {
                    Self::author_closed(reason)
                } else {
                    Self::maintainer_closed(event.number, comment, reason, lookup).await
                }
            }
            (None, Some(_)) if event.close_reason == Some(CloseReason::Duplicate) => {
                Verdict::auto(Outcome::MissedOpportunity, Some(CloseReason::Duplicate))
            }
            (None, _) => {
                debug!(
                    "Skipping {}: no detector comment and not closed as duplicate",
                    event.number
                );
                return None;
            }
        };

        let bot_version = event
            .detector_comment
            .as_ref()
            .and_then(|c| self.timeline.resolve(c.posted_at))
            .map(str::to_string);

        match &verdict.notes {
            Some(notes) => info!(
                "{} -> {}, needs review ({})",
                event.number,
                verdict.outcome.label(),
                notes
            ),
            None => info!("{} -> {}", event.number, verdict.outcome.label()),
        }
        obs::emit_outcome_classified(
            event.number,
            verdict.outcome.label(),
            verdict.status.label(),
            bot_version.as_deref(),
        );

        Some(OutcomeRecord {
            number: event.number,
            outcome: verdict.outcome,
            status: verdict.status,
            closed_as: verdict.closed_as,
            notes: verdict.notes,
            bot_version,
        })
    }

    fn author_closed(reason: CloseReason) -> Verdict {
        if reason == CloseReason::Duplicate {
            Verdict::auto(Outcome::Success, Some(reason))
        } else {
            Verdict::review(
                Outcome::Success,
                Some(reason),
                format!("Author closed as {}", reason),
            )
        }
    }

    async fn maintainer_closed<L>(
        number: IssueNumber,
        comment: &DetectorComment,
        reason: CloseReason,
        lookup: &L,
    ) -> Verdict
    where
        L: DuplicateTargetLookup + ?Sized,
    {
        if reason != CloseReason::Duplicate {
            return Verdict::review(
                Outcome::Noise,
                Some(reason),
                format!("Closed by staff/triager as {}, not duplicate", reason),
            );
        }

        let closed_as = Some(CloseReason::Duplicate);
        if comment.suggested.is_empty() {
            return Verdict::review(
                Outcome::Assist,
                closed_as,
                "Could not parse suggested issues from the detector comment".to_string(),
            );
        }

        let target = match lookup.canonical_target(number).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                return Verdict::review(
                    Outcome::Assist,
                    closed_as,
                    "Could not determine original issue from timeline".to_string(),
                )
            }
            Err(err) => {
                warn!("Failed to look up the original issue of {}: {}", number, err);
                return Verdict::review(
                    Outcome::Assist,
                    closed_as,
                    format!("Could not determine original issue: {}", err),
                );
            }
        };

        if comment.suggested.contains(&target) {
            Verdict::auto(Outcome::Assist, closed_as)
        } else {
            Verdict::review(
                Outcome::Assist,
                closed_as,
                format!(
                    "Bot suggested {}; closed as dup of {}",
                    format_numbers(&comment.suggested),
                    target
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_parse_is_lenient() {
        assert_eq!(CloseReason::parse("duplicate"), CloseReason::Duplicate);
        assert_eq!(CloseReason::parse("NOT_PLANNED"), CloseReason::NotPlanned);
        assert_eq!(CloseReason::parse("completed"), CloseReason::Completed);
        assert_eq!(CloseReason::parse(""), CloseReason::Unknown);
        assert_eq!(CloseReason::parse("reopened"), CloseReason::Unknown);
        assert!(!CloseReason::Unknown.is_recordable());
    }

    #[test]
    fn test_labels_match_board_options() {
        assert_eq!(Outcome::MissedOpportunity.label(), "Missed opportunity");
        assert_eq!(ReviewStatus::AutoClassified.label(), "Auto-classified");
        assert_eq!(ReviewStatus::NeedsReview.label(), "Needs review");
    }

    #[test]
    fn test_format_numbers() {
        assert_eq!(
            format_numbers(&[IssueNumber(10), IssueNumber(20)]),
            "#10, #20"
        );
    }
}
