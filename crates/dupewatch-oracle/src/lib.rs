//! dupewatch-oracle: natural-language classification for dupewatch
//!
//! The oracle answers two questions the decision engine cannot answer on its
//! own: which taxonomy areas a report belongs to, and which candidate issues
//! share its root cause.
//!
//! ## Layer 1 - Classification
//!
//! Focus: turning model output into typed verdicts, erring toward "no match".

pub mod anthropic;
mod error;
pub mod fakes;
pub mod prompts;
mod verdict;

use async_trait::async_trait;

pub use anthropic::{AnthropicConfig, AnthropicOracle};
pub use error::{OracleError, OracleResult};
pub use verdict::{
    parse_area_response, parse_duplicate_response, AreaDetection, CandidateBrief, Confidence,
    DuplicateMatch, DuplicateVerdict, ReportText, MAX_DETECTED_AREAS, UNPARSEABLE_SUMMARY,
};

/// Black-box classifier consulted by the duplicate detector.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Rank at most [`MAX_DETECTED_AREAS`] areas of `taxonomy` for the report.
    async fn detect_areas(&self, report: &ReportText, taxonomy: &str)
        -> OracleResult<AreaDetection>;

    /// Judge which candidates share a root cause with the report.
    ///
    /// Unparseable output yields an empty verdict rather than an error.
    async fn judge_duplicates(
        &self,
        report: &ReportText,
        candidates: &[CandidateBrief],
    ) -> OracleResult<DuplicateVerdict>;
}
