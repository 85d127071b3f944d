//! Oracle inputs and outputs, and the parsers that turn raw model text into them.
//!
//! Parsing never fails: malformed output degrades to "no match" or an empty
//! verdict, so a confused oracle can only ever cause a missed duplicate, never
//! a false one.

use dupewatch_store::IssueNumber;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// At most this many areas are taken from an area detection.
pub const MAX_DETECTED_AREAS: usize = 3;

/// Summary used when the duplicate analysis could not be parsed.
pub const UNPARSEABLE_SUMMARY: &str = "Failed to parse analysis";

/// The report being classified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportText {
    pub number: IssueNumber,
    pub title: String,
    pub body: String,
}

/// A prior issue offered to the oracle for comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateBrief {
    pub number: IssueNumber,
    pub title: String,
    pub body_preview: String,
    /// Where the candidate came from ("known_duplicate_magnet", "search_result")
    pub source: String,
}

/// Result of area detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaDetection {
    /// Ranked area names, most relevant first
    Areas(Vec<String>),
    NoMatch,
}

impl AreaDetection {
    pub fn into_areas(self) -> Vec<String> {
        match self {
            AreaDetection::Areas(areas) => areas,
            AreaDetection::NoMatch => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    /// Anything else the model might emit
    #[serde(other)]
    Low,
}

/// One prior issue the oracle believes shares a root cause with the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub number: IssueNumber,
    pub confidence: Confidence,
    #[serde(default)]
    pub shared_root_cause: Option<String>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    #[serde(default)]
    pub matches: Vec<DuplicateMatch>,
    #[serde(default = "default_summary")]
    pub summary: String,
}

fn default_summary() -> String {
    "Analysis complete".to_string()
}

impl DuplicateVerdict {
    /// A verdict with no matches.
    pub fn empty(summary: &str) -> Self {
        DuplicateVerdict {
            matches: Vec::new(),
            summary: summary.to_string(),
        }
    }

    /// Matches the oracle is highly confident about.
    pub fn high_confidence(&self) -> Vec<DuplicateMatch> {
        self.matches
            .iter()
            .filter(|m| m.confidence == Confidence::High)
            .cloned()
            .collect()
    }
}

/// Parse a comma-separated area list; `none` or blank means no match.
pub fn parse_area_response(text: &str) -> AreaDetection {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return AreaDetection::NoMatch;
    }

    let areas: Vec<String> = trimmed
        .split(',')
        .map(|a| a.trim().trim_matches('"').trim())
        .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("none"))
        .take(MAX_DETECTED_AREAS)
        .map(str::to_string)
        .collect();

    if areas.is_empty() {
        AreaDetection::NoMatch
    } else {
        AreaDetection::Areas(areas)
    }
}

/// Parse the JSON duplicate analysis, tolerating a markdown code fence.
pub fn parse_duplicate_response(text: &str) -> DuplicateVerdict {
    let json = strip_code_fence(text);
    match serde_json::from_str::<DuplicateVerdict>(json) {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!("Failed to parse duplicate analysis: {}", err);
            warn!("Raw response: {}", text);
            DuplicateVerdict::empty(UNPARSEABLE_SUMMARY)
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
