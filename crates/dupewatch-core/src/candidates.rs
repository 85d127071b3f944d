//! Candidate assembly for duplicate detection.
//!
//! Candidates come from four places, in priority order: known magnets,
//! a title keyword search, one recency-bounded search per detected area, and
//! an exact-phrase search on the first error line of the report. Each issue
//! appears at most once and keeps the provenance it was first seen with.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use dupewatch_oracle::{CandidateBrief, ReportText};
use dupewatch_store::{truncate_chars, IssueNumber, IssueStore, SearchQuery};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::Magnet;
use crate::obs;
use crate::taxonomy::{areas_related, AREA_LABEL_PREFIX};

/// Keyword, then `[^\S\n]*` so the snippet never starts on the next line.
static ERROR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:\b(?:error|panicked|panic|failed)\b)[^\S\n]*([^\n]{5,90})")
        .expect("error-line pattern compiles")
});

/// Title words that never help a search.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "after", "all", "also", "and", "any", "but", "can't", "does", "doesn't", "don't", "for",
    "from", "have", "just", "not", "only", "some", "that", "the", "this", "when", "while",
    "with", "won't", "work", "working", "zed",
];

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    KeywordSearch,
    AreaSearch,
    ErrorPatternSearch,
    KnownMagnet,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::KeywordSearch => "title_keywords",
            Provenance::AreaSearch => "area_label",
            Provenance::ErrorPatternSearch => "error_pattern",
            Provenance::KnownMagnet => "known_duplicate_magnet",
        }
    }

    /// Coarse source tag shown to the oracle.
    pub fn oracle_source(&self) -> &'static str {
        match self {
            Provenance::KnownMagnet => "known_duplicate_magnet",
            _ => "search_result",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prior issue to compare the report against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub number: IssueNumber,
    pub title: String,
    pub body_preview: String,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn brief(&self) -> CandidateBrief {
        CandidateBrief {
            number: self.number,
            title: self.title.clone(),
            body_preview: self.body_preview.clone(),
            source: self.provenance.oracle_source().to_string(),
        }
    }
}

/// Insertion-ordered candidates, unique by number. First insert wins.
#[derive(Debug, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    seen: HashSet<IssueNumber>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (and drops `candidate`) if the number is already present.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        if !self.seen.insert(candidate.number) {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn contains(&self, number: IssueNumber) -> bool {
        self.seen.contains(&number)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }
}

/// One search to run, tagged with the provenance its hits get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    pub provenance: Provenance,
    pub query: SearchQuery,
}

/// Bounds applied while assembling candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLimits {
    pub stopwords: Vec<String>,
    /// Total searches issued per report
    pub max_queries: usize,
    pub results_per_query: u32,
    /// Window of the area searches, in days
    pub recency_days: u32,
    /// Search results kept after magnets
    pub search_result_limit: usize,
    pub body_preview_chars: usize,
}

impl Default for CandidateLimits {
    fn default() -> Self {
        CandidateLimits {
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            max_queries: 6,
            results_per_query: 15,
            recency_days: 60,
            search_result_limit: 10,
            body_preview_chars: 1000,
        }
    }
}

/// Title words worth searching for: stopwords and words of two chars or less dropped.
pub fn keyword_terms(title: &str, stopwords: &[String]) -> Vec<String> {
    title
        .split_whitespace()
        .filter(|word| word.chars().count() > 2)
        .filter(|word| !stopwords.iter().any(|s| s.eq_ignore_ascii_case(word)))
        .map(str::to_string)
        .collect()
}

/// The text following the first error keyword in `body`, trimmed.
pub fn error_snippet(body: &str) -> Option<String> {
    let captures = ERROR_LINE.captures(body)?;
    let snippet = captures.get(1)?.as_str().trim();
    if snippet.is_empty() {
        None
    } else {
        Some(snippet.to_string())
    }
}

/// Magnets relevant to the detected areas.
///
/// Nothing detected keeps the whole catalog; unlabeled magnets always stay.
/// Areas are compared with [`areas_related`].
pub fn filter_magnets_by_areas(magnets: &[Magnet], detected_areas: &[String]) -> Vec<Magnet> {
    if detected_areas.is_empty() {
        return magnets.to_vec();
    }
    magnets
        .iter()
        .filter(|magnet| {
            magnet.is_unlabeled()
                || magnet.areas.iter().any(|area| {
                    detected_areas
                        .iter()
                        .any(|detected| areas_related(detected, area))
                })
        })
        .cloned()
        .collect()
}

/// Builds the candidate list handed to the oracle.
#[derive(Debug, Clone, Default)]
pub struct CandidateAssembler {
    limits: CandidateLimits,
}

impl CandidateAssembler {
    pub fn new(limits: CandidateLimits) -> Self {
        CandidateAssembler { limits }
    }

    pub fn limits(&self) -> &CandidateLimits {
        &self.limits
    }

    /// Searches to run for a report, in priority order, capped at `max_queries`.
    pub fn plan_queries(
        &self,
        report: &ReportText,
        detected_areas: &[String],
        today: NaiveDate,
    ) -> Vec<PlannedQuery> {
        let per_page = self.limits.results_per_query;
        let mut planned = Vec::new();

        let terms = keyword_terms(&report.title, &self.limits.stopwords);
        if !terms.is_empty() {
            planned.push(PlannedQuery {
                provenance: Provenance::KeywordSearch,
                query: SearchQuery::open_issues(per_page).with_terms(terms),
            });
        }

        let since = today - Duration::days(i64::from(self.limits.recency_days));
        for area in detected_areas {
            planned.push(PlannedQuery {
                provenance: Provenance::AreaSearch,
                query: SearchQuery::open_issues(per_page)
                    .with_label(format!("{}{}", AREA_LABEL_PREFIX, area))
                    .created_after(since),
            });
        }

        if let Some(snippet) = error_snippet(&report.body) {
            planned.push(PlannedQuery {
                provenance: Provenance::ErrorPatternSearch,
                query: SearchQuery::open_issues(per_page).with_body_phrase(snippet),
            });
        }

        planned.truncate(self.limits.max_queries);
        planned
    }

    /// Run the planned searches one after another.
    ///
    /// A failed search is logged and dropped. The report itself never
    /// appears in the result.
    pub async fn search<S>(
        &self,
        report: &ReportText,
        detected_areas: &[String],
        store: &S,
        today: NaiveDate,
    ) -> Vec<Candidate>
    where
        S: IssueStore + ?Sized,
    {
        info!("Searching for similar issues");
        let mut found = CandidateSet::new();

        for planned in self.plan_queries(report, detected_areas, today) {
            debug!("Search ({}): {:?}", planned.provenance, planned.query);
            let hits = match store.search_issues(&planned.query).await {
                Ok(hits) => hits,
                Err(err) => {
                    obs::emit_search_failed(planned.provenance.as_str(), &err);
                    continue;
                }
            };
            for issue in hits {
                if issue.number == report.number {
                    continue;
                }
                found.insert(Candidate {
                    number: issue.number,
                    body_preview: truncate_chars(&issue.body, self.limits.body_preview_chars),
                    title: issue.title,
                    provenance: planned.provenance,
                });
            }
        }

        info!("Found {} similar issues", found.len());
        found.into_vec()
    }

    /// Magnets first, then up to `search_result_limit` search results not
    /// already present.
    pub fn assemble(&self, magnets: &[Magnet], search_results: &[Candidate]) -> Vec<Candidate> {
        let mut set = CandidateSet::new();
        for magnet in magnets {
            let (title, body_preview) = magnet
                .details
                .as_ref()
                .map(|d| (d.title.clone(), d.body_preview.clone()))
                .unwrap_or_default();
            set.insert(Candidate {
                number: magnet.number,
                title,
                body_preview,
                provenance: Provenance::KnownMagnet,
            });
        }
        for result in search_results.iter().take(self.limits.search_result_limit) {
            set.insert(result.clone());
        }
        set.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopwords() -> Vec<String> {
        CandidateLimits::default().stopwords
    }

    #[test]
    fn test_keyword_terms_drop_stopwords_and_short_words() {
        let terms = keyword_terms("The terminal is not working after update to v2", &stopwords());
        assert_eq!(terms, vec!["terminal", "update"]);
    }

    #[test]
    fn test_keyword_terms_stopwords_case_insensitive() {
        assert!(keyword_terms("When THE Zed", &stopwords()).is_empty());
    }

    #[test]
    fn test_error_snippet_captures_same_line() {
        let body = "Steps:\n1. open file\nthread 'main' panicked at crates/editor/src/lib.rs:10:5\nmore";
        assert_eq!(
            error_snippet(body).as_deref(),
            Some("at crates/editor/src/lib.rs:10:5")
        );
    }

    #[test]
    fn test_error_snippet_requires_whole_word() {
        assert_eq!(error_snippet("errors everywhere in the log file"), None);
        assert_eq!(error_snippet("unfailed but not a real match here"), None);
    }

    #[test]
    fn test_error_snippet_does_not_cross_lines() {
        assert_eq!(error_snippet("Error:\nsomething long on the next line"), None);
        assert_eq!(
            error_snippet("ERROR: Failed to spawn language server").as_deref(),
            Some(": Failed to spawn language server")
        );
    }

    #[test]
    fn test_error_snippet_caps_length() {
        let body = format!("error {}", "q".repeat(200));
        assert_eq!(error_snippet(&body).map(|s| s.len()), Some(90));
    }

    #[test]
    fn test_filter_with_no_detected_areas_is_identity() {
        let magnets = vec![Magnet::new(1, &["vim"], 3), Magnet::new(2, &[], 2)];
        assert_eq!(filter_magnets_by_areas(&magnets, &[]), magnets);
    }

    #[test]
    fn test_filter_uses_hierarchical_match() {
        let magnets = vec![
            Magnet::new(1, &["languages/rust"], 5),
            Magnet::new(2, &["vim"], 4),
            Magnet::new(3, &[], 2),
        ];
        let kept = filter_magnets_by_areas(&magnets, &["languages".to_string()]);
        let numbers: Vec<u64> = kept.iter().map(|m| m.number.0).collect();
        assert_eq!(numbers, vec![1, 3]);

        let kept = filter_magnets_by_areas(&magnets, &["rust".to_string()]);
        let numbers: Vec<u64> = kept.iter().map(|m| m.number.0).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn test_candidate_set_first_insert_wins() {
        let mut set = CandidateSet::new();
        let first = Candidate {
            number: IssueNumber(5),
            title: "a".to_string(),
            body_preview: String::new(),
            provenance: Provenance::KnownMagnet,
        };
        assert!(set.insert(first.clone()));
        assert!(!set.insert(Candidate {
            provenance: Provenance::KeywordSearch,
            ..first.clone()
        }));
        assert_eq!(set.into_vec(), vec![first]);
    }

    #[test]
    fn test_provenance_oracle_source() {
        assert_eq!(Provenance::KnownMagnet.oracle_source(), "known_duplicate_magnet");
        assert_eq!(Provenance::AreaSearch.oracle_source(), "search_result");
    }
}
