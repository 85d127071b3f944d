//! Records exchanged with the issue store and the project board.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Repository-scoped issue number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueNumber(pub u64);

impl IssueNumber {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for IssueNumber {
    fn from(n: u64) -> Self {
        IssueNumber(n)
    }
}

impl std::fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Open/closed state of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    /// Parse the REST (`open`) or GraphQL (`OPEN`) spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Some(IssueState::Open),
            "closed" => Some(IssueState::Closed),
            _ => None,
        }
    }

    fn qualifier(self) -> &'static str {
        match self {
            IssueState::Open => "is:open",
            IssueState::Closed => "is:closed",
        }
    }
}

/// An issue as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: IssueNumber,
    /// Global node id, used by the project board
    pub node_id: String,
    pub title: String,
    pub body: String,
    /// Login of the reporter
    pub author: String,
    /// Issue type name (e.g. "Bug", "Crash")
    pub kind: Option<String>,
    pub state: IssueState,
    /// Closure reason as reported by the store ("duplicate", "not_planned", ...)
    pub state_reason: Option<String>,
    pub labels: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub url: String,
}

impl Issue {
    /// Minimal open issue, handy for building fixtures.
    pub fn new(number: u64, title: &str, author: &str) -> Self {
        Issue {
            number: IssueNumber(number),
            node_id: format!("I_node{}", number),
            title: title.to_string(),
            body: String::new(),
            author: author.to_string(),
            kind: None,
            state: IssueState::Open,
            state_reason: None,
            labels: Vec::new(),
            created_at: None,
            url: String::new(),
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn closed(mut self, reason: &str) -> Self {
        self.state = IssueState::Closed;
        self.state_reason = Some(reason.to_string());
        self
    }

    /// First `max_chars` characters of the body.
    pub fn body_preview(&self, max_chars: usize) -> String {
        truncate_chars(&self.body, max_chars)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Truncate on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// A comment on an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A repository label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Label {
    pub fn new(name: &str, description: &str) -> Self {
        Label {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Structured issue search.
///
/// Rendered to the GitHub search syntax by [`SearchQuery::to_query_string`];
/// results come back most recently created first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub state: Option<IssueState>,
    /// Free-text terms, joined with spaces
    pub terms: Vec<String>,
    /// Required labels
    pub labels: Vec<String>,
    /// Strictly-after creation date (`created:>`)
    pub created_after: Option<NaiveDate>,
    /// Exact phrase searched in issue bodies
    pub body_phrase: Option<String>,
    /// App slug that must have commented
    pub commenter_app: Option<String>,
    /// Labels that must be absent
    pub excluded_labels: Vec<String>,
    /// Inclusive creation date (`created:>=`)
    pub created_since: Option<NaiveDate>,
    /// Page size
    pub per_page: u32,
}

impl SearchQuery {
    /// Query over open issues with the given page size.
    pub fn open_issues(per_page: u32) -> Self {
        SearchQuery {
            state: Some(IssueState::Open),
            per_page,
            ..Default::default()
        }
    }

    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn without_label(mut self, label: impl Into<String>) -> Self {
        self.excluded_labels.push(label.into());
        self
    }

    pub fn created_after(mut self, date: NaiveDate) -> Self {
        self.created_after = Some(date);
        self
    }

    pub fn created_since(mut self, date: NaiveDate) -> Self {
        self.created_since = Some(date);
        self
    }

    pub fn with_body_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.body_phrase = Some(phrase.into());
        self
    }

    pub fn commented_by_app(mut self, app_slug: impl Into<String>) -> Self {
        self.commenter_app = Some(app_slug.into());
        self
    }

    /// Render as a GitHub search string scoped to `owner/repo` issues.
    pub fn to_query_string(&self, owner: &str, repo: &str) -> String {
        let mut parts = vec![format!("repo:{}/{}", owner, repo), "is:issue".to_string()];
        if let Some(state) = self.state {
            parts.push(state.qualifier().to_string());
        }
        if let Some(app) = &self.commenter_app {
            parts.push(format!("commenter:app/{}", app));
        }
        parts.extend(self.terms.iter().cloned());
        for label in &self.labels {
            parts.push(format!("label:\"{}\"", label));
        }
        for label in &self.excluded_labels {
            parts.push(format!("-label:\"{}\"", label));
        }
        if let Some(date) = self.created_after {
            parts.push(format!("created:>{}", date.format("%Y-%m-%d")));
        }
        if let Some(date) = self.created_since {
            parts.push(format!("created:>={}", date.format("%Y-%m-%d")));
        }
        if let Some(phrase) = &self.body_phrase {
            parts.push(format!("in:body \"{}\"", phrase.replace('"', "")));
        }
        parts.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Duplicate bookkeeping
// ---------------------------------------------------------------------------

/// An issue that was marked as a duplicate of some open issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEvent {
    pub number: IssueNumber,
    pub state: IssueState,
}

/// An open issue together with the duplicates filed against it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIssueDuplicates {
    pub number: IssueNumber,
    pub url: String,
    pub labels: Vec<String>,
    pub duplicates: Vec<DuplicateEvent>,
}

// ---------------------------------------------------------------------------
// Project board
// ---------------------------------------------------------------------------

/// One field of a project board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardField {
    pub id: String,
    /// Option name → option id, present for single-select fields only
    pub options: Option<BTreeMap<String, String>>,
}

/// Field and option ids of a project board
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoardSchema {
    pub project_id: String,
    pub fields: BTreeMap<String, BoardField>,
}

impl BoardSchema {
    pub fn new(project_id: &str) -> Self {
        BoardSchema {
            project_id: project_id.to_string(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a single-select field; ids are derived from the names.
    pub fn with_single_select(mut self, name: &str, options: &[&str]) -> Self {
        let options = options
            .iter()
            .map(|o| (o.to_string(), format!("opt:{}:{}", name, o)))
            .collect();
        self.fields.insert(
            name.to_string(),
            BoardField {
                id: format!("field:{}", name),
                options: Some(options),
            },
        );
        self
    }

    /// Add a free-text field.
    pub fn with_text_field(mut self, name: &str) -> Self {
        self.fields.insert(
            name.to_string(),
            BoardField {
                id: format!("field:{}", name),
                options: None,
            },
        );
        self
    }
}

/// Value written into a board field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Option id of a single-select field
    SingleSelectOption(String),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_number_displays_with_hash() {
        assert_eq!(IssueNumber(46355).to_string(), "#46355");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_query_string_keyword_search() {
        let q = SearchQuery::open_issues(15).with_terms(["crash", "opening", "terminal"]);
        assert_eq!(
            q.to_query_string("zed-industries", "zed"),
            "repo:zed-industries/zed is:issue is:open crash opening terminal"
        );
    }

    #[test]
    fn test_query_string_area_search() {
        let q = SearchQuery::open_issues(15)
            .with_label("area:editor")
            .created_after(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(
            q.to_query_string("o", "r"),
            "repo:o/r is:issue is:open label:\"area:editor\" created:>2026-01-01"
        );
    }

    #[test]
    fn test_query_string_sweep() {
        let q = SearchQuery::open_issues(100)
            .commented_by_app("community-bot")
            .without_label("state:needs triage")
            .created_since(NaiveDate::from_ymd_opt(2026, 2, 18).unwrap());
        assert_eq!(
            q.to_query_string("o", "r"),
            "repo:o/r is:issue is:open commenter:app/community-bot \
             -label:\"state:needs triage\" created:>=2026-02-18"
        );
    }

    #[test]
    fn test_body_phrase_drops_embedded_quotes() {
        let q = SearchQuery::open_issues(15).with_body_phrase("could not \"load\" file");
        assert!(q
            .to_query_string("o", "r")
            .ends_with("in:body \"could not load file\""));
    }

    #[test]
    fn test_issue_state_parse() {
        assert_eq!(IssueState::parse("OPEN"), Some(IssueState::Open));
        assert_eq!(IssueState::parse("closed"), Some(IssueState::Closed));
        assert_eq!(IssueState::parse("merged"), None);
    }

    #[test]
    fn test_board_schema_builders() {
        let schema = BoardSchema::new("P_1")
            .with_single_select("Outcome", &["Success"])
            .with_text_field("Notes");
        assert_eq!(schema.fields.len(), 2);
        assert!(schema.fields["Notes"].options.is_none());
        assert_eq!(
            schema.fields["Outcome"].options.as_ref().unwrap()["Success"],
            "opt:Outcome:Success"
        );
    }
}
