//! In-memory fakes for the collaborator traits (testing only)
//!
//! `MemoryIssueStore` and `MemoryProjectBoard` satisfy the trait contracts
//! without any network access and record what was written to them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store_traits::{IssueStore, ProjectBoard, StoreResult};
use crate::types::*;

/// Owner/repo used when the fake renders search queries
pub const FAKE_OWNER: &str = "fake-org";
pub const FAKE_REPO: &str = "fake-repo";

// ---------------------------------------------------------------------------
// MemoryIssueStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct IssueStoreState {
    issues: BTreeMap<IssueNumber, Issue>,
    comments: HashMap<IssueNumber, Vec<Comment>>,
    team_members: HashSet<(String, String)>,
    labels: Vec<Label>,
    /// (needle, hits): queries whose rendered text contains `needle` return `hits`
    search_rules: Vec<(String, Vec<IssueNumber>)>,
    failing_searches: Vec<String>,
    duplicate_targets: HashMap<IssueNumber, IssueNumber>,
    failing_duplicate_lookups: HashSet<IssueNumber>,
    failing_membership_checks: HashSet<String>,
    failing_posts: HashSet<IssueNumber>,
    open_duplicates: Vec<OpenIssueDuplicates>,
    executed_searches: Vec<String>,
    posted_comments: Vec<(IssueNumber, String)>,
    body_updates: Vec<(IssueNumber, String)>,
    fetch_count: usize,
}

/// In-memory issue store.
///
/// Search is rule based: [`MemoryIssueStore::with_search_hits`] registers a
/// needle, and any query whose rendered string contains it returns the
/// registered issues in order.
#[derive(Debug, Default)]
pub struct MemoryIssueStore {
    state: Mutex<IssueStoreState>,
}

impl MemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(self, issue: Issue) -> Self {
        self.state.lock().unwrap().issues.insert(issue.number, issue);
        self
    }

    pub fn with_comment(self, number: u64, comment: Comment) -> Self {
        self.state
            .lock()
            .unwrap()
            .comments
            .entry(IssueNumber(number))
            .or_default()
            .push(comment);
        self
    }

    pub fn with_team_member(self, team: &str, login: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .team_members
            .insert((team.to_string(), login.to_string()));
        self
    }

    pub fn with_labels(self, labels: Vec<Label>) -> Self {
        self.state.lock().unwrap().labels = labels;
        self
    }

    pub fn with_search_hits(self, needle: &str, hits: &[u64]) -> Self {
        self.state.lock().unwrap().search_rules.push((
            needle.to_string(),
            hits.iter().copied().map(IssueNumber).collect(),
        ));
        self
    }

    /// Queries whose rendered string contains `needle` fail with a transport error.
    pub fn failing_search(self, needle: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_searches
            .push(needle.to_string());
        self
    }

    pub fn with_duplicate_target(self, number: u64, canonical: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .duplicate_targets
            .insert(IssueNumber(number), IssueNumber(canonical));
        self
    }

    pub fn failing_duplicate_lookup(self, number: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_duplicate_lookups
            .insert(IssueNumber(number));
        self
    }

    pub fn failing_membership_check(self, login: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_membership_checks
            .insert(login.to_string());
        self
    }

    /// `post_comment` on this issue fails with a transport error.
    pub fn failing_post(self, number: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_posts
            .insert(IssueNumber(number));
        self
    }

    pub fn with_open_duplicates(self, issue: OpenIssueDuplicates) -> Self {
        self.state.lock().unwrap().open_duplicates.push(issue);
        self
    }

    /// Rendered text of every search executed, in order.
    pub fn executed_searches(&self) -> Vec<String> {
        self.state.lock().unwrap().executed_searches.clone()
    }

    pub fn posted_comments(&self) -> Vec<(IssueNumber, String)> {
        self.state.lock().unwrap().posted_comments.clone()
    }

    pub fn body_updates(&self) -> Vec<(IssueNumber, String)> {
        self.state.lock().unwrap().body_updates.clone()
    }

    /// Number of `fetch_issue` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetch_count
    }
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn fetch_issue(&self, number: IssueNumber) -> StoreResult<Issue> {
        let mut state = self.state.lock().unwrap();
        state.fetch_count += 1;
        state
            .issues
            .get(&number)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("issue {}", number)))
    }

    async fn search_issues(&self, query: &SearchQuery) -> StoreResult<Vec<Issue>> {
        let rendered = query.to_query_string(FAKE_OWNER, FAKE_REPO);
        let mut state = self.state.lock().unwrap();
        state.executed_searches.push(rendered.clone());

        if state
            .failing_searches
            .iter()
            .any(|needle| rendered.contains(needle.as_str()))
        {
            return Err(StoreError::Transport(format!(
                "search failed: {}",
                rendered
            )));
        }

        let hits: Vec<Issue> = state
            .search_rules
            .iter()
            .filter(|(needle, _)| rendered.contains(needle.as_str()))
            .flat_map(|(_, numbers)| numbers.iter())
            .filter_map(|n| state.issues.get(n).cloned())
            .take(query.per_page as usize)
            .collect();
        Ok(hits)
    }

    async fn list_comments(&self, number: IssueNumber) -> StoreResult<Vec<Comment>> {
        let state = self.state.lock().unwrap();
        Ok(state.comments.get(&number).cloned().unwrap_or_default())
    }

    async fn post_comment(&self, number: IssueNumber, body: &str) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.issues.contains_key(&number) {
            return Err(StoreError::NotFound(format!("issue {}", number)));
        }
        if state.failing_posts.contains(&number) {
            return Err(StoreError::Transport(format!(
                "comment on {} rejected",
                number
            )));
        }
        state.posted_comments.push((number, body.to_string()));
        Ok(())
    }

    async fn update_issue_body(&self, number: IssueNumber, body: &str) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let issue = state
            .issues
            .get_mut(&number)
            .ok_or_else(|| StoreError::NotFound(format!("issue {}", number)))?;
        issue.body = body.to_string();
        state.body_updates.push((number, body.to_string()));
        Ok(())
    }

    async fn is_team_member(&self, team_slug: &str, login: &str) -> StoreResult<bool> {
        let state = self.state.lock().unwrap();
        if state.failing_membership_checks.contains(login) {
            return Err(StoreError::Transport(format!(
                "membership check failed for {}",
                login
            )));
        }
        Ok(state
            .team_members
            .contains(&(team_slug.to_string(), login.to_string())))
    }

    async fn list_labels(&self) -> StoreResult<Vec<Label>> {
        Ok(self.state.lock().unwrap().labels.clone())
    }

    async fn duplicate_target(&self, number: IssueNumber) -> StoreResult<Option<IssueNumber>> {
        let state = self.state.lock().unwrap();
        if state.failing_duplicate_lookups.contains(&number) {
            return Err(StoreError::GraphQl(format!(
                "timeline unavailable for {}",
                number
            )));
        }
        Ok(state.duplicate_targets.get(&number).copied())
    }

    async fn open_issues_with_duplicates(
        &self,
        _max_pages: usize,
    ) -> StoreResult<Vec<OpenIssueDuplicates>> {
        Ok(self.state.lock().unwrap().open_duplicates.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryProjectBoard
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BoardState {
    schema: BoardSchema,
    /// issue node id → item id
    items: BTreeMap<String, String>,
    /// item id → field id → value
    values: HashMap<String, BTreeMap<String, FieldValue>>,
    schema_fetches: usize,
    failing_items: HashSet<String>,
}

/// In-memory project board.
#[derive(Debug, Default)]
pub struct MemoryProjectBoard {
    state: Mutex<BoardState>,
}

impl MemoryProjectBoard {
    pub fn new(schema: BoardSchema) -> Self {
        MemoryProjectBoard {
            state: Mutex::new(BoardState {
                schema,
                ..Default::default()
            }),
        }
    }

    /// Pretend the issue is already on the board.
    pub fn with_item(self, issue_node_id: &str, item_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .items
            .insert(issue_node_id.to_string(), item_id.to_string());
        self
    }

    /// `find_item` for this issue fails with a transport error.
    pub fn failing_item(self, issue_node_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_items
            .insert(issue_node_id.to_string());
        self
    }

    pub fn item_for(&self, issue_node_id: &str) -> Option<String> {
        self.state.lock().unwrap().items.get(issue_node_id).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn schema_fetches(&self) -> usize {
        self.state.lock().unwrap().schema_fetches
    }

    /// Field values of an item keyed by field *name*; single-select values
    /// are reported by option name.
    pub fn fields_of(&self, issue_node_id: &str) -> BTreeMap<String, String> {
        let state = self.state.lock().unwrap();
        let Some(item_id) = state.items.get(issue_node_id) else {
            return BTreeMap::new();
        };
        let Some(values) = state.values.get(item_id) else {
            return BTreeMap::new();
        };

        let mut named = BTreeMap::new();
        for (field_name, field) in &state.schema.fields {
            let Some(value) = values.get(&field.id) else {
                continue;
            };
            let rendered = match value {
                FieldValue::Text(text) => text.clone(),
                FieldValue::SingleSelectOption(option_id) => field
                    .options
                    .iter()
                    .flatten()
                    .find(|(_, id)| *id == option_id)
                    .map(|(name, _)| name.clone())
                    .unwrap_or_else(|| option_id.clone()),
            };
            named.insert(field_name.clone(), rendered);
        }
        named
    }
}

#[async_trait]
impl ProjectBoard for MemoryProjectBoard {
    async fn fetch_schema(&self) -> StoreResult<BoardSchema> {
        let mut state = self.state.lock().unwrap();
        state.schema_fetches += 1;
        Ok(state.schema.clone())
    }

    async fn find_item(&self, issue_node_id: &str) -> StoreResult<Option<String>> {
        let state = self.state.lock().unwrap();
        if state.failing_items.contains(issue_node_id) {
            return Err(StoreError::Transport(format!(
                "board lookup failed for {}",
                issue_node_id
            )));
        }
        Ok(state.items.get(issue_node_id).cloned())
    }

    async fn add_item(&self, project_id: &str, issue_node_id: &str) -> StoreResult<String> {
        let mut state = self.state.lock().unwrap();
        if project_id != state.schema.project_id {
            return Err(StoreError::NotFound(format!("project {}", project_id)));
        }
        let item_id = format!("PVTI_{}", state.items.len() + 1);
        state
            .items
            .insert(issue_node_id.to_string(), item_id.clone());
        Ok(item_id)
    }

    async fn set_field(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        value: &FieldValue,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if project_id != state.schema.project_id {
            return Err(StoreError::NotFound(format!("project {}", project_id)));
        }
        if !state.items.values().any(|id| id == item_id) {
            return Err(StoreError::NotFound(format!("item {}", item_id)));
        }
        state
            .values
            .entry(item_id.to_string())
            .or_default()
            .insert(field_id.to_string(), value.clone());
        Ok(())
    }
}
