//! Collaborator trait definitions
//!
//! - `IssueStore`: issues, comments, labels, search, team membership and
//!   duplicate bookkeeping of one repository
//! - `ProjectBoard`: a project board that outcome records are written to
//!
//! Both traits are async and transport-agnostic. `GitHubClient` implements
//! them against the GitHub APIs; in-memory fakes live in the `fakes` module.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{
    BoardSchema, Comment, FieldValue, Issue, IssueNumber, Label, OpenIssueDuplicates, SearchQuery,
};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Remote issue store scoped to a single repository.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Fetch one issue. Fails with a not-found error if it does not exist.
    async fn fetch_issue(&self, number: IssueNumber) -> StoreResult<Issue>;

    /// Run a search, most recently created first, at most `query.per_page` hits.
    async fn search_issues(&self, query: &SearchQuery) -> StoreResult<Vec<Issue>>;

    /// All comments on an issue, oldest first.
    async fn list_comments(&self, number: IssueNumber) -> StoreResult<Vec<Comment>>;

    /// Post a new comment.
    async fn post_comment(&self, number: IssueNumber, body: &str) -> StoreResult<()>;

    /// Replace an issue body.
    async fn update_issue_body(&self, number: IssueNumber, body: &str) -> StoreResult<()>;

    /// Whether `login` is an active member of `team_slug`.
    ///
    /// A membership that does not exist is `Ok(false)`, not an error.
    async fn is_team_member(&self, team_slug: &str, login: &str) -> StoreResult<bool>;

    /// All repository labels.
    async fn list_labels(&self) -> StoreResult<Vec<Label>>;

    /// The issue this one was most recently marked a duplicate of, if any.
    async fn duplicate_target(&self, number: IssueNumber) -> StoreResult<Option<IssueNumber>>;

    /// Open issues that have had duplicates marked against them, scanning
    /// at most `max_pages` pages.
    async fn open_issues_with_duplicates(
        &self,
        max_pages: usize,
    ) -> StoreResult<Vec<OpenIssueDuplicates>>;
}

/// Project board that tracks one item per issue.
///
/// Callers upsert: `find_item`, then `add_item` only when absent, then
/// `set_field` per field.
#[async_trait]
pub trait ProjectBoard: Send + Sync {
    /// Board id plus field/option ids by name.
    async fn fetch_schema(&self) -> StoreResult<BoardSchema>;

    /// Item id of the issue on this board, if it is already there.
    async fn find_item(&self, issue_node_id: &str) -> StoreResult<Option<String>>;

    /// Add the issue to the board, returning the new item id.
    async fn add_item(&self, project_id: &str, issue_node_id: &str) -> StoreResult<String>;

    /// Write one field of one item.
    async fn set_field(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        value: &FieldValue,
    ) -> StoreResult<()>;
}
