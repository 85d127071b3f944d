//! GitHub REST + GraphQL implementation of the collaborator traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store_traits::{IssueStore, ProjectBoard, StoreResult};
use crate::types::{
    BoardField, BoardSchema, Comment, DuplicateEvent, FieldValue, Issue, IssueNumber, IssueState,
    Label, OpenIssueDuplicates, SearchQuery,
};

/// Public GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: u32 = 100;

/// GitHub connection settings
#[derive(Clone)]
pub struct GitHubConfig {
    /// REST API base URL
    pub api_url: String,
    /// GraphQL endpoint
    pub graphql_url: String,
    /// Repository owner (also the organization owning the team and board)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Bearer token
    pub token: String,
    /// Organization project board number
    pub project_number: u64,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("graphql_url", &self.graphql_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .field("project_number", &self.project_number)
            .finish()
    }
}

impl GitHubConfig {
    /// Config for `owner/repo` against the public API.
    pub fn new(owner: &str, repo: &str, token: &str) -> Self {
        GitHubConfig {
            api_url: DEFAULT_API_URL.to_string(),
            graphql_url: format!("{}/graphql", DEFAULT_API_URL),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            project_number: 0,
        }
    }

    /// Point both REST and GraphQL at another host (GitHub Enterprise, test servers).
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        let base = api_url.trim_end_matches('/');
        self.api_url = base.to_string();
        self.graphql_url = format!("{}/graphql", base);
        self
    }

    pub fn with_project_number(mut self, project_number: u64) -> Self {
        self.project_number = project_number;
        self
    }
}

/// Client for one repository and one organization project board
pub struct GitHubClient {
    config: GitHubConfig,
    http: Client,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> StoreResult<Self> {
        if config.token.is_empty() {
            return Err(StoreError::Config("GitHub token is empty".to_string()));
        }
        let http = Client::builder()
            .user_agent(concat!("dupewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(GitHubClient { config, http })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn repo_path(&self, suffix: &str) -> String {
        format!("repos/{}/{}/{}", self.config.owner, self.config.repo, suffix)
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request
            .bearer_auth(&self.config.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            url,
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> StoreResult<T> {
        let response = self.send(self.http.get(self.url(path)).query(query)).await?;
        Ok(response.json::<T>().await?)
    }

    /// Fetch every page of a list endpoint until an empty page comes back.
    async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let items: Vec<T> = self
                .get_json(
                    path,
                    &[
                        ("per_page", PAGE_SIZE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            if items.is_empty() {
                break;
            }
            all.extend(items);
            page += 1;
        }
        Ok(all)
    }

    async fn graphql(&self, query: &str, variables: Value) -> StoreResult<Value> {
        let request = self
            .http
            .post(&self.config.graphql_url)
            .json(&json!({ "query": query, "variables": variables }));
        let mut body: Value = self.send(request).await?.json().await?;
        if let Some(errors) = body.get("errors") {
            return Err(StoreError::GraphQl(errors.to_string()));
        }
        body.get_mut("data")
            .map(Value::take)
            .ok_or_else(|| StoreError::Decode("GraphQL response without data".to_string()))
    }
}

fn at<'a>(value: &'a Value, pointer: &str) -> StoreResult<&'a Value> {
    value
        .pointer(pointer)
        .ok_or_else(|| StoreError::Decode(format!("missing {} in response", pointer)))
}

fn array_at<'a>(value: &'a Value, pointer: &str) -> StoreResult<&'a Vec<Value>> {
    at(value, pointer)?
        .as_array()
        .ok_or_else(|| StoreError::Decode(format!("{} is not an array", pointer)))
}

fn str_at(value: &Value, pointer: &str) -> StoreResult<String> {
    at(value, pointer)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| StoreError::Decode(format!("{} is not a string", pointer)))
}

// ---------------------------------------------------------------------------
// REST payloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Deserialize)]
struct RawNamed {
    name: String,
}

#[derive(Deserialize)]
struct RawLabel {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct RawIssue {
    number: u64,
    #[serde(default)]
    node_id: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default, rename = "type")]
    kind: Option<RawNamed>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    state_reason: Option<String>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    html_url: String,
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        Issue {
            number: IssueNumber(raw.number),
            node_id: raw.node_id,
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            author: raw.user.map(|u| u.login).unwrap_or_default(),
            kind: raw.kind.map(|k| k.name),
            state: IssueState::parse(&raw.state).unwrap_or(IssueState::Open),
            state_reason: raw.state_reason,
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            created_at: raw.created_at,
            url: raw.html_url,
        }
    }
}

#[derive(Deserialize)]
struct RawComment {
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    body: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<RawIssue>,
}

#[derive(Deserialize)]
struct Membership {
    #[serde(default)]
    state: String,
}

// ---------------------------------------------------------------------------
// GraphQL documents
// ---------------------------------------------------------------------------

const DUPLICATE_TARGET_QUERY: &str = r#"
query($owner: String!, $repo: String!, $number: Int!) {
  repository(owner: $owner, name: $repo) {
    issue(number: $number) {
      timelineItems(last: 10, itemTypes: [MARKED_AS_DUPLICATE_EVENT]) {
        nodes {
          ... on MarkedAsDuplicateEvent {
            canonical { ... on Issue { number } }
          }
        }
      }
    }
  }
}
"#;

const OPEN_ISSUES_WITH_DUPLICATES_QUERY: &str = r#"
query($owner: String!, $repo: String!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    issues(first: 100, after: $cursor, states: [OPEN], orderBy: {field: UPDATED_AT, direction: DESC}) {
      pageInfo { hasNextPage endCursor }
      nodes {
        number
        url
        labels(first: 20) { nodes { name } }
        timelineItems(first: 100, itemTypes: [MARKED_AS_DUPLICATE_EVENT]) {
          nodes {
            ... on MarkedAsDuplicateEvent {
              duplicate { ... on Issue { number state } }
            }
          }
        }
      }
    }
  }
}
"#;

const BOARD_SCHEMA_QUERY: &str = r#"
query($org: String!, $number: Int!) {
  organization(login: $org) {
    projectV2(number: $number) {
      id
      fields(first: 30) {
        nodes {
          ... on ProjectV2SingleSelectField { id name options { id name } }
          ... on ProjectV2Field { id name }
        }
      }
    }
  }
}
"#;

const FIND_ITEM_QUERY: &str = r#"
query($id: ID!) {
  node(id: $id) {
    ... on Issue { projectItems(first: 20) { nodes { id project { number } } } }
  }
}
"#;

const ADD_ITEM_MUTATION: &str = r#"
mutation($projectId: ID!, $contentId: ID!) {
  addProjectV2ItemById(input: {projectId: $projectId, contentId: $contentId}) {
    item { id }
  }
}
"#;

const SET_FIELD_MUTATION: &str = r#"
mutation($projectId: ID!, $itemId: ID!, $fieldId: ID!, $value: ProjectV2FieldValue!) {
  updateProjectV2ItemFieldValue(input: {
    projectId: $projectId
    itemId: $itemId
    fieldId: $fieldId
    value: $value
  }) {
    projectV2Item { id }
  }
}
"#;

fn open_issue_from_node(node: &Value) -> Option<OpenIssueDuplicates> {
    let number = node.get("number")?.as_u64()?;
    let url = node.get("url")?.as_str()?.to_string();
    let labels = node
        .pointer("/labels/nodes")
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|l| l.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let duplicates = node
        .pointer("/timelineItems/nodes")
        .and_then(Value::as_array)
        .map(|events| {
            events
                .iter()
                .filter_map(|e| {
                    let number = e.pointer("/duplicate/number")?.as_u64()?;
                    let state = IssueState::parse(e.pointer("/duplicate/state")?.as_str()?)?;
                    Some(DuplicateEvent {
                        number: IssueNumber(number),
                        state,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(OpenIssueDuplicates {
        number: IssueNumber(number),
        url,
        labels,
        duplicates,
    })
}

#[async_trait]
impl IssueStore for GitHubClient {
    async fn fetch_issue(&self, number: IssueNumber) -> StoreResult<Issue> {
        debug!("Fetching issue {}", number);
        let raw: RawIssue = self
            .get_json(&self.repo_path(&format!("issues/{}", number.0)), &[])
            .await?;
        Ok(raw.into())
    }

    async fn search_issues(&self, query: &SearchQuery) -> StoreResult<Vec<Issue>> {
        let q = query.to_query_string(&self.config.owner, &self.config.repo);
        let page: SearchPage = self
            .get_json(
                "search/issues",
                &[
                    ("q", q),
                    ("sort", "created".to_string()),
                    ("order", "desc".to_string()),
                    ("per_page", query.per_page.to_string()),
                ],
            )
            .await?;
        Ok(page.items.into_iter().map(Issue::from).collect())
    }

    async fn list_comments(&self, number: IssueNumber) -> StoreResult<Vec<Comment>> {
        let raw: Vec<RawComment> = self
            .get_all_pages(&self.repo_path(&format!("issues/{}/comments", number.0)))
            .await?;
        Ok(raw
            .into_iter()
            .map(|c| Comment {
                author: c.user.map(|u| u.login).unwrap_or_default(),
                body: c.body.unwrap_or_default(),
                created_at: c.created_at,
            })
            .collect())
    }

    async fn post_comment(&self, number: IssueNumber, body: &str) -> StoreResult<()> {
        let url = self.url(&self.repo_path(&format!("issues/{}/comments", number.0)));
        self.send(self.http.post(url).json(&json!({ "body": body })))
            .await?;
        info!("Posted comment on {}", number);
        Ok(())
    }

    async fn update_issue_body(&self, number: IssueNumber, body: &str) -> StoreResult<()> {
        let url = self.url(&self.repo_path(&format!("issues/{}", number.0)));
        self.send(self.http.patch(url).json(&json!({ "body": body })))
            .await?;
        info!("Updated body of {}", number);
        Ok(())
    }

    async fn is_team_member(&self, team_slug: &str, login: &str) -> StoreResult<bool> {
        let path = format!(
            "orgs/{}/teams/{}/memberships/{}",
            self.config.owner, team_slug, login
        );
        match self.get_json::<Membership>(&path, &[]).await {
            Ok(membership) => Ok(membership.state == "active"),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn list_labels(&self) -> StoreResult<Vec<Label>> {
        let raw: Vec<RawLabel> = self.get_all_pages(&self.repo_path("labels")).await?;
        Ok(raw
            .into_iter()
            .map(|l| Label {
                name: l.name,
                description: l.description.unwrap_or_default(),
            })
            .collect())
    }

    async fn duplicate_target(&self, number: IssueNumber) -> StoreResult<Option<IssueNumber>> {
        let data = self
            .graphql(
                DUPLICATE_TARGET_QUERY,
                json!({
                    "owner": self.config.owner,
                    "repo": self.config.repo,
                    "number": number.0,
                }),
            )
            .await?;
        let nodes = array_at(&data, "/repository/issue/timelineItems/nodes")?;
        Ok(nodes
            .iter()
            .rev()
            .find_map(|n| n.pointer("/canonical/number").and_then(Value::as_u64))
            .map(IssueNumber))
    }

    async fn open_issues_with_duplicates(
        &self,
        max_pages: usize,
    ) -> StoreResult<Vec<OpenIssueDuplicates>> {
        info!(
            "Scanning open issues of {}/{} for duplicates",
            self.config.owner, self.config.repo
        );
        let mut cursor: Option<String> = None;
        let mut found = Vec::new();
        let mut scanned = 0usize;

        for page in 0..max_pages {
            let data = self
                .graphql(
                    OPEN_ISSUES_WITH_DUPLICATES_QUERY,
                    json!({
                        "owner": self.config.owner,
                        "repo": self.config.repo,
                        "cursor": cursor,
                    }),
                )
                .await?;
            let nodes = array_at(&data, "/repository/issues/nodes")?;
            scanned += nodes.len();
            found.extend(
                nodes
                    .iter()
                    .filter_map(open_issue_from_node)
                    .filter(|issue| !issue.duplicates.is_empty()),
            );

            let has_next = at(&data, "/repository/issues/pageInfo/hasNextPage")?
                .as_bool()
                .unwrap_or(false);
            if !has_next {
                info!("Done: scanned {} open issues", scanned);
                break;
            }
            cursor = Some(str_at(&data, "/repository/issues/pageInfo/endCursor")?);
            info!(
                "Page {}: scanned {} open issues, {} have duplicates",
                page + 1,
                scanned,
                found.len()
            );
        }

        Ok(found)
    }
}

#[async_trait]
impl ProjectBoard for GitHubClient {
    async fn fetch_schema(&self) -> StoreResult<BoardSchema> {
        if self.config.project_number == 0 {
            return Err(StoreError::Config("project number is not set".to_string()));
        }
        let data = self
            .graphql(
                BOARD_SCHEMA_QUERY,
                json!({ "org": self.config.owner, "number": self.config.project_number }),
            )
            .await?;

        let mut schema = BoardSchema::new(&str_at(&data, "/organization/projectV2/id")?);
        for node in array_at(&data, "/organization/projectV2/fields/nodes")? {
            let (Some(name), Some(id)) = (
                node.get("name").and_then(Value::as_str),
                node.get("id").and_then(Value::as_str),
            ) else {
                continue;
            };
            let options = node.get("options").and_then(Value::as_array).map(|opts| {
                opts.iter()
                    .filter_map(|o| {
                        Some((
                            o.get("name")?.as_str()?.to_string(),
                            o.get("id")?.as_str()?.to_string(),
                        ))
                    })
                    .collect()
            });
            schema.fields.insert(
                name.to_string(),
                BoardField {
                    id: id.to_string(),
                    options,
                },
            );
        }
        Ok(schema)
    }

    async fn find_item(&self, issue_node_id: &str) -> StoreResult<Option<String>> {
        let data = self
            .graphql(FIND_ITEM_QUERY, json!({ "id": issue_node_id }))
            .await?;
        let items = array_at(&data, "/node/projectItems/nodes")?;
        Ok(items
            .iter()
            .find(|item| {
                item.pointer("/project/number").and_then(Value::as_u64)
                    == Some(self.config.project_number)
            })
            .and_then(|item| item.get("id").and_then(Value::as_str))
            .map(str::to_string))
    }

    async fn add_item(&self, project_id: &str, issue_node_id: &str) -> StoreResult<String> {
        let data = self
            .graphql(
                ADD_ITEM_MUTATION,
                json!({ "projectId": project_id, "contentId": issue_node_id }),
            )
            .await?;
        str_at(&data, "/addProjectV2ItemById/item/id")
    }

    async fn set_field(
        &self,
        project_id: &str,
        item_id: &str,
        field_id: &str,
        value: &FieldValue,
    ) -> StoreResult<()> {
        let value = match value {
            FieldValue::SingleSelectOption(option_id) => json!({ "singleSelectOptionId": option_id }),
            FieldValue::Text(text) => json!({ "text": text }),
        };
        self.graphql(
            SET_FIELD_MUTATION,
            json!({
                "projectId": project_id,
                "itemId": item_id,
                "fieldId": field_id,
                "value": value,
            }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_redacts_token() {
        let config = GitHubConfig::new("o", "r", "ghp_secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_with_api_url_moves_graphql_too() {
        let config = GitHubConfig::new("o", "r", "t").with_api_url("https://ghe.example.com/api/");
        assert_eq!(config.api_url, "https://ghe.example.com/api");
        assert_eq!(config.graphql_url, "https://ghe.example.com/api/graphql");
    }

    #[test]
    fn test_empty_token_is_rejected() {
        let err = GitHubClient::new(GitHubConfig::new("o", "r", "")).err().unwrap();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_raw_issue_conversion() {
        let raw: RawIssue = serde_json::from_value(json!({
            "number": 42,
            "node_id": "I_42",
            "title": "Crash on start",
            "body": null,
            "user": { "login": "alice" },
            "type": { "name": "Crash" },
            "state": "closed",
            "state_reason": "duplicate",
            "labels": [{ "name": "area:editor", "description": null }],
            "created_at": "2026-03-01T10:00:00Z",
            "html_url": "https://github.com/o/r/issues/42"
        }))
        .unwrap();
        let issue: Issue = raw.into();
        assert_eq!(issue.number, IssueNumber(42));
        assert_eq!(issue.body, "");
        assert_eq!(issue.author, "alice");
        assert_eq!(issue.kind.as_deref(), Some("Crash"));
        assert_eq!(issue.state, IssueState::Closed);
        assert_eq!(issue.labels, vec!["area:editor".to_string()]);
    }

    #[test]
    fn test_open_issue_node_parsing_skips_malformed_events() {
        let node = json!({
            "number": 7,
            "url": "https://github.com/o/r/issues/7",
            "labels": { "nodes": [{ "name": "area:vim" }] },
            "timelineItems": { "nodes": [
                { "duplicate": { "number": 8, "state": "CLOSED" } },
                { "duplicate": null },
                {}
            ] }
        });
        let parsed = open_issue_from_node(&node).unwrap();
        assert_eq!(parsed.labels, vec!["area:vim".to_string()]);
        assert_eq!(
            parsed.duplicates,
            vec![DuplicateEvent {
                number: IssueNumber(8),
                state: IssueState::Closed
            }]
        );
    }
}
