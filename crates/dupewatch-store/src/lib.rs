//! dupewatch-store: issue tracker and project board collaborators
//!
//! This crate is the I/O layer of dupewatch. Everything the decision engine
//! needs from the outside world goes through two traits:
//!
//! ## Layer 0 - Collaborators
//!
//! - `IssueStore`: issues, comments, labels, search, team membership,
//!   duplicate bookkeeping
//! - `ProjectBoard`: the board that effectiveness outcomes are written to
//!
//! `GitHubClient` implements both against the GitHub REST and GraphQL APIs.

mod error;
pub mod fakes;
pub mod github;
pub mod store_traits;
mod types;

pub use error::StoreError;
pub use github::{GitHubClient, GitHubConfig};
pub use store_traits::{IssueStore, ProjectBoard, StoreResult};
pub use types::{
    truncate_chars, BoardField, BoardSchema, Comment, DuplicateEvent, FieldValue, Issue,
    IssueNumber, IssueState, Label, OpenIssueDuplicates, SearchQuery,
};
