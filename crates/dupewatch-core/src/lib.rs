//! dupewatch Core Library
//!
//! The decision engine: taxonomy matching, the duplicate-magnet catalog,
//! candidate assembly and outcome classification, plus the detector,
//! tracker and magnet-report workflows built on them.
//!
//! ## Layer 2 - Decisions
//!
//! Everything here talks to the outside world only through
//! `dupewatch_store` and `dupewatch_oracle` traits.

pub mod board;
pub mod bot_version;
pub mod candidates;
pub mod catalog;
pub mod comment;
pub mod config;
pub mod detector;
mod error;
pub mod magnet_report;
pub mod obs;
pub mod outcome;
pub mod taxonomy;
pub mod telemetry;
pub mod tracker;

pub use board::{BoardSchemaCache, BoardSync};
pub use bot_version::{BotDeployment, BotVersionTimeline};
pub use candidates::{
    error_snippet, filter_magnets_by_areas, keyword_terms, Candidate, CandidateAssembler,
    CandidateLimits, CandidateSet, PlannedQuery, Provenance,
};
pub use catalog::{enrich_magnets, parse_catalog, Magnet, MagnetDetails, UNLABELED_SECTION};
pub use comment::{
    find_detector_comment, parse_suggested_issues, render_duplicate_comment,
    DETECTOR_COMMENT_PREFIX,
};
pub use config::{DetectorConfig, DupewatchConfig, OracleConfig, RepoConfig, TrackerConfig};
pub use detector::{CheckReport, DuplicateDetector, IssueSummary};
pub use error::{DupewatchError, Result};
pub use magnet_report::{
    build_catalog, publish_catalog, render_catalog, tally_magnet, MagnetTally,
};
pub use outcome::{
    CloseReason, DetectorComment, DuplicateTargetLookup, Outcome, OutcomeClassifier,
    OutcomeEvent, OutcomeRecord, ReviewStatus,
};
pub use taxonomy::{
    area_labels, areas_match, areas_related, collapse_taxonomy, render_taxonomy, AreaLabel,
};
pub use tracker::{EffectivenessTracker, SkipReason, SweepFailure, SweepItem, SweepSummary};
