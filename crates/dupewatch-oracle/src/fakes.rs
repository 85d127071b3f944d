//! Scripted oracle for tests.
//!
//! Responses are stored as the raw text a model would return and run through
//! the same parsers as the real client.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{OracleError, OracleResult};
use crate::verdict::{
    parse_area_response, parse_duplicate_response, AreaDetection, CandidateBrief,
    DuplicateVerdict, ReportText,
};
use crate::ClassificationOracle;

#[derive(Debug, Default)]
struct Script {
    area_response: Option<String>,
    duplicate_response: Option<String>,
    fail: bool,
    taxonomies: Vec<String>,
    judged: Vec<Vec<CandidateBrief>>,
}

/// Oracle that replays canned responses and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<Script>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw area reply, e.g. `"editor, parity/vim"` or `"none"`.
    pub fn with_area_response(self, text: &str) -> Self {
        self.script.lock().unwrap().area_response = Some(text.to_string());
        self
    }

    /// Raw duplicate-analysis reply (normally JSON).
    pub fn with_duplicate_response(self, text: &str) -> Self {
        self.script.lock().unwrap().duplicate_response = Some(text.to_string());
        self
    }

    /// Every call fails with a transport error.
    pub fn failing(self) -> Self {
        self.script.lock().unwrap().fail = true;
        self
    }

    /// Taxonomies passed to `detect_areas`, in call order.
    pub fn taxonomies(&self) -> Vec<String> {
        self.script.lock().unwrap().taxonomies.clone()
    }

    /// Candidate lists passed to `judge_duplicates`, in call order.
    pub fn judged_candidates(&self) -> Vec<Vec<CandidateBrief>> {
        self.script.lock().unwrap().judged.clone()
    }
}

#[async_trait]
impl ClassificationOracle for ScriptedOracle {
    async fn detect_areas(
        &self,
        _report: &ReportText,
        taxonomy: &str,
    ) -> OracleResult<AreaDetection> {
        let mut script = self.script.lock().unwrap();
        script.taxonomies.push(taxonomy.to_string());
        if script.fail {
            return Err(OracleError::Transport("scripted failure".to_string()));
        }
        Ok(parse_area_response(
            script.area_response.as_deref().unwrap_or("none"),
        ))
    }

    async fn judge_duplicates(
        &self,
        _report: &ReportText,
        candidates: &[CandidateBrief],
    ) -> OracleResult<DuplicateVerdict> {
        let mut script = self.script.lock().unwrap();
        script.judged.push(candidates.to_vec());
        if script.fail {
            return Err(OracleError::Transport("scripted failure".to_string()));
        }
        Ok(parse_duplicate_response(
            script
                .duplicate_response
                .as_deref()
                .unwrap_or(r#"{"matches": [], "summary": "No duplicates"}"#),
        ))
    }
}
