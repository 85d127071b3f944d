//! Structured events for the detector and tracker workflows.
//!
//! Events are emitted with an `event` field so JSON logs can be filtered on
//! it, e.g. `event=outcome.classified`.

use dupewatch_store::IssueNumber;
use tracing::{info, warn};

/// Emit event: an issue received an outcome.
pub fn emit_outcome_classified(
    number: IssueNumber,
    outcome: &str,
    status: &str,
    bot_version: Option<&str>,
) {
    info!(
        event = "outcome.classified",
        issue = number.get(),
        outcome = %outcome,
        status = %status,
        bot_version = bot_version.unwrap_or(""),
    );
}

/// Emit event: a candidate search failed and was dropped (warning level).
pub fn emit_search_failed(search_type: &str, error: &dyn std::fmt::Display) {
    warn!(event = "search.failed", search_type = %search_type, error = %error);
}

/// Emit event: an open-issue sweep finished.
pub fn emit_sweep_finished(added: usize, skipped: usize, failures: usize) {
    info!(
        event = "sweep.finished",
        added = added,
        skipped = skipped,
        failures = failures,
    );
}

/// Emit event: the detector commented on an issue.
pub fn emit_comment_posted(number: IssueNumber, suggested: usize) {
    info!(event = "comment.posted", issue = number.get(), suggested = suggested);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        emit_outcome_classified(IssueNumber(1), "Success", "Auto-classified", Some("v1"));
        emit_search_failed("title_keywords", &"timeout");
        emit_sweep_finished(1, 2, 0);
        emit_comment_posted(IssueNumber(1), 2);
    }
}
