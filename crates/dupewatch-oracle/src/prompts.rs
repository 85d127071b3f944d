//! Prompt text for the Messages API oracle.

use dupewatch_store::truncate_chars;

use crate::verdict::{CandidateBrief, ReportText};

/// Body characters sent along with an area detection request
pub const AREA_BODY_CHARS: usize = 4000;
/// Body characters sent along with a duplicate analysis request
pub const DUPLICATE_BODY_CHARS: usize = 3000;

pub const AREA_SYSTEM_PROMPT: &str = r#"You label GitHub issues with area names from a fixed taxonomy.

Reply with ONLY a comma-separated list of area names taken verbatim from the taxonomy.
- Give at most 3 areas, most relevant first
- If nothing in the taxonomy clearly applies, reply with: none
- Entries shown as "<prefix>/*" stand for a family of specific labels; reply with the
  specific label (for example "languages/rust", "tooling/eslint" or "parity/vscode")

Example replies:
- "editor, parity/vim"
- "ai, ai/agent panel"
- "none"
"#;

pub const DUPLICATE_SYSTEM_PROMPT: &str = r#"You decide whether a new GitHub issue duplicates any existing issue.

An existing issue is a duplicate only if it is caused by the SAME BUG in the code. Fixing
the existing issue would also fix the new one.

Symptoms are not root causes. "models missing", "can't sign in", "editor hangs" or
"venv not detected" can each be produced by many unrelated bugs. Two reports of the same
symptom are NOT duplicates unless you can name the specific defect they share. Issues that
merely sit in the same feature area, or that differ in error messages, triggers, platforms
or configuration, are NOT duplicates.

Confidence:
- "high": almost certainly the same bug; you can name the shared root cause and the
  reproduction steps, errors and triggers agree.
- "medium": specific technical details point to the same bug, with some doubt left.
Leave out anything that only shares symptoms or an area.

Reply with raw JSON only (no markdown fences), shaped like:
{
  "matches": [
    {
      "number": 12345,
      "confidence": "high|medium",
      "shared_root_cause": "the defect both issues share",
      "explanation": "concrete evidence from both issues"
    }
  ],
  "summary": "one sentence"
}

A false positive costs the reporter and the maintainers time; a missed duplicate costs
little. When unsure, return an empty "matches" array."#;

/// User message for area detection.
pub fn area_user_prompt(report: &ReportText, taxonomy: &str) -> String {
    format!(
        "## Area Taxonomy\n{}\n\n# Issue Title\n{}\n\n# Issue Body\n{}",
        taxonomy,
        report.title,
        truncate_chars(&report.body, AREA_BODY_CHARS)
    )
}

/// User message for duplicate analysis.
pub fn duplicate_user_prompt(
    report: &ReportText,
    candidates: &[CandidateBrief],
) -> serde_json::Result<String> {
    Ok(format!(
        "## New Issue #{}\n**Title:** {}\n\n**Body:**\n{}\n\n## Existing Issues to Compare\n{}",
        report.number.0,
        report.title,
        truncate_chars(&report.body, DUPLICATE_BODY_CHARS),
        serde_json::to_string_pretty(candidates)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupewatch_store::IssueNumber;

    fn report(body: &str) -> ReportText {
        ReportText {
            number: IssueNumber(77),
            title: "Vim mode breaks".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_area_prompt_truncates_body() {
        let prompt = area_user_prompt(&report(&"q".repeat(5000)), "- editor");
        assert!(prompt.starts_with("## Area Taxonomy\n- editor"));
        assert_eq!(prompt.matches('q').count(), AREA_BODY_CHARS);
    }

    #[test]
    fn test_duplicate_prompt_lists_candidates() {
        let candidates = vec![CandidateBrief {
            number: IssueNumber(5),
            title: "Old bug".to_string(),
            body_preview: "trace".to_string(),
            source: "known_duplicate_magnet".to_string(),
        }];
        let prompt = duplicate_user_prompt(&report("body"), &candidates).unwrap();
        assert!(prompt.contains("## New Issue #77"));
        assert!(prompt.contains("\"number\": 5"));
        assert!(prompt.contains("known_duplicate_magnet"));
    }
}
