//! The detector's duplicate comment: rendering, finding it again, reading it back.
//!
//! Suggested issues are written as `- #N` bullets at the start of a line;
//! the tracker parses exactly that form.

use dupewatch_oracle::DuplicateMatch;
use dupewatch_store::{Comment, IssueNumber};
use once_cell::sync::Lazy;
use regex::Regex;

/// Every detector comment starts with this.
pub const DETECTOR_COMMENT_PREFIX: &str = "This issue appears to be a duplicate of";

static SUGGESTION_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^- #(\d+)").expect("suggestion pattern compiles"));

fn explanation(m: &DuplicateMatch) -> String {
    match m.shared_root_cause.as_deref().filter(|c| !c.is_empty()) {
        Some(cause) => format!(
            "**{}:** {}\n\n**Shared root cause:** {}",
            m.number, m.explanation, cause
        ),
        None => format!("**{}:** {}", m.number, m.explanation),
    }
}

/// Comment body listing the given matches.
pub fn render_duplicate_comment(matches: &[DuplicateMatch]) -> String {
    let bullets = matches
        .iter()
        .map(|m| format!("- {}", m.number))
        .collect::<Vec<_>>()
        .join("\n");
    let explanations = matches
        .iter()
        .map(explanation)
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{prefix}:\n\
         \n\
         {bullets}\n\
         \n\
         **If this is indeed a duplicate:**\n\
         Please close this issue and subscribe to the linked issue for updates \
         (select \"Close as not planned\" → \"Duplicate\")\n\
         \n\
         **If this is a different issue:**\n\
         No action needed. A maintainer will review this shortly.\n\
         \n\
         <details>\n\
         <summary>Why were these issues selected?</summary>\n\
         \n\
         {explanations}\n\
         \n\
         </details>\n\
         \n\
         ---\n\
         <sub>This is an automated analysis and might be incorrect.</sub>",
        prefix = DETECTOR_COMMENT_PREFIX,
    )
}

/// The first comment written by `bot_login` that starts with `prefix`.
pub fn find_detector_comment<'a>(
    comments: &'a [Comment],
    bot_login: &str,
    prefix: &str,
) -> Option<&'a Comment> {
    comments
        .iter()
        .find(|c| c.author == bot_login && c.body.starts_with(prefix))
}

/// Issue numbers from `- #N` bullets, in order of appearance.
pub fn parse_suggested_issues(body: &str) -> Vec<IssueNumber> {
    SUGGESTION_BULLET
        .captures_iter(body)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .map(IssueNumber)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dupewatch_oracle::Confidence;

    fn matched(number: u64, cause: Option<&str>) -> DuplicateMatch {
        DuplicateMatch {
            number: IssueNumber(number),
            confidence: Confidence::High,
            shared_root_cause: cause.map(str::to_string),
            explanation: format!("same stack trace as {}", number),
        }
    }

    fn comment(author: &str, body: &str) -> Comment {
        Comment {
            author: author.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rendered_comment_round_trips_suggestions() {
        let body = render_duplicate_comment(&[matched(10, Some("stale cache")), matched(20, None)]);
        assert!(body.starts_with("This issue appears to be a duplicate of:\n\n- #10\n- #20\n"));
        assert!(body.contains("**#10:** same stack trace as 10\n\n**Shared root cause:** stale cache"));
        assert!(body.contains("**#20:** same stack trace as 20"));
        assert!(!body.contains("**Shared root cause:** \n"));
        assert_eq!(
            parse_suggested_issues(&body),
            vec![IssueNumber(10), IssueNumber(20)]
        );
    }

    #[test]
    fn test_parse_ignores_indented_and_inline_mentions() {
        let body = "See #5 and #6\n  - #7\n- #8 maybe\n-#9";
        assert_eq!(parse_suggested_issues(body), vec![IssueNumber(8)]);
    }

    #[test]
    fn test_find_requires_bot_author_and_prefix() {
        let comments = vec![
            comment("someone", "This issue appears to be a duplicate of:\n- #1"),
            comment("bot[bot]", "Thanks for the report"),
            comment("bot[bot]", "This issue appears to be a duplicate of:\n- #2"),
        ];
        let found = find_detector_comment(&comments, "bot[bot]", DETECTOR_COMMENT_PREFIX).unwrap();
        assert_eq!(parse_suggested_issues(&found.body), vec![IssueNumber(2)]);
        assert!(find_detector_comment(&comments[..2], "bot[bot]", DETECTOR_COMMENT_PREFIX).is_none());
    }
}
