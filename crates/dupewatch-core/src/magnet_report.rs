//! Producer side of the duplicate-magnet catalog.
//!
//! Scans open issues for duplicates marked against them, keeps the ones
//! re-reported at least twice and renders the markdown that
//! [`crate::catalog::parse_catalog`] reads back.

use std::collections::{BTreeSet, HashMap};

use dupewatch_store::{IssueNumber, IssueState, IssueStore, OpenIssueDuplicates};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::UNLABELED_SECTION;
use crate::error::Result;
use crate::taxonomy::AREA_LABEL_PREFIX;

/// Fewer closed duplicates than this and an issue is not a magnet.
pub const MIN_DUPLICATES: usize = 2;

const CATALOG_INTRO: &str = "These are the issues that are frequently re-reported. \
                             The list is generated regularly by running a script.";

/// One catalog row before rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetTally {
    pub number: IssueNumber,
    pub url: String,
    /// Area names, or `["(unlabeled)"]`
    pub areas: Vec<String>,
    pub duplicate_count: u32,
}

/// Count distinct closed duplicates of an open issue.
///
/// Returns `None` below [`MIN_DUPLICATES`].
pub fn tally_magnet(issue: &OpenIssueDuplicates) -> Option<MagnetTally> {
    let closed: BTreeSet<IssueNumber> = issue
        .duplicates
        .iter()
        .filter(|d| d.state == IssueState::Closed)
        .map(|d| d.number)
        .collect();
    if closed.len() < MIN_DUPLICATES {
        return None;
    }

    let mut areas: Vec<String> = issue
        .labels
        .iter()
        .filter_map(|l| l.strip_prefix(AREA_LABEL_PREFIX))
        .map(str::to_string)
        .collect();
    if areas.is_empty() {
        areas.push(UNLABELED_SECTION.to_string());
    }

    Some(MagnetTally {
        number: issue.number,
        url: issue.url.clone(),
        areas,
        duplicate_count: closed.len() as u32,
    })
}

/// Render the catalog markdown, grouped by area.
///
/// Areas are ordered by their summed duplicate count, ties by first
/// appearance; a magnet with several areas is listed under each.
pub fn render_catalog(tallies: &[MagnetTally]) -> String {
    let mut sections: Vec<(&str, u32, Vec<&MagnetTally>)> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();

    for tally in tallies {
        for area in &tally.areas {
            let i = *position.entry(area.as_str()).or_insert_with(|| {
                sections.push((area.as_str(), 0, Vec::new()));
                sections.len() - 1
            });
            sections[i].1 += tally.duplicate_count;
            sections[i].2.push(tally);
        }
    }
    sections.sort_by(|a, b| b.1.cmp(&a.1));

    let mut lines = vec![CATALOG_INTRO.to_string()];
    for (area, _, mut members) in sections {
        members.sort_by(|a, b| b.duplicate_count.cmp(&a.duplicate_count));
        lines.push(String::new());
        lines.push(format!("## {}", area));
        lines.push(String::new());
        for tally in members {
            lines.push(format!("-   [{:2} dupes] {}", tally.duplicate_count, tally.url));
        }
    }
    lines.join("\n")
}

/// Scan the store and render a fresh catalog, or `None` if nothing qualifies.
pub async fn build_catalog<S>(store: &S, max_pages: usize) -> Result<Option<String>>
where
    S: IssueStore + ?Sized,
{
    let open = store.open_issues_with_duplicates(max_pages).await?;
    let tallies: Vec<MagnetTally> = open.iter().filter_map(tally_magnet).collect();
    info!(
        "Scanned {} open issues with duplicates, {} are magnets",
        open.len(),
        tallies.len()
    );

    if tallies.is_empty() {
        return Ok(None);
    }
    Ok(Some(render_catalog(&tallies)))
}

/// Replace the tracking issue body with a rendered catalog.
pub async fn publish_catalog<S>(store: &S, tracking_issue: IssueNumber, body: &str) -> Result<()>
where
    S: IssueStore + ?Sized,
{
    store.update_issue_body(tracking_issue, body).await?;
    info!("Updated catalog in issue {}", tracking_issue);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupewatch_store::DuplicateEvent;

    fn dup(number: u64, state: IssueState) -> DuplicateEvent {
        DuplicateEvent {
            number: IssueNumber(number),
            state,
        }
    }

    fn open_issue(number: u64, labels: &[&str], duplicates: Vec<DuplicateEvent>) -> OpenIssueDuplicates {
        OpenIssueDuplicates {
            number: IssueNumber(number),
            url: format!("https://github.com/o/r/issues/{}", number),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            duplicates,
        }
    }

    #[test]
    fn test_tally_counts_distinct_closed_duplicates() {
        let issue = open_issue(
            1,
            &["area:editor", "bug"],
            vec![
                dup(2, IssueState::Closed),
                dup(2, IssueState::Closed),
                dup(3, IssueState::Closed),
                dup(4, IssueState::Open),
            ],
        );
        let tally = tally_magnet(&issue).unwrap();
        assert_eq!(tally.duplicate_count, 2);
        assert_eq!(tally.areas, vec!["editor".to_string()]);
    }

    #[test]
    fn test_tally_requires_two_closed_duplicates() {
        let issue = open_issue(
            1,
            &[],
            vec![dup(2, IssueState::Closed), dup(3, IssueState::Open)],
        );
        assert!(tally_magnet(&issue).is_none());
    }

    #[test]
    fn test_unlabeled_issue_goes_to_unlabeled_section() {
        let issue = open_issue(
            1,
            &["bug"],
            vec![dup(2, IssueState::Closed), dup(3, IssueState::Closed)],
        );
        assert_eq!(tally_magnet(&issue).unwrap().areas, vec![UNLABELED_SECTION.to_string()]);
    }

    #[test]
    fn test_render_orders_areas_by_total() {
        let tallies = vec![
            MagnetTally {
                number: IssueNumber(1),
                url: "https://x/issues/1".to_string(),
                areas: vec!["git".to_string()],
                duplicate_count: 3,
            },
            MagnetTally {
                number: IssueNumber(2),
                url: "https://x/issues/2".to_string(),
                areas: vec!["editor".to_string()],
                duplicate_count: 4,
            },
            MagnetTally {
                number: IssueNumber(3),
                url: "https://x/issues/3".to_string(),
                areas: vec!["editor".to_string()],
                duplicate_count: 12,
            },
        ];
        let rendered = render_catalog(&tallies);
        let expected = format!(
            "{}\n\n## editor\n\n-   [12 dupes] https://x/issues/3\n-   [ 4 dupes] https://x/issues/2\n\n## git\n\n-   [ 3 dupes] https://x/issues/1",
            CATALOG_INTRO
        );
        assert_eq!(rendered, expected);
    }
}
