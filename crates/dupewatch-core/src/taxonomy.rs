//! Hierarchical area labels.
//!
//! Areas are `/`-delimited paths (`languages/rust`, `ai/agent panel`). Two
//! areas match when they are equal or one is an ancestor of the other, so a
//! report detected as `editor` matches a magnet filed under
//! `editor/diagnostics` and vice versa.

use std::collections::BTreeSet;

use dupewatch_store::Label;
use serde::{Deserialize, Serialize};

/// Repository labels carrying an area start with this prefix.
pub const AREA_LABEL_PREFIX: &str = "area:";

/// An area label with its prefix stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaLabel {
    pub name: String,
    pub description: String,
}

impl AreaLabel {
    pub fn new(name: &str, description: &str) -> Self {
        AreaLabel {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Whether `label` sits strictly below `ancestor` in the hierarchy.
fn is_descendant(label: &str, ancestor: &str) -> bool {
    label
        .strip_prefix(ancestor)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|suffix| !suffix.is_empty())
}

/// Bidirectional, ancestor-inclusive area match.
pub fn areas_match(detected: &str, candidate: &str) -> bool {
    detected == candidate || is_descendant(candidate, detected) || is_descendant(detected, candidate)
}

/// Whether `label` ends with the whole segments of `tail`.
fn ends_with_segments(label: &str, tail: &str) -> bool {
    !tail.is_empty()
        && label
            .strip_suffix(tail)
            .is_some_and(|head| head.ends_with('/'))
}

/// [`areas_match`], or one area names the trailing segments of the other.
///
/// Collapsed families reach the oracle as `languages/*`, so a report about
/// `languages/rust` can come back as plain `rust`.
pub fn areas_related(detected: &str, candidate: &str) -> bool {
    areas_match(detected, candidate)
        || ends_with_segments(candidate, detected)
        || ends_with_segments(detected, candidate)
}

/// Keep the `area:` labels of a repository, prefix stripped.
pub fn area_labels(labels: &[Label]) -> Vec<AreaLabel> {
    labels
        .iter()
        .filter_map(|label| {
            label
                .name
                .strip_prefix(AREA_LABEL_PREFIX)
                .map(|name| AreaLabel::new(name, &label.description))
        })
        .collect()
}

/// Display lines for a taxonomy, one family line per collapsible prefix.
///
/// Output is deduplicated and sorted.
pub fn collapse_taxonomy(labels: &[AreaLabel], collapsible_prefixes: &[String]) -> Vec<String> {
    let lines: BTreeSet<String> = labels
        .iter()
        .map(|area| {
            let family = collapsible_prefixes
                .iter()
                .find(|prefix| is_descendant(&area.name, prefix));
            match family {
                Some(prefix) => format!("{}/* (multiple specific sub-labels exist)", prefix),
                None if area.description.is_empty() => area.name.clone(),
                None => format!("{}: {}", area.name, area.description),
            }
        })
        .collect();
    lines.into_iter().collect()
}

/// Bullet list form of [`collapse_taxonomy`] output, as shown to the oracle.
pub fn render_taxonomy(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| format!("- {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
