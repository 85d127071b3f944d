//! Duplicate-magnet catalog parsing.
//!
//! The catalog is a markdown issue body produced by
//! [`crate::magnet_report::render_catalog`]:
//!
//! ```text
//! ## editor
//!
//! -   [ 7 dupes] https://github.com/owner/repo/issues/1234
//! ```
//!
//! Each `## <area>` header opens a section; bullets under it list magnets
//! with their duplicate count. Anything else is prose and ignored.

use std::collections::HashMap;

use dupewatch_store::{truncate_chars, IssueNumber, IssueStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Section holding magnets without any area label. Such magnets match every area.
pub const UNLABELED_SECTION: &str = "(unlabeled)";

/// Title and body excerpt of a magnet, fetched on demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetDetails {
    pub title: String,
    pub body_preview: String,
}

/// An issue that keeps getting re-reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Magnet {
    pub number: IssueNumber,
    /// Empty for unlabeled magnets
    pub areas: Vec<String>,
    pub duplicate_count: u32,
    /// Filled by [`enrich_magnets`]
    pub details: Option<MagnetDetails>,
}

impl Magnet {
    pub fn new(number: u64, areas: &[&str], duplicate_count: u32) -> Self {
        Magnet {
            number: IssueNumber(number),
            areas: areas.iter().map(|a| a.to_string()).collect(),
            duplicate_count,
            details: None,
        }
    }

    pub fn is_unlabeled(&self) -> bool {
        self.areas.is_empty()
    }
}

struct Bullet {
    duplicate_count: u32,
    number: IssueNumber,
}

/// `-   [N dupes] https://.../issues/NUMBER`
fn parse_bullet(line: &str) -> Option<Bullet> {
    if !line.starts_with('-') || !line.contains("/issues/") {
        return None;
    }
    let duplicate_count = line
        .split_once('[')?
        .1
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    let number = line
        .split_once("/issues/")?
        .1
        .split_whitespace()
        .next()?
        .trim_end_matches(')')
        .parse()
        .ok()?;
    Some(Bullet {
        duplicate_count,
        number: IssueNumber(number),
    })
}

/// Accumulator of the single forward scan over catalog lines.
#[derive(Default)]
struct CatalogScan {
    current_area: Option<String>,
    magnets: Vec<Magnet>,
    index: HashMap<IssueNumber, usize>,
}

impl CatalogScan {
    fn line(mut self, line: &str) -> Self {
        if let Some(header) = line.strip_prefix("## ") {
            self.current_area = Some(header.trim().to_string());
            return self;
        }
        let Some(area) = self.current_area.clone() else {
            return self;
        };
        match parse_bullet(line) {
            Some(bullet) => self.record(area, bullet),
            None => self,
        }
    }

    fn record(mut self, area: String, bullet: Bullet) -> Self {
        let unlabeled_section = area == UNLABELED_SECTION;

        match self.index.get(&bullet.number) {
            Some(&i) => {
                // The first listing fixes the count and whether the magnet is
                // unlabeled; later named sections only add areas.
                let magnet = &mut self.magnets[i];
                if !unlabeled_section && !magnet.is_unlabeled() && !magnet.areas.contains(&area) {
                    magnet.areas.push(area);
                }
            }
            None => {
                self.index.insert(bullet.number, self.magnets.len());
                self.magnets.push(Magnet {
                    number: bullet.number,
                    areas: if unlabeled_section {
                        Vec::new()
                    } else {
                        vec![area]
                    },
                    duplicate_count: bullet.duplicate_count,
                    details: None,
                });
            }
        }
        self
    }
}

/// Parse catalog text into magnets, most duplicated first.
pub fn parse_catalog(text: &str) -> Vec<Magnet> {
    let mut magnets = text
        .lines()
        .fold(CatalogScan::default(), CatalogScan::line)
        .magnets;
    magnets.sort_by(|a, b| b.duplicate_count.cmp(&a.duplicate_count));
    info!("Parsed {} duplicate magnets", magnets.len());
    magnets
}

/// Fetch title and body preview for exactly the given magnets.
pub async fn enrich_magnets<S>(
    magnets: &mut [Magnet],
    store: &S,
    preview_chars: usize,
) -> Result<()>
where
    S: IssueStore + ?Sized,
{
    info!("Fetching details for {} magnets", magnets.len());
    for magnet in magnets.iter_mut() {
        let issue = store.fetch_issue(magnet.number).await?;
        debug!("Enriched magnet {}: {}", magnet.number, issue.title);
        magnet.details = Some(MagnetDetails {
            body_preview: truncate_chars(&issue.body, preview_chars),
            title: issue.title,
        });
    }
    Ok(())
}
