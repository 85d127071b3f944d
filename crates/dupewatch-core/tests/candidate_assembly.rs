use std::collections::HashSet;

use chrono::NaiveDate;
use dupewatch_core::{
    filter_magnets_by_areas, Candidate, CandidateAssembler, CandidateLimits, Magnet,
    MagnetDetails, Provenance,
};
use dupewatch_oracle::ReportText;
use dupewatch_store::fakes::MemoryIssueStore;
use dupewatch_store::{Issue, IssueNumber};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

fn report() -> ReportText {
    ReportText {
        number: IssueNumber(1),
        title: "Terminal crash when resizing split".to_string(),
        body: "Steps\n\nthread 'main' panicked at crates/terminal/src/grid.rs:42\n".to_string(),
    }
}

fn store() -> MemoryIssueStore {
    MemoryIssueStore::new()
        .with_issue(Issue::new(1, "Terminal crash when resizing split", "me"))
        .with_issue(Issue::new(5, "Terminal crash on resize", "a").with_body("resize"))
        .with_issue(Issue::new(6, "Crash in terminal grid", "b"))
        .with_issue(Issue::new(7, "Terminal font blurry", "c"))
        .with_issue(Issue::new(8, "Grid index out of bounds", "d"))
        .with_search_hits("Terminal crash resizing split", &[1, 5, 6])
        .with_search_hits("label:\"area:terminal\"", &[6, 7])
        .with_search_hits("in:body", &[8])
}

fn provenance_of(candidates: &[Candidate]) -> Vec<(u64, Provenance)> {
    candidates
        .iter()
        .map(|c| (c.number.0, c.provenance))
        .collect()
}

#[test]
fn queries_are_planned_in_priority_order() {
    let assembler = CandidateAssembler::default();
    let planned = assembler.plan_queries(&report(), &["terminal".to_string()], today());

    let kinds: Vec<Provenance> = planned.iter().map(|p| p.provenance).collect();
    assert_eq!(
        kinds,
        vec![
            Provenance::KeywordSearch,
            Provenance::AreaSearch,
            Provenance::ErrorPatternSearch,
        ]
    );
    assert_eq!(
        planned[1].query.created_after,
        NaiveDate::from_ymd_opt(2026, 8, 18)
    );
    assert_eq!(
        planned[2].query.body_phrase.as_deref(),
        Some("at crates/terminal/src/grid.rs:42")
    );
    assert!(planned.iter().all(|p| p.query.per_page == 15));
}

#[test]
fn query_plan_is_capped() {
    let assembler = CandidateAssembler::new(CandidateLimits {
        max_queries: 2,
        ..CandidateLimits::default()
    });
    let areas = vec!["terminal".to_string(), "editor".to_string(), "git".to_string()];
    let planned = assembler.plan_queries(&report(), &areas, today());
    assert_eq!(planned.len(), 2);
    assert_eq!(planned[0].provenance, Provenance::KeywordSearch);
    assert_eq!(planned[1].provenance, Provenance::AreaSearch);
}

#[test]
fn title_of_only_stopwords_skips_keyword_query() {
    let report = ReportText {
        number: IssueNumber(1),
        title: "It does not work".to_string(),
        body: String::new(),
    };
    let planned = CandidateAssembler::default().plan_queries(&report, &[], today());
    assert!(planned.is_empty());
}

#[tokio::test]
async fn search_merges_sources_with_first_seen_provenance() {
    let store = store();
    let found = CandidateAssembler::default()
        .search(&report(), &["terminal".to_string()], &store, today())
        .await;

    assert_eq!(
        provenance_of(&found),
        vec![
            (5, Provenance::KeywordSearch),
            (6, Provenance::KeywordSearch),
            (7, Provenance::AreaSearch),
            (8, Provenance::ErrorPatternSearch),
        ]
    );
    assert_eq!(found[0].body_preview, "resize");
    assert_eq!(store.executed_searches().len(), 3);
}

#[tokio::test]
async fn failed_query_is_dropped_and_others_run() {
    let store = store().failing_search("area:terminal");
    let found = CandidateAssembler::default()
        .search(&report(), &["terminal".to_string()], &store, today())
        .await;

    let numbers: Vec<u64> = found.iter().map(|c| c.number.0).collect();
    assert_eq!(numbers, vec![5, 6, 8]);
    assert_eq!(store.executed_searches().len(), 3);
}

#[tokio::test]
async fn report_never_lists_itself() {
    let store = store();
    let found = CandidateAssembler::default()
        .search(&report(), &[], &store, today())
        .await;
    assert!(found.iter().all(|c| c.number != IssueNumber(1)));
}

#[tokio::test]
async fn magnet_provenance_wins_over_search() {
    let store = store();
    let assembler = CandidateAssembler::default();
    let found = assembler
        .search(&report(), &["terminal".to_string()], &store, today())
        .await;

    let mut magnet = Magnet::new(6, &["terminal"], 9);
    magnet.details = Some(MagnetDetails {
        title: "Crash in terminal grid".to_string(),
        body_preview: "grid".to_string(),
    });
    let candidates = assembler.assemble(&[magnet], &found);

    let ids: HashSet<u64> = candidates.iter().map(|c| c.number.0).collect();
    assert_eq!(ids.len(), candidates.len());
    assert_eq!(candidates[0].number, IssueNumber(6));
    assert_eq!(candidates[0].provenance, Provenance::KnownMagnet);
    assert_eq!(candidates[0].brief().source, "known_duplicate_magnet");
    assert_eq!(candidates[1].brief().source, "search_result");
    assert_eq!(
        provenance_of(&candidates),
        vec![
            (6, Provenance::KnownMagnet),
            (5, Provenance::KeywordSearch),
            (7, Provenance::AreaSearch),
            (8, Provenance::ErrorPatternSearch),
        ]
    );
}

#[test]
fn search_results_are_limited_before_dedup() {
    let assembler = CandidateAssembler::new(CandidateLimits {
        search_result_limit: 2,
        ..CandidateLimits::default()
    });
    let hit = |n: u64| Candidate {
        number: IssueNumber(n),
        title: String::new(),
        body_preview: String::new(),
        provenance: Provenance::KeywordSearch,
    };
    let candidates = assembler.assemble(&[Magnet::new(6, &[], 3)], &[hit(5), hit(6), hit(7)]);
    let numbers: Vec<u64> = candidates.iter().map(|c| c.number.0).collect();
    assert_eq!(numbers, vec![6, 5]);
}

#[test]
fn area_filter_follows_hierarchy() {
    let catalog = vec![
        Magnet::new(1, &["languages/rust"], 8),
        Magnet::new(2, &["vim"], 5),
        Magnet::new(3, &[], 1),
    ];

    assert_eq!(filter_magnets_by_areas(&catalog, &[]), catalog);

    let kept = filter_magnets_by_areas(&catalog, &["rust".to_string()]);
    let numbers: Vec<u64> = kept.iter().map(|m| m.number.0).collect();
    assert_eq!(numbers, vec![1, 3]);

    let kept = filter_magnets_by_areas(&catalog, &["editor".to_string()]);
    let numbers: Vec<u64> = kept.iter().map(|m| m.number.0).collect();
    assert_eq!(numbers, vec![3]);

    let kept = filter_magnets_by_areas(&catalog, &["languages".to_string()]);
    let numbers: Vec<u64> = kept.iter().map(|m| m.number.0).collect();
    assert_eq!(numbers, vec![1, 3]);
}
