// End-to-end pipeline tests over the reference scenario
use msmd::config::Config;
use msmd::fingerprint::Fingerprinter;
use msmd::pipeline::{Pipeline, Scenario};
use std::collections::BTreeMap;

fn demo_inputs() -> (
    BTreeMap<u64, Vec<u8>>,
    BTreeMap<u64, Vec<msmd::memory::Page>>,
    BTreeMap<u64, Vec<msmd::memory::Page>>,
) {
    let scenario = Scenario::demo();
    scenario.validate().unwrap();

    let app_contents = scenario.app_contents();
    let app_pages = scenario.app_pages(4096);
    let vm_pages = scenario.vm_pages(&app_pages).unwrap();
    (app_contents, app_pages, vm_pages)
}

/// Whether any two demo applications have digest similarity above the
/// clustering threshold. The digest is not locality-preserving, so this must
/// be computed from the actual digest values, never assumed.
fn demo_apps_cluster_together(app_contents: &BTreeMap<u64, Vec<u8>>) -> bool {
    let digests: Vec<_> = app_contents
        .values()
        .map(|content| Fingerprinter::fingerprint(content))
        .collect();

    for i in 0..digests.len() {
        for j in (i + 1)..digests.len() {
            if Fingerprinter::similarity(&digests[i], &digests[j]).unwrap() > 30.0 {
                return true;
            }
        }
    }
    false
}

#[test]
fn test_reference_scenario_end_to_end() {
    let (app_contents, app_pages, vm_pages) = demo_inputs();
    let mut pipeline = Pipeline::new(Config::default(), Some(42)).unwrap();

    let offline = pipeline.offline(&app_contents, &app_pages).unwrap();

    // Pages 1 and 2 share the dump "dump1" and always belong to the same
    // cluster, so the explorer must find their pair in generation zero.
    assert!(offline
        .similar_pairs
        .iter()
        .any(|p| p.first == 1 && p.second == 2 && p.score == 100.0));

    // The claim policy settles groups from the first generation's recordings:
    // (1,2), (3,4), and (5,6) each become one entry.
    assert_eq!(offline.index_entries, 3);

    let online = pipeline.online(&vm_pages);
    assert!(online.index_ready);

    // Snapshots contain pages {1,3} and {2,4}. Pages 1 and 3 each merge with
    // their similar member; pages 2 and 4 are similar members themselves, so
    // the index returns each of them its own id and the canonical pair keys
    // (2,2) and (4,4) also count. 4 pairs, 4 pages of 4096 bytes.
    assert_eq!(online.pages_merged, 4);
    assert_eq!(online.bytes_saved, 4 * 4096);
}

#[test]
fn test_reference_scenario_clustering() {
    let (app_contents, app_pages, _) = demo_inputs();
    let mut pipeline = Pipeline::new(Config::default(), Some(42)).unwrap();

    let offline = pipeline.offline(&app_contents, &app_pages).unwrap();

    if demo_apps_cluster_together(&app_contents) {
        assert!(offline.clusters.len() < 3);
    } else {
        // Each application remains a singleton cluster; each cluster holds
        // one identical-dump page pair that survives all 20 generations, so
        // 20 recordings per cluster accumulate.
        assert_eq!(offline.clusters.len(), 3);
        assert_eq!(offline.similar_pairs.len(), 60);
    }
}

#[test]
fn test_run_summary_matches_phases() {
    let (app_contents, app_pages, vm_pages) = demo_inputs();
    let mut pipeline = Pipeline::new(Config::default(), Some(7)).unwrap();

    let summary = pipeline.run(&app_contents, &app_pages, &vm_pages).unwrap();

    assert_eq!(summary.total_applications, 3);
    assert_eq!(summary.index_entries, 3);
    assert_eq!(summary.pages_merged, 4);
    assert_eq!(summary.bytes_saved, 4 * 4096);
    assert_eq!(summary.mb_saved, 4.0 * 4096.0 / 1024.0 / 1024.0);
}

#[test]
fn test_seeded_runs_reproducible() {
    let (app_contents, app_pages, _) = demo_inputs();

    let mut first = Pipeline::new(Config::default(), Some(1234)).unwrap();
    let mut second = Pipeline::new(Config::default(), Some(1234)).unwrap();

    let offline_a = first.offline(&app_contents, &app_pages).unwrap();
    let offline_b = second.offline(&app_contents, &app_pages).unwrap();

    assert_eq!(offline_a.clusters, offline_b.clusters);
    assert_eq!(offline_a.similar_pairs, offline_b.similar_pairs);
    assert_eq!(offline_a.index_entries, offline_b.index_entries);
}

#[test]
fn test_index_lookup_consistency_after_offline() {
    let (app_contents, app_pages, _) = demo_inputs();
    let mut pipeline = Pipeline::new(Config::default(), Some(5)).unwrap();

    pipeline.offline(&app_contents, &app_pages).unwrap();
    let index = pipeline.index().unwrap();

    // For every entry, the primary and every similar member resolve to the
    // same entry.
    for page_id in 1..=6u64 {
        if let Some(entry) = index.lookup(page_id) {
            let primary_entry = index.lookup(entry.primary_page_id).unwrap();
            assert_eq!(primary_entry.entry_id, entry.entry_id);
            for &member in &entry.similar_pages {
                assert_eq!(index.lookup(member).unwrap().entry_id, entry.entry_id);
            }
        }
    }
}

#[test]
fn test_online_accumulates_across_calls() {
    // Counters double when the same snapshots merge twice; the per-call pair
    // set resets between calls by design.
    let (app_contents, app_pages, vm_pages) = demo_inputs();
    let mut pipeline = Pipeline::new(Config::default(), Some(3)).unwrap();

    pipeline.offline(&app_contents, &app_pages).unwrap();

    let first = pipeline.online(&vm_pages);
    let second = pipeline.online(&vm_pages);

    assert_eq!(first.pages_merged, second.pages_merged);
    assert_eq!(first.bytes_saved, second.bytes_saved);

    let stats = second.statistics.unwrap();
    assert_eq!(stats.total_pages_merged, 2 * first.pages_merged);
    assert_eq!(stats.total_bytes_saved, 2 * first.bytes_saved);
}

#[test]
fn test_online_without_offline_reports_not_ready() {
    let (_, _, vm_pages) = demo_inputs();
    let mut pipeline = Pipeline::new(Config::default(), None).unwrap();

    let result = pipeline.online(&vm_pages);
    assert!(!result.index_ready);
    assert_eq!(result.pages_merged, 0);
    assert_eq!(result.bytes_saved, 0);
}

#[test]
fn test_empty_scenario_runs_clean() {
    let mut pipeline = Pipeline::new(Config::default(), Some(1)).unwrap();
    let summary = pipeline
        .run(&BTreeMap::new(), &BTreeMap::new(), &BTreeMap::new())
        .unwrap();

    assert_eq!(summary.total_applications, 0);
    assert_eq!(summary.application_clusters, 0);
    assert_eq!(summary.similar_page_pairs, 0);
    assert_eq!(summary.index_entries, 0);
    assert_eq!(summary.pages_merged, 0);
}
