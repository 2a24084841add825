// Pipeline orchestrator: sequences the offline stages (fingerprint, cluster,
// per-cluster page-similarity search, index build), then the online merge.
// Execution is single-threaded and fully sequential; the built index is
// published behind an Arc so online readers need no synchronization.

mod scenario;

pub use scenario::{Scenario, ScenarioApplication, ScenarioPage, VmSnapshot};

use crate::clustering::ApplicationClusterer;
use crate::config::Config;
use crate::engine::{DeduplicationEngine, EngineStatistics};
use crate::error::{MsmdError, Result};
use crate::explorer::PageSimilarityExplorer;
use crate::fingerprint::{Digest, Fingerprinter};
use crate::index::SharedPageIndex;
use crate::memory::{Application, Page, SimilarityResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of the offline phase
#[derive(Debug, Clone, Serialize)]
pub struct OfflineResult {
    /// Per-application content digest
    pub digests: BTreeMap<u64, Digest>,
    /// Applications with their cluster assignments
    pub applications: Vec<Application>,
    /// cluster_id -> ordered application ids
    pub clusters: BTreeMap<u64, Vec<u64>>,
    /// Similar page pairs accumulated across clusters, in cluster-id order
    pub similar_pairs: Vec<SimilarityResult>,
    /// Number of index entries created
    pub index_entries: usize,
}

/// Result of the online phase
#[derive(Debug, Clone, Serialize)]
pub struct OnlineResult {
    /// False when online ran before offline built an index
    pub index_ready: bool,
    pub pages_merged: u64,
    pub bytes_saved: u64,
    pub mb_saved: f64,
    /// Cumulative engine statistics; absent when the index was not ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<EngineStatistics>,
}

impl OnlineResult {
    fn not_ready() -> Self {
        Self {
            index_ready: false,
            pages_merged: 0,
            bytes_saved: 0,
            mb_saved: 0.0,
            statistics: None,
        }
    }
}

/// Flat summary of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_applications: usize,
    pub application_clusters: usize,
    pub similar_page_pairs: usize,
    pub index_entries: usize,
    pub pages_merged: u64,
    pub bytes_saved: u64,
    pub mb_saved: f64,
    pub generated_at: DateTime<Utc>,
}

/// Orchestrates the offline and online phases of one deduplication run
pub struct Pipeline {
    config: Config,
    seed: Option<u64>,
    clusterer: ApplicationClusterer,
    index: Option<Arc<SharedPageIndex>>,
    engine: Option<DeduplicationEngine>,
}

impl Pipeline {
    /// Create a pipeline; a seed makes the similarity search reproducible
    pub fn new(config: Config, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let clusterer = ApplicationClusterer::new(config.clustering.similarity_threshold);
        Ok(Self {
            config,
            seed,
            clusterer,
            index: None,
            engine: None,
        })
    }

    /// Offline phase: fingerprint, cluster, explore, and build the index
    ///
    /// # Arguments
    /// * `app_contents` - application id -> raw byte content
    /// * `app_pages` - application id -> owned page records
    ///
    /// # Errors
    /// Fails with the state-error kind when a prior index is still referenced
    /// by an engine: rebuilding would silently discard state the engine's
    /// cumulative counters refer to.
    pub fn offline(
        &mut self,
        app_contents: &BTreeMap<u64, Vec<u8>>,
        app_pages: &BTreeMap<u64, Vec<Page>>,
    ) -> Result<OfflineResult> {
        if self.index.is_some() && self.engine.is_some() {
            return Err(MsmdError::IndexInUse);
        }

        tracing::info!(applications = app_contents.len(), "Offline phase starting");

        // Step 1: fingerprint every application
        let mut digests: BTreeMap<u64, Digest> = BTreeMap::new();
        let mut applications: Vec<Application> = Vec::new();
        for (&app_id, content) in app_contents {
            let digest = Fingerprinter::fingerprint(content);
            tracing::debug!(app = app_id, digest = %digest, "Fingerprinted application");
            digests.insert(app_id, digest.clone());

            let pages = app_pages
                .get(&app_id)
                .map(|pages| pages.iter().map(|p| p.page_id).collect())
                .unwrap_or_default();
            applications.push(Application::new(
                app_id,
                app_id / 100,
                format!("app-{}", app_id),
                digest,
                pages,
            ));
        }

        // Step 2: cluster applications by digest similarity
        let clusters = self.clusterer.cluster(&applications)?;
        for app in &mut applications {
            app.cluster_id = clusters
                .iter()
                .find(|(_, members)| members.contains(&app.app_id))
                .map(|(&cluster_id, _)| cluster_id);
        }

        // Step 3: per-cluster page-similarity search, accumulated in
        // cluster-id order so results are reproducible
        let mut explorer = PageSimilarityExplorer::new(&self.config.explorer, self.seed)?;
        let mut similar_pairs: Vec<SimilarityResult> = Vec::new();

        for (&cluster_id, app_ids) in &clusters {
            let mut cluster_pages: Vec<Page> = Vec::new();
            for app_id in app_ids {
                if let Some(pages) = app_pages.get(app_id) {
                    cluster_pages.extend(pages.iter().cloned().map(|mut p| {
                        p.cluster_id = Some(cluster_id);
                        p
                    }));
                }
            }

            if cluster_pages.is_empty() {
                continue;
            }

            let pairs = explorer.discover(&cluster_pages);
            tracing::info!(
                cluster = cluster_id,
                pairs = pairs.len(),
                "Cluster similarity search complete"
            );
            similar_pairs.extend(pairs);
        }

        // Step 4: build the shared page index over the full page set
        let all_pages: Vec<Page> = app_pages.values().flatten().cloned().collect();
        let mut index = SharedPageIndex::new();
        let index_entries = index.build(&all_pages, &similar_pairs);
        self.index = Some(Arc::new(index));

        tracing::info!(index_entries, "Offline phase complete");

        Ok(OfflineResult {
            digests,
            applications,
            clusters,
            similar_pairs,
            index_entries,
        })
    }

    /// Online phase: merge VM snapshot pages against the built index
    ///
    /// Requires `offline` to have run; if it has not, the readiness failure
    /// is logged and an empty result is returned rather than raising. The
    /// engine is constructed once and reused, so its counters accumulate
    /// across calls.
    pub fn online(&mut self, vm_pages: &BTreeMap<u64, Vec<Page>>) -> OnlineResult {
        let Some(index) = &self.index else {
            tracing::error!("Shared page index not built; run the offline phase first");
            return OnlineResult::not_ready();
        };

        let index = Arc::clone(index);
        let engine = self
            .engine
            .get_or_insert_with(|| DeduplicationEngine::new(index));

        let (pages_merged, bytes_saved) = engine.merge(vm_pages);

        OnlineResult {
            index_ready: true,
            pages_merged,
            bytes_saved,
            mb_saved: bytes_saved as f64 / 1024.0 / 1024.0,
            statistics: Some(engine.statistics()),
        }
    }

    /// Run the complete pipeline (offline then online) and summarize
    pub fn run(
        &mut self,
        app_contents: &BTreeMap<u64, Vec<u8>>,
        app_pages: &BTreeMap<u64, Vec<Page>>,
        vm_pages: &BTreeMap<u64, Vec<Page>>,
    ) -> Result<RunSummary> {
        let offline = self.offline(app_contents, app_pages)?;
        let online = self.online(vm_pages);

        Ok(RunSummary {
            total_applications: app_contents.len(),
            application_clusters: offline.clusters.len(),
            similar_page_pairs: offline.similar_pairs.len(),
            index_entries: offline.index_entries,
            pages_merged: online.pages_merged,
            bytes_saved: online.bytes_saved,
            mb_saved: online.mb_saved,
            generated_at: Utc::now(),
        })
    }

    /// The built index, if the offline phase has run
    pub fn index(&self) -> Option<&Arc<SharedPageIndex>> {
        self.index.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Page;

    fn fixture() -> (
        BTreeMap<u64, Vec<u8>>,
        BTreeMap<u64, Vec<Page>>,
        BTreeMap<u64, Vec<Page>>,
    ) {
        let scenario = Scenario::demo();
        let app_contents = scenario.app_contents();
        let app_pages = scenario.app_pages(4096);
        let vm_pages = scenario.vm_pages(&app_pages).unwrap();
        (app_contents, app_pages, vm_pages)
    }

    #[test]
    fn test_online_before_offline_is_non_fatal() {
        let mut pipeline = Pipeline::new(Config::default(), Some(1)).unwrap();
        let result = pipeline.online(&BTreeMap::new());

        assert!(!result.index_ready);
        assert_eq!(result.pages_merged, 0);
        assert!(result.statistics.is_none());
    }

    #[test]
    fn test_zero_applications_empty_summary() {
        let mut pipeline = Pipeline::new(Config::default(), Some(1)).unwrap();
        let summary = pipeline
            .run(&BTreeMap::new(), &BTreeMap::new(), &BTreeMap::new())
            .unwrap();

        assert_eq!(summary.total_applications, 0);
        assert_eq!(summary.application_clusters, 0);
        assert_eq!(summary.similar_page_pairs, 0);
        assert_eq!(summary.index_entries, 0);
        assert_eq!(summary.pages_merged, 0);
        assert_eq!(summary.bytes_saved, 0);
    }

    #[test]
    fn test_offline_rerun_guarded_while_engine_bound() {
        let (app_contents, app_pages, vm_pages) = fixture();
        let mut pipeline = Pipeline::new(Config::default(), Some(1)).unwrap();

        pipeline.offline(&app_contents, &app_pages).unwrap();
        // No engine yet: rebuilding is allowed
        pipeline.offline(&app_contents, &app_pages).unwrap();

        pipeline.online(&vm_pages);
        let err = pipeline.offline(&app_contents, &app_pages).unwrap_err();
        assert!(matches!(err, MsmdError::IndexInUse));
    }

    #[test]
    fn test_cluster_assignment_recorded_on_applications() {
        let (app_contents, app_pages, _) = fixture();
        let mut pipeline = Pipeline::new(Config::default(), Some(1)).unwrap();

        let offline = pipeline.offline(&app_contents, &app_pages).unwrap();
        for app in &offline.applications {
            let cluster_id = app.cluster_id.expect("every application is assigned");
            assert!(offline.clusters[&cluster_id].contains(&app.app_id));
        }
    }

    #[test]
    fn test_run_summary_consistent_with_offline_result() {
        let (app_contents, app_pages, vm_pages) = fixture();
        let mut pipeline = Pipeline::new(Config::default(), Some(1)).unwrap();

        let summary = pipeline.run(&app_contents, &app_pages, &vm_pages).unwrap();
        assert_eq!(summary.total_applications, 3);
        assert!(summary.application_clusters >= 1);
        assert!(summary.similar_page_pairs > 0);
        assert!(summary.index_entries >= 1);
    }
}
