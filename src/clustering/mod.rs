// Application clustering via hierarchical agglomerative merging (HAC)
//
// Builds the full pairwise digest-similarity matrix, then repeatedly merges
// the two clusters joined by the highest-similarity candidate pair until no
// pair above the threshold spans two distinct clusters. O(n^2) matrix build,
// O(n^3) worst-case merging; the dominant cost of the offline phase.

use crate::error::Result;
use crate::fingerprint::Fingerprinter;
use crate::memory::Application;
use ahash::{HashMap, HashMapExt};
use std::collections::BTreeMap;

/// Minimum similarity (exclusive) for a pair to be a clustering candidate
pub const SIMILARITY_THRESHOLD: f64 = 30.0;

/// Groups applications into clusters by pairwise digest similarity
pub struct ApplicationClusterer {
    threshold: f64,
}

impl Default for ApplicationClusterer {
    fn default() -> Self {
        Self::new(SIMILARITY_THRESHOLD)
    }
}

impl ApplicationClusterer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Cluster applications, returning `cluster_id -> ordered application ids`
    ///
    /// Candidate pairs are evaluated in ascending (id_a, id_b) order and the
    /// best pair is selected with strict `>`, so ties go to the first pair in
    /// that order and merges are reproducible across runs.
    ///
    /// Empty input yields an empty map; a single application yields one
    /// singleton cluster.
    pub fn cluster(&self, applications: &[Application]) -> Result<BTreeMap<u64, Vec<u64>>> {
        tracing::info!(
            count = applications.len(),
            "Starting application clustering"
        );

        if applications.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut apps: Vec<&Application> = applications.iter().collect();
        apps.sort_by_key(|a| a.app_id);

        // Pairwise similarity matrix over all unordered pairs, in (id_a, id_b)
        // ascending order
        let mut matrix: Vec<(u64, u64, f64)> = Vec::new();
        for i in 0..apps.len() {
            for j in (i + 1)..apps.len() {
                let score =
                    Fingerprinter::similarity(&apps[i].content_digest, &apps[j].content_digest)?;
                matrix.push((apps[i].app_id, apps[j].app_id, score));
            }
        }

        tracing::debug!(pairs = matrix.len(), "Similarity matrix computed");

        // Start with one singleton cluster per application
        let mut clusters: HashMap<u64, Vec<u64>> = HashMap::new();
        let mut membership: HashMap<u64, u64> = HashMap::new();
        for (i, app) in apps.iter().enumerate() {
            clusters.insert(i as u64, vec![app.app_id]);
            membership.insert(app.app_id, i as u64);
        }

        let mut next_cluster_id = apps.len() as u64;

        loop {
            let mut best: Option<(u64, u64, u64, u64, f64)> = None;

            for &(id_a, id_b, score) in &matrix {
                if score <= self.threshold {
                    continue;
                }
                let ca = membership[&id_a];
                let cb = membership[&id_b];
                if ca == cb {
                    continue;
                }
                // Strict > keeps the first pair on ties
                if best.map_or(true, |(.., best_score)| score > best_score) {
                    best = Some((ca, cb, id_a, id_b, score));
                }
            }

            let Some((ca, cb, id_a, id_b, score)) = best else {
                break;
            };

            // Merge the two clusters into a new one and retire the old ids
            let mut merged = clusters.remove(&ca).unwrap_or_default();
            merged.extend(clusters.remove(&cb).unwrap_or_default());
            for app_id in &merged {
                membership.insert(*app_id, next_cluster_id);
            }
            clusters.insert(next_cluster_id, merged);

            tracing::debug!(
                app_a = id_a,
                app_b = id_b,
                similarity = score,
                cluster = next_cluster_id,
                "Merged clusters"
            );
            next_cluster_id += 1;
        }

        let mut result: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for (cluster_id, mut members) in clusters {
            members.sort_unstable();
            result.insert(cluster_id, members);
        }

        tracing::info!(clusters = result.len(), "Clustering complete");
        Ok(result)
    }
}
