// Generational page-similarity search within one application cluster
//
// The initial population is every unordered page pair. Each generation scores
// the population by structural-dump similarity, keeps the top P pairs, records
// every survivor above the similarity threshold, then mutates the survivor set
// by randomly re-pairing slots. Pairs surviving multiple generations are
// recorded once per generation - duplicates are kept on purpose.

use crate::config::ExplorerConfig;
use crate::error::{MsmdError, Result};
use crate::memory::{Page, SimilarityResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// Fitness score (exclusive) above which a surviving pair is recorded
pub const RECORD_THRESHOLD: f64 = 70.0;

/// Randomized search for structurally similar page pairs
pub struct PageSimilarityExplorer {
    population_size: usize,
    generations: usize,
    mutation_rate: f64,
    time_budget: Option<Duration>,
    rng: StdRng,
}

impl PageSimilarityExplorer {
    /// Create an explorer from configuration, optionally seeded
    ///
    /// A seeded explorer is fully reproducible; without a seed the random
    /// source is drawn from entropy.
    ///
    /// # Errors
    /// Fails fast with a configuration error on non-positive population size
    /// or generation count, or a mutation rate outside [0, 1].
    pub fn new(config: &ExplorerConfig, seed: Option<u64>) -> Result<Self> {
        if config.population_size == 0 {
            return Err(MsmdError::InvalidParameter {
                name: "population_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if config.generations == 0 {
            return Err(MsmdError::InvalidParameter {
                name: "generations".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&config.mutation_rate) {
            return Err(MsmdError::InvalidParameter {
                name: "mutation_rate".to_string(),
                message: "must be within [0.0, 1.0]".to_string(),
            });
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            population_size: config.population_size,
            generations: config.generations,
            mutation_rate: config.mutation_rate,
            time_budget: config.time_budget_ms.map(Duration::from_millis),
            rng,
        })
    }

    /// Fitness of a page pair, in [0, 100]
    ///
    /// Identical structural dumps (including two empty dumps) score 100;
    /// otherwise the score is the normalized edit-distance similarity of the
    /// dumps, clamped to [0, 100].
    pub fn fitness(page_a: &Page, page_b: &Page) -> f64 {
        let dump_a = &page_a.structural_dump;
        let dump_b = &page_b.structural_dump;

        if dump_a == dump_b {
            return 100.0;
        }

        let distance = edit_distance(dump_a, dump_b);
        let max_len = dump_a.chars().count().max(dump_b.chars().count());
        if max_len == 0 {
            return 100.0;
        }

        let similarity = ((max_len - distance.min(max_len)) as f64 / max_len as f64) * 100.0;
        similarity.clamp(0.0, 100.0)
    }

    /// Discover similar page pairs, returning `(page_a, page_b, score)` results
    ///
    /// Fewer than 2 pages yields an empty result immediately. The result may
    /// contain the same pair multiple times when it survives multiple
    /// generations.
    pub fn discover(&mut self, pages: &[Page]) -> Vec<SimilarityResult> {
        tracing::info!(pages = pages.len(), "Starting page-similarity search");

        if pages.len() < 2 {
            return Vec::new();
        }

        let started = Instant::now();
        let mut similar_pairs = Vec::new();

        // Initial population: every unordered page pair, as index pairs
        let mut population: Vec<(usize, usize)> = (0..pages.len())
            .flat_map(|i| ((i + 1)..pages.len()).map(move |j| (i, j)))
            .collect();

        tracing::debug!(population = population.len(), "Initial population built");

        for generation in 0..self.generations {
            if let Some(budget) = self.time_budget {
                if started.elapsed() > budget {
                    tracing::warn!(
                        generation,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Time budget exceeded, stopping search early"
                    );
                    break;
                }
            }

            let scores: Vec<f64> = population
                .iter()
                .map(|&(i, j)| Self::fitness(&pages[i], &pages[j]))
                .collect();

            // Selection: top P by score; the stable sort keeps ties in their
            // original population order
            let mut order: Vec<usize> = (0..population.len()).collect();
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

            let survivors: Vec<(usize, usize)> = order
                .iter()
                .take(self.population_size)
                .map(|&idx| population[idx])
                .collect();
            let survivor_scores: Vec<f64> = order
                .iter()
                .take(self.population_size)
                .map(|&idx| scores[idx])
                .collect();

            for (&(i, j), &score) in survivors.iter().zip(survivor_scores.iter()) {
                if score > RECORD_THRESHOLD {
                    similar_pairs.push(SimilarityResult::new(
                        pages[i].page_id,
                        pages[j].page_id,
                        score,
                    ));
                }
            }

            // Mutation: with probability m per half-of-survivors iteration,
            // replace a random slot with a freshly re-paired pair
            let mut next = survivors.clone();
            for _ in 0..survivors.len() / 2 {
                if self.rng.gen::<f64>() < self.mutation_rate {
                    let a = self.rng.gen_range(0..pages.len());
                    let b = self.rng.gen_range(0..pages.len());
                    let slot = self.rng.gen_range(0..next.len());
                    next[slot] = (a, b);
                }
            }
            population = next;

            let avg = if survivor_scores.is_empty() {
                0.0
            } else {
                survivor_scores.iter().sum::<f64>() / survivor_scores.len() as f64
            };
            tracing::debug!(
                generation,
                avg_fitness = avg,
                found = similar_pairs.len(),
                "Generation complete"
            );
        }

        tracing::info!(pairs = similar_pairs.len(), "Page-similarity search complete");
        similar_pairs
    }
}

/// Levenshtein distance (single-character insert/delete/substitute)
fn edit_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let insertion = previous[j + 1] + 1;
            let deletion = current[j] + 1;
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = insertion.min(deletion).min(substitution);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
