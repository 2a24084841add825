// Shared page index: build-once, read-many mapping from a page to the set of
// pages it may be merged with
//
// Grouping claims page ids on first sight: a similar pair is consumed only if
// neither of its pages has been claimed by an earlier pair in the same build.
// Transitive similarity across pairs sharing a page is therefore not merged
// into one group; this is a known simplification of the reference behavior,
// not a bug.

use crate::memory::{Page, SimilarityResult};
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use serde::Serialize;

/// One immutable entry in the shared page index
///
/// Entries are only ever inserted; never edited in place. The primary page is
/// never listed among its own similar pages.
#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    pub entry_id: u64,
    pub primary_page_id: u64,
    /// Similar page ids, ascending
    pub similar_pages: Vec<u64>,
    /// Content digest of the primary page
    pub content_signature: String,
    pub cluster_id: u64,
}

/// Build-once, read-many index of shareable pages
///
/// Once built the index is immutable; concurrent readers need no
/// synchronization.
#[derive(Debug, Default)]
pub struct SharedPageIndex {
    entries: HashMap<u64, IndexEntry>,
    /// page_id -> entry_id, covering primary and similar members
    page_to_entry: HashMap<u64, u64>,
    entry_counter: u64,
}

impl SharedPageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from pages and discovered similar pairs
    ///
    /// Pairs are scanned in input order; a pair is consumed only if neither
    /// page id was claimed by a prior pair in this build. Pair members that
    /// reference unknown pages are skipped with a diagnostic rather than
    /// aborting the build.
    ///
    /// Returns the number of entries created.
    pub fn build(&mut self, pages: &[Page], similar_pairs: &[SimilarityResult]) -> usize {
        tracing::info!(
            pages = pages.len(),
            pairs = similar_pairs.len(),
            "Building shared page index"
        );

        let page_by_id: HashMap<u64, &Page> =
            pages.iter().map(|p| (p.page_id, p)).collect();

        // Group pages, claiming ids on first sight. Group order follows the
        // order the group keys were first seen.
        let mut claimed: HashSet<u64> = HashSet::new();
        let mut group_order: Vec<u64> = Vec::new();
        let mut groups: HashMap<u64, Vec<u64>> = HashMap::new();

        for pair in similar_pairs {
            if claimed.contains(&pair.first) || claimed.contains(&pair.second) {
                continue;
            }
            let group = groups.entry(pair.first).or_insert_with(|| {
                group_order.push(pair.first);
                Vec::new()
            });
            group.push(pair.first);
            if pair.second != pair.first {
                group.push(pair.second);
            }
            claimed.insert(pair.first);
            claimed.insert(pair.second);
        }

        let mut created = 0u64;
        let mut cluster_id = 0u64;

        for primary_id in group_order {
            let Some(primary) = page_by_id.get(&primary_id) else {
                tracing::warn!(
                    page_id = primary_id,
                    "Similar pair references unknown primary page, skipping group"
                );
                continue;
            };

            let mut similar: Vec<u64> = Vec::new();
            for member in &groups[&primary_id] {
                if *member == primary_id {
                    continue;
                }
                if page_by_id.contains_key(member) {
                    similar.push(*member);
                } else {
                    tracing::warn!(
                        page_id = member,
                        "Similar pair references unknown page, skipping member"
                    );
                }
            }
            similar.sort_unstable();

            if similar.is_empty() {
                continue;
            }

            self.insert_entry(primary.page_id, similar, primary, cluster_id);
            created += 1;
            cluster_id += 1;
        }

        tracing::info!(
            entries = created,
            indexed_pages = self.page_to_entry.len(),
            "Shared page index built"
        );
        created as usize
    }

    fn insert_entry(&mut self, primary_id: u64, similar: Vec<u64>, primary: &Page, cluster_id: u64) {
        let entry = IndexEntry {
            entry_id: self.entry_counter,
            primary_page_id: primary_id,
            similar_pages: similar,
            content_signature: primary.content_digest.to_string(),
            cluster_id,
        };

        self.page_to_entry.insert(primary_id, entry.entry_id);
        for page_id in &entry.similar_pages {
            self.page_to_entry.insert(*page_id, entry.entry_id);
        }

        tracing::debug!(
            entry = entry.entry_id,
            similar = entry.similar_pages.len(),
            "Created index entry"
        );

        self.entries.insert(entry.entry_id, entry);
        self.entry_counter += 1;
    }

    /// Look up the entry covering a page, O(1) expected
    pub fn lookup(&self, page_id: u64) -> Option<&IndexEntry> {
        self.page_to_entry
            .get(&page_id)
            .and_then(|entry_id| self.entries.get(entry_id))
    }

    /// Pages shareable with the given page, ascending; empty if unindexed
    pub fn shareable_pages(&self, page_id: u64) -> &[u64] {
        self.lookup(page_id)
            .map(|entry| entry.similar_pages.as_slice())
            .unwrap_or(&[])
    }

    /// Number of entries in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprinter;

    fn page(page_id: u64, dump: &str) -> Page {
        Page::new(
            page_id,
            1,
            1,
            Fingerprinter::fingerprint(dump.as_bytes()),
            dump,
        )
    }

    fn pair(a: u64, b: u64) -> SimilarityResult {
        SimilarityResult::new(a, b, 100.0)
    }

    #[test]
    fn test_build_basic_entry() {
        let pages = vec![page(1, "dump1"), page(2, "dump1")];
        let mut index = SharedPageIndex::new();

        let created = index.build(&pages, &[pair(1, 2)]);
        assert_eq!(created, 1);

        let entry = index.lookup(1).unwrap();
        assert_eq!(entry.primary_page_id, 1);
        assert_eq!(entry.similar_pages, vec![2]);
        assert_eq!(entry.content_signature, pages[0].content_digest.to_string());
    }

    #[test]
    fn test_lookup_consistency() {
        // Primary and every similar member resolve to the same entry.
        let pages = vec![page(1, "d"), page(2, "d"), page(3, "d"), page(4, "d")];
        let mut index = SharedPageIndex::new();
        index.build(&pages, &[pair(1, 2), pair(3, 4)]);

        let from_primary = index.lookup(1).unwrap();
        let from_member = index.lookup(2).unwrap();
        assert_eq!(from_primary.entry_id, from_member.entry_id);

        let second = index.lookup(4).unwrap();
        assert_ne!(second.entry_id, from_primary.entry_id);
    }

    #[test]
    fn test_claim_on_first_sight_blocks_transitive_groups() {
        // Pair (1,2) claims both pages; (2,3) is dropped entirely because 2
        // is already claimed, so page 3 stays unindexed.
        let pages = vec![page(1, "d"), page(2, "d"), page(3, "d")];
        let mut index = SharedPageIndex::new();

        let created = index.build(&pages, &[pair(1, 2), pair(2, 3)]);
        assert_eq!(created, 1);
        assert!(index.lookup(3).is_none());
        assert!(index.shareable_pages(3).is_empty());
    }

    #[test]
    fn test_duplicate_pairs_consume_once() {
        let pages = vec![page(1, "d"), page(2, "d")];
        let mut index = SharedPageIndex::new();

        let created = index.build(&pages, &[pair(1, 2), pair(1, 2), pair(1, 2)]);
        assert_eq!(created, 1);
        assert_eq!(index.lookup(1).unwrap().similar_pages, vec![2]);
    }

    #[test]
    fn test_unknown_page_skipped() {
        // Page 99 is not in the known page set; its pair is grouped but the
        // group cannot resolve a primary record, so no entry results.
        let pages = vec![page(1, "d")];
        let mut index = SharedPageIndex::new();

        let created = index.build(&pages, &[pair(99, 1)]);
        assert_eq!(created, 0);
        assert!(index.lookup(1).is_none());
    }

    #[test]
    fn test_unresolvable_group_dropped_others_survive() {
        let pages = vec![page(1, "d"), page(2, "d")];
        let mut index = SharedPageIndex::new();

        // (1,2) claims 1 and 2; pair (3, 99)'s group resolves no pages.
        let created = index.build(&pages, &[pair(1, 2), pair(3, 99)]);
        assert_eq!(created, 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_self_pair_produces_no_entry() {
        // A mutation can pair a page with itself; the group then has no
        // non-primary member and no entry is created.
        let pages = vec![page(1, "d")];
        let mut index = SharedPageIndex::new();

        let created = index.build(&pages, &[pair(1, 1)]);
        assert_eq!(created, 0);
    }

    #[test]
    fn test_empty_inputs() {
        let mut index = SharedPageIndex::new();
        assert_eq!(index.build(&[], &[]), 0);
        assert!(index.is_empty());
        assert!(index.lookup(1).is_none());
    }
}
