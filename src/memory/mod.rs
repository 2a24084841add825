//! Value types shared across the pipeline stages

use crate::fingerprint::Digest;
use serde::{Deserialize, Serialize};

/// Default memory page size in bytes (4KB)
pub const PAGE_SIZE: u64 = 4096;

/// A simulated memory page
///
/// Created at ingestion; the cluster assignment is stamped on the copies
/// explored within a cluster. Merging is bookkeeping only, so the shared
/// flag is carried for downstream consumers but never set by the pipeline.
/// Pages live for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page identifier, unique within a run
    pub page_id: u64,
    /// Owning VM identifier
    pub vm_id: u64,
    /// Owning application identifier
    pub app_id: u64,
    /// Content digest of the page
    pub content_digest: Digest,
    /// Textual structural dump, used only for similarity scoring
    pub structural_dump: String,
    /// Page size in bytes
    pub size: u64,
    /// Whether this page has been merged with another
    pub shared: bool,
    /// Cluster the owning application was assigned to, if any
    pub cluster_id: Option<u64>,
}

impl Page {
    /// Create a page with the default size and no cluster assignment
    pub fn new(
        page_id: u64,
        vm_id: u64,
        app_id: u64,
        content_digest: Digest,
        structural_dump: impl Into<String>,
    ) -> Self {
        Self {
            page_id,
            vm_id,
            app_id,
            content_digest,
            structural_dump: structural_dump.into(),
            size: PAGE_SIZE,
            shared: false,
            cluster_id: None,
        }
    }
}

/// A virtual machine application and its pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    /// Application identifier
    pub app_id: u64,
    /// Owning VM identifier
    pub vm_id: u64,
    /// Human-readable name
    pub name: String,
    /// Content digest of the application binary/content
    pub content_digest: Digest,
    /// Identifiers of the pages this application owns
    pub pages: Vec<u64>,
    /// Cluster assignment, set exactly once by clustering
    pub cluster_id: Option<u64>,
}

impl Application {
    pub fn new(
        app_id: u64,
        vm_id: u64,
        name: impl Into<String>,
        content_digest: Digest,
        pages: Vec<u64>,
    ) -> Self {
        Self {
            app_id,
            vm_id,
            name: name.into(),
            content_digest,
            pages,
            cluster_id: None,
        }
    }
}

/// Unordered pair of identifiers with a similarity score in [0, 100]
///
/// Produced and consumed within a single stage (clustering candidates or
/// explorer output); not deduplicated across generations by design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub first: u64,
    pub second: u64,
    pub score: f64,
}

impl SimilarityResult {
    pub fn new(first: u64, second: u64, score: f64) -> Self {
        Self {
            first,
            second,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprinter;

    #[test]
    fn test_page_defaults() {
        let digest = Fingerprinter::fingerprint(b"content");
        let page = Page::new(1, 1, 1, digest, "dump1");

        assert_eq!(page.size, PAGE_SIZE);
        assert!(!page.shared);
        assert_eq!(page.cluster_id, None);
    }

    #[test]
    fn test_application_starts_unclustered() {
        let digest = Fingerprinter::fingerprint(b"app");
        let app = Application::new(1, 0, "app-1", digest, vec![1, 2]);

        assert_eq!(app.cluster_id, None);
        assert_eq!(app.pages, vec![1, 2]);
    }
}
