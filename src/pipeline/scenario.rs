//! Scenario input: the workload description consumed by the pipeline
//!
//! A scenario lists applications with their raw content and pages, plus the
//! VM snapshots replayed during the online phase. Snapshots reference pages
//! by id so a page's record is defined exactly once.

use crate::error::{MsmdError, Result};
use crate::fingerprint::Fingerprinter;
use crate::memory::Page;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A loadable workload description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub applications: Vec<ScenarioApplication>,
    pub vm_snapshots: Vec<VmSnapshot>,
}

/// One application: raw content plus its pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioApplication {
    pub app_id: u64,
    /// Raw application content, fingerprinted at ingestion
    pub content: String,
    pub pages: Vec<ScenarioPage>,
}

/// One page definition within an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioPage {
    pub page_id: u64,
    pub vm_id: u64,
    /// Structural dump used for similarity scoring
    pub structural_dump: String,
}

/// A runtime VM snapshot, referencing ingested pages by id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSnapshot {
    pub vm_id: u64,
    pub page_ids: Vec<u64>,
}

impl Scenario {
    /// Load a scenario from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MsmdError::Io {
            source: e,
            context: format!("Failed to read scenario file: {}", path.display()),
        })?;

        let scenario: Scenario =
            serde_json::from_str(&content).map_err(|e| MsmdError::Json {
                source: e,
                context: format!("Failed to parse scenario file: {}", path.display()),
            })?;

        scenario.validate()?;
        Ok(scenario)
    }

    /// The built-in three-application reference fixture
    pub fn demo() -> Self {
        Self {
            applications: vec![
                ScenarioApplication {
                    app_id: 1,
                    content: "Binary content of application 1 with some code".to_string(),
                    pages: vec![
                        ScenarioPage {
                            page_id: 1,
                            vm_id: 1,
                            structural_dump: "dump1".to_string(),
                        },
                        ScenarioPage {
                            page_id: 2,
                            vm_id: 1,
                            structural_dump: "dump1".to_string(),
                        },
                    ],
                },
                ScenarioApplication {
                    app_id: 2,
                    content: "Binary content of application 2 with similar code".to_string(),
                    pages: vec![
                        ScenarioPage {
                            page_id: 3,
                            vm_id: 1,
                            structural_dump: "dump1".to_string(),
                        },
                        ScenarioPage {
                            page_id: 4,
                            vm_id: 1,
                            structural_dump: "dump1".to_string(),
                        },
                    ],
                },
                ScenarioApplication {
                    app_id: 3,
                    content: "Binary content of application 3 with different code".to_string(),
                    pages: vec![
                        ScenarioPage {
                            page_id: 5,
                            vm_id: 1,
                            structural_dump: "dump3".to_string(),
                        },
                        ScenarioPage {
                            page_id: 6,
                            vm_id: 1,
                            structural_dump: "dump3".to_string(),
                        },
                    ],
                },
            ],
            vm_snapshots: vec![
                VmSnapshot {
                    vm_id: 1,
                    page_ids: vec![1, 3],
                },
                VmSnapshot {
                    vm_id: 2,
                    page_ids: vec![2, 4],
                },
            ],
        }
    }

    /// Reject duplicate application ids, duplicate page ids, and snapshot
    /// references to undefined pages
    pub fn validate(&self) -> Result<()> {
        let mut app_ids = BTreeSet::new();
        let mut page_ids = BTreeSet::new();

        for app in &self.applications {
            if !app_ids.insert(app.app_id) {
                return Err(MsmdError::Scenario(format!(
                    "duplicate application id {}",
                    app.app_id
                )));
            }
            for page in &app.pages {
                if !page_ids.insert(page.page_id) {
                    return Err(MsmdError::Scenario(format!(
                        "duplicate page id {}",
                        page.page_id
                    )));
                }
            }
        }

        for snapshot in &self.vm_snapshots {
            for page_id in &snapshot.page_ids {
                if !page_ids.contains(page_id) {
                    return Err(MsmdError::Scenario(format!(
                        "VM {} snapshot references undefined page {}",
                        snapshot.vm_id, page_id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Application id -> raw content bytes
    pub fn app_contents(&self) -> BTreeMap<u64, Vec<u8>> {
        self.applications
            .iter()
            .map(|app| (app.app_id, app.content.clone().into_bytes()))
            .collect()
    }

    /// Application id -> ingested page records
    ///
    /// Page digests are derived from the structural dump; page size comes
    /// from configuration.
    pub fn app_pages(&self, page_size: u64) -> BTreeMap<u64, Vec<Page>> {
        self.applications
            .iter()
            .map(|app| {
                let pages = app
                    .pages
                    .iter()
                    .map(|p| {
                        let mut page = Page::new(
                            p.page_id,
                            p.vm_id,
                            app.app_id,
                            Fingerprinter::fingerprint(p.structural_dump.as_bytes()),
                            p.structural_dump.clone(),
                        );
                        page.size = page_size;
                        page
                    })
                    .collect();
                (app.app_id, pages)
            })
            .collect()
    }

    /// VM id -> snapshot page records, resolved against the ingested pages
    pub fn vm_pages(
        &self,
        app_pages: &BTreeMap<u64, Vec<Page>>,
    ) -> Result<BTreeMap<u64, Vec<Page>>> {
        let by_id: BTreeMap<u64, &Page> = app_pages
            .values()
            .flatten()
            .map(|p| (p.page_id, p))
            .collect();

        let mut vm_pages: BTreeMap<u64, Vec<Page>> = BTreeMap::new();
        for snapshot in &self.vm_snapshots {
            let mut pages = Vec::with_capacity(snapshot.page_ids.len());
            for page_id in &snapshot.page_ids {
                let page = by_id.get(page_id).ok_or_else(|| {
                    MsmdError::Scenario(format!(
                        "VM {} snapshot references undefined page {}",
                        snapshot.vm_id, page_id
                    ))
                })?;
                pages.push((*page).clone());
            }
            vm_pages.entry(snapshot.vm_id).or_default().extend(pages);
        }

        Ok(vm_pages)
    }
}
