//! msmd - Modified Static Memory Deduplication simulator
//!
//! Simulates a two-phase memory-deduplication pipeline for virtualized hosts:
//! an offline phase fingerprints and clusters applications, then discovers
//! candidate page-level duplicates with a generational search; an online phase
//! consumes the pre-built shared page index to merge duplicate pages across
//! running VMs with O(1) lookup instead of full comparison. Merging is
//! bookkeeping only - no hypervisor or page-table interaction is performed.

pub mod cli;
pub mod clustering;
pub mod config;
pub mod engine;
pub mod error;
pub mod explorer;
pub mod fingerprint;
pub mod index;
pub mod memory;
pub mod pipeline;

pub use error::{MsmdError, Result};
