//! # Mediashelf Core
//!
//! Index synchronization for filesystem media collections.
//!
//! A collection is a directory of media assets (videos, images, plain
//! downloads) described by a `db.json` index that front-end pages read.
//! [`IndexSynchronizer`] rebuilds that index from the current directory
//! contents while keeping everything that was already known:
//!
//! - durations are measured once by an external probe and then carried
//!   forward from the prior index forever;
//! - curated fields (titles, cover offsets, ...) survive re-scans;
//! - sizes are recomputed on every run because they are cheap;
//! - the index is replaced as a whole, never patched in place.
//!
//! The set of collections is a static table ([`catalog::collection`]), so
//! the synchronizer itself has no per-collection logic.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediashelf_core::{CollectionKind, CommandProbe, IndexSynchronizer};
//!
//! async fn refresh() -> Result<(), mediashelf_core::SyncError> {
//!     let sync = IndexSynchronizer::new(
//!         "wwwroot/multimedia",
//!         Arc::new(CommandProbe::default()),
//!     );
//!     let report = sync.synchronize(CollectionKind::Music).await?;
//!     println!("{} records", report.total_records());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod catalog;
pub mod collaborators;
/// Error types of the synchronizer and index persistence.
pub mod error;
/// The index synchronizer and its run report.
pub mod synchronizer;

pub use catalog::{
    AssetRecord, CollectionIndex, CollectionKind, CollectionSpec,
    INDEX_FILE_NAME,
};
pub use collaborators::{
    CommandProbe, CommandProbeConfig, CoverGenerator, CoverGeneratorConfig,
    DurationProbe, ProbeError,
};
pub use error::{IndexError, Result, SyncError};
pub use synchronizer::{
    IndexSynchronizer, SyncReport, VariantReport, VariantStatus,
};
