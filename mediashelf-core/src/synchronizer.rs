//! Index synchronization: scan a collection, merge with its prior index,
//! persist the result.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::{StreamExt, stream};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    catalog::{
        AssetMetric, AssetRecord, AssetScanner, CollectionIndex, CollectionKind,
        CollectionSpec, DiscoveredAsset, PriorIndex, VariantPaths,
        index::{load_index, persist_index},
    },
    collaborators::{CoverGenerator, DurationProbe},
    error::{Result, SyncError},
};

/// What happened to one variant of a collection during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    /// A fresh index replaced the previous one.
    Written,
    /// The variant's asset directory does not exist; nothing was written.
    Missing,
}

/// Per-variant counters of one run.
#[derive(Debug, Clone, Serialize)]
pub struct VariantReport {
    /// Locale, for localized collections.
    pub locale: Option<String>,
    /// Index file written (or that would have been written).
    pub index_path: PathBuf,
    /// Whether an index was written.
    pub status: VariantStatus,
    /// State of the index that existed before the run.
    pub prior_index: PriorIndex,
    /// Records in the new index.
    pub records: usize,
    /// Records whose duration was carried forward.
    pub reused: usize,
    /// Successful probe invocations.
    pub probed: usize,
    /// Failed probe invocations; these assets are probed again next run.
    pub probe_failures: usize,
}

impl VariantReport {
    fn missing(variant: &VariantPaths) -> Self {
        Self {
            locale: variant.locale.map(str::to_string),
            index_path: variant.index_path.clone(),
            status: VariantStatus::Missing,
            prior_index: PriorIndex::Missing,
            records: 0,
            reused: 0,
            probed: 0,
            probe_failures: 0,
        }
    }
}

/// Outcome of a successful synchronization run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Identifier carried by this run's log lines.
    pub run_id: Uuid,
    /// Collection that was synchronized.
    pub collection: CollectionKind,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Run duration, excluding the detached cover job.
    pub elapsed_ms: u64,
    /// One entry per variant, in table order.
    pub variants: Vec<VariantReport>,
    /// Whether a cover script was launched.
    pub cover_job_started: bool,
}

impl SyncReport {
    /// Records written across all variants.
    pub fn total_records(&self) -> usize {
        self.variants.iter().map(|v| v.records).sum()
    }

    /// Number of external probe invocations made during the run.
    pub fn probe_invocations(&self) -> usize {
        self.variants
            .iter()
            .map(|v| v.probed + v.probe_failures)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Reused,
    Probed,
    ProbeFailed,
    Sized,
}

/// Produces a fresh index for a named collection, re-using every duration
/// that was already measured.
///
/// Runs for the same collection are serialized through a per-collection
/// lock; different collections may synchronize concurrently.
pub struct IndexSynchronizer {
    root: PathBuf,
    probe: Arc<dyn DurationProbe>,
    covers: Option<CoverGenerator>,
    probe_concurrency: usize,
    locks: DashMap<CollectionKind, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for IndexSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSynchronizer")
            .field("root", &self.root)
            .field("covers", &self.covers)
            .field("probe_concurrency", &self.probe_concurrency)
            .finish_non_exhaustive()
    }
}

impl IndexSynchronizer {
    /// `root` is the directory holding every collection directory.
    pub fn new(root: impl Into<PathBuf>, probe: Arc<dyn DurationProbe>) -> Self {
        Self {
            root: root.into(),
            probe,
            covers: None,
            probe_concurrency: 1,
            locks: DashMap::new(),
        }
    }

    /// Run the collection's cover script after each successful sync.
    pub fn with_cover_generator(mut self, covers: CoverGenerator) -> Self {
        self.covers = Some(covers);
        self
    }

    /// Probe up to `limit` new assets at once. Output order is unaffected.
    pub fn with_probe_concurrency(mut self, limit: usize) -> Self {
        self.probe_concurrency = limit.max(1);
        self
    }

    /// Directory holding every collection directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Synchronize the collection named by an administrative identifier.
    ///
    /// Unknown identifiers fail before any filesystem access.
    pub async fn synchronize_named(&self, name: &str) -> Result<SyncReport> {
        let kind: CollectionKind = name.parse()?;
        self.synchronize(kind).await
    }

    /// Rebuild every variant index of `kind` from the current directory
    /// contents.
    pub async fn synchronize(&self, kind: CollectionKind) -> Result<SyncReport> {
        let lock = self.locks.entry(kind).or_default().clone();
        let _guard = lock.lock().await;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let spec = kind.spec();

        let collection_dir = spec.collection_dir(&self.root);
        if !collection_dir.is_dir() {
            info!(
                collection = %kind,
                path = %collection_dir.display(),
                "collection directory missing; nothing to synchronize"
            );
            return Err(SyncError::NotFound {
                what: "collection directory",
                path: collection_dir,
            });
        }

        let localized = !spec.locales.is_empty();
        let mut variants = Vec::new();
        for variant in spec.variants(&self.root) {
            if localized && !variant.asset_dir.is_dir() {
                info!(
                    collection = %kind,
                    locale = variant.locale.unwrap_or_default(),
                    "locale variant has no asset directory; skipping"
                );
                variants.push(VariantReport::missing(&variant));
                continue;
            }
            variants.push(self.sync_variant(spec, &variant).await?);
        }

        let cover_job_started = match (&self.covers, spec.cover_script) {
            (Some(covers), Some(script)) => {
                covers.spawn(&collection_dir, script).is_some()
            }
            _ => false,
        };

        let report = SyncReport {
            run_id,
            collection: kind,
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
            variants,
            cover_job_started,
        };

        info!(
            %run_id,
            collection = %kind,
            records = report.total_records(),
            probed = report.probe_invocations(),
            elapsed_ms = report.elapsed_ms,
            "collection synchronized"
        );
        Ok(report)
    }

    async fn sync_variant(
        &self,
        spec: &'static CollectionSpec,
        variant: &VariantPaths,
    ) -> Result<VariantReport> {
        let (prior, prior_index) = load_index(&variant.index_path).await;
        let assets = scan_assets(spec, variant.asset_dir.clone()).await?;

        let lookup = prior.by_filename();
        let pending: Vec<(DiscoveredAsset, Option<AssetRecord>)> = assets
            .into_iter()
            .map(|asset| {
                let known = lookup
                    .get(asset.filename.as_str())
                    .map(|record| (*record).clone());
                (asset, known)
            })
            .collect();

        let mut built: Vec<(AssetRecord, RecordOutcome)> = stream::iter(pending)
            .map(|(asset, known)| self.build_record(spec, asset, known))
            .buffered(self.probe_concurrency)
            .collect()
            .await;
        built.sort_by(|(a, _), (b, _)| a.filename.cmp(&b.filename));

        let count = |wanted: RecordOutcome| {
            built.iter().filter(|(_, outcome)| *outcome == wanted).count()
        };
        let reused = count(RecordOutcome::Reused);
        let probed = count(RecordOutcome::Probed);
        let probe_failures = count(RecordOutcome::ProbeFailed);

        let index = CollectionIndex {
            notes: spec.notes.to_string(),
            hints: spec.hints.map(str::to_string),
            list: built.into_iter().map(|(record, _)| record).collect(),
        };
        let records = index.list.len();

        if let Err(source) = persist_index(&variant.index_path, &index).await {
            error!(
                path = %variant.index_path.display(),
                error = %source,
                "failed to write collection index"
            );
            return Err(SyncError::WriteFailure {
                path: variant.index_path.clone(),
                source,
            });
        }

        debug!(
            collection = %spec.kind,
            locale = variant.locale.unwrap_or_default(),
            records,
            reused,
            probed,
            probe_failures,
            "variant index written"
        );

        Ok(VariantReport {
            locale: variant.locale.map(str::to_string),
            index_path: variant.index_path.clone(),
            status: VariantStatus::Written,
            prior_index,
            records,
            reused,
            probed,
            probe_failures,
        })
    }

    async fn build_record(
        &self,
        spec: &'static CollectionSpec,
        asset: DiscoveredAsset,
        known: Option<AssetRecord>,
    ) -> (AssetRecord, RecordOutcome) {
        let mut record =
            known.unwrap_or_else(|| AssetRecord::new(asset.filename.clone()));

        if spec.uses_titles() && record.title.is_none() {
            record.title = Some(file_stem(&asset.filename));
        }

        let outcome = match spec.metric {
            AssetMetric::Duration if record.has_duration() => {
                RecordOutcome::Reused
            }
            AssetMetric::Duration => match self.probe.probe(&asset.path).await {
                Ok(seconds) => {
                    record.set_duration(seconds);
                    RecordOutcome::Probed
                }
                Err(err) => {
                    warn!(
                        file = %asset.filename,
                        error = %err,
                        "duration probe failed; leaving duration unset"
                    );
                    record.duration_in_seconds = None;
                    record.duration_display = None;
                    RecordOutcome::ProbeFailed
                }
            },
            AssetMetric::Size => {
                match asset.size_bytes {
                    Some(bytes) => record.set_size(bytes),
                    None => record.size_mb = None,
                }
                RecordOutcome::Sized
            }
        };

        (record, outcome)
    }
}

async fn scan_assets(
    spec: &'static CollectionSpec,
    dir: PathBuf,
) -> Result<Vec<DiscoveredAsset>> {
    let scan_dir = dir.clone();
    tokio::task::spawn_blocking(move || {
        AssetScanner::new(spec).scan_directory(&scan_dir)
    })
    .await
    .map_err(|join_err| SyncError::Io {
        path: dir,
        source: std::io::Error::other(join_err.to_string()),
    })?
}

fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_drops_only_the_last_extension() {
        assert_eq!(file_stem("Lesson 1.mp4"), "Lesson 1");
        assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
        assert_eq!(file_stem("README"), "README");
    }
}
