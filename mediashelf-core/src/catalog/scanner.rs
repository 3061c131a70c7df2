use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::collection::{CollectionSpec, INDEX_FILE_NAME};
use crate::error::SyncError;

/// A candidate asset found in a collection directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAsset {
    /// File name including extension; the record's natural key.
    pub filename: String,
    /// Full path, handed to the probe.
    pub path: PathBuf,
    /// `None` when the file could not be stat'ed.
    pub size_bytes: Option<u64>,
}

/// Enumerates the assets of one collection directory.
///
/// Only the top level of the asset directory is considered; hidden files
/// (leading dot), the index file itself and files outside the extension
/// allow-list are skipped. Results are sorted by filename.
#[derive(Debug, Clone)]
pub struct AssetScanner {
    spec: &'static CollectionSpec,
}

impl AssetScanner {
    /// Scanner applying `spec`'s filters.
    pub fn new(spec: &'static CollectionSpec) -> Self {
        Self { spec }
    }

    /// Dot-files are never assets.
    pub fn is_hidden(entry: &DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
    }

    fn is_candidate(&self, entry: &DirEntry) -> bool {
        if Self::is_hidden(entry) || !entry.file_type().is_file() {
            return false;
        }
        if entry.file_name() == INDEX_FILE_NAME {
            return false;
        }
        self.spec.accepts_extension(entry.path())
    }

    /// List the eligible files directly inside `dir`, sorted by name.
    ///
    /// A missing directory is [`SyncError::NotFound`]; an unreadable one
    /// is [`SyncError::Io`]. Individual entries that cannot be read are
    /// skipped.
    pub fn scan_directory<P: AsRef<Path>>(
        &self,
        dir: P,
    ) -> Result<Vec<DiscoveredAsset>, SyncError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SyncError::NotFound {
                what: "asset directory",
                path: dir.to_path_buf(),
            });
        }

        let mut assets = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    let source = err.into_io_error().unwrap_or_else(|| {
                        std::io::Error::other("directory walk failed")
                    });
                    return Err(SyncError::Io {
                        path: dir.to_path_buf(),
                        source,
                    });
                }
                Err(err) => {
                    warn!("skipping unreadable entry in {}: {}", dir.display(), err);
                    continue;
                }
            };

            if !self.is_candidate(&entry) {
                continue;
            }

            let Some(filename) = entry.file_name().to_str() else {
                warn!(
                    "skipping non UTF-8 file name: {}",
                    entry.path().display()
                );
                continue;
            };

            let size_bytes = match entry.metadata() {
                Ok(meta) => Some(meta.len()),
                Err(err) => {
                    debug!("stat failed for {}: {}", entry.path().display(), err);
                    None
                }
            };

            assets.push(DiscoveredAsset {
                filename: filename.to_string(),
                path: entry.path().to_path_buf(),
                size_bytes,
            });
        }

        assets.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(assets)
    }
}
