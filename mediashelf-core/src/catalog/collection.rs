//! Static table of the collections the synchronizer knows about.
//!
//! Every collection is described by data, not code: where its assets live,
//! which extensions count as assets, whether it is split into locale
//! variants and which metric (duration or size) its records carry. The
//! synchronizer consults this table and has no per-collection branches.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// File name of the persisted index, a sibling of the asset directory.
pub const INDEX_FILE_NAME: &str = "db.json";

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic"];

// Pages read this text verbatim; keep it byte-for-byte.
const VIDEO_NOTES: &str = "title and filename are different, because title could contain newlines  whie filename doesnot,and filename contains postfix but title doesnot";
const VIDEO_HINTS: &str = "display durationInSeconds in format of xx:xx, like 90secs should be displayed as 01:30";
const IMAGE_NOTES: &str = "title and filename are different, because title could contain characters a filename cannot, and filename contains the extension but title does not; sizeMB is the file size in mebibytes";
const DOWNLOAD_NOTES: &str =
    "filename is the file offered for download; sizeMB is the file size in mebibytes";

/// Closed set of collections that can be synchronized.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum CollectionKind {
    /// Lesson videos, one index per locale (`en`, `cn`).
    #[serde(rename = "lsLearns")]
    LsLearns,
    /// Music videos; covers are extracted after a sync.
    #[serde(rename = "music")]
    Music,
    /// Images, indexed by size; thumbnails are generated after a sync.
    #[serde(rename = "paintings")]
    Paintings,
    /// Arbitrary files offered for download.
    #[serde(rename = "downloads")]
    Downloads,
}

/// Which per-asset metric a collection records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetMetric {
    /// Probed once, then carried forward forever.
    Duration,
    /// Recomputed from the file on every run.
    Size,
}

/// Whether records of a collection carry a display title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitlePolicy {
    /// Default the title to the file stem when no curated title exists.
    FromStem,
    /// Records of this collection carry no title.
    Untitled,
}

/// Layout and indexing rules for one collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSpec {
    /// The collection this entry describes.
    pub kind: CollectionKind,
    /// Directory of the collection under the collections root.
    pub dir: &'static str,
    /// Locale sub-folders synchronized independently; empty when the
    /// collection is not split by locale.
    pub locales: &'static [&'static str],
    /// Asset sub-directory beside the index; `None` when the assets live
    /// next to `db.json`.
    pub asset_dir: Option<&'static str>,
    /// Lower-case extension allow-list; empty accepts every extension.
    pub extensions: &'static [&'static str],
    /// Metric recorded per asset.
    pub metric: AssetMetric,
    /// Title defaulting rule.
    pub title: TitlePolicy,
    /// Fixed `notes` string written into every index of the collection.
    pub notes: &'static str,
    /// Optional display hint written beside `notes`.
    pub hints: Option<&'static str>,
    /// Best-effort post-processing script, run from the collection dir.
    pub cover_script: Option<&'static str>,
}

static COLLECTIONS: [CollectionSpec; 4] = [
    CollectionSpec {
        kind: CollectionKind::LsLearns,
        dir: "lsLearns",
        locales: &["en", "cn"],
        asset_dir: Some("videos"),
        extensions: VIDEO_EXTENSIONS,
        metric: AssetMetric::Duration,
        title: TitlePolicy::FromStem,
        notes: VIDEO_NOTES,
        hints: Some(VIDEO_HINTS),
        cover_script: None,
    },
    CollectionSpec {
        kind: CollectionKind::Music,
        dir: "music",
        locales: &[],
        asset_dir: Some("videos"),
        extensions: VIDEO_EXTENSIONS,
        metric: AssetMetric::Duration,
        title: TitlePolicy::FromStem,
        notes: VIDEO_NOTES,
        hints: Some(VIDEO_HINTS),
        cover_script: Some("extract_covers.py"),
    },
    CollectionSpec {
        kind: CollectionKind::Paintings,
        dir: "paintings",
        locales: &[],
        asset_dir: Some("images"),
        extensions: IMAGE_EXTENSIONS,
        metric: AssetMetric::Size,
        title: TitlePolicy::FromStem,
        notes: IMAGE_NOTES,
        hints: None,
        cover_script: Some("generate_covers.py"),
    },
    CollectionSpec {
        kind: CollectionKind::Downloads,
        dir: "downloads",
        locales: &[],
        asset_dir: None,
        extensions: &[],
        metric: AssetMetric::Size,
        title: TitlePolicy::Untitled,
        notes: DOWNLOAD_NOTES,
        hints: None,
        cover_script: None,
    },
];

impl CollectionKind {
    /// Every collection, in table order.
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::LsLearns,
        CollectionKind::Music,
        CollectionKind::Paintings,
        CollectionKind::Downloads,
    ];

    /// Identifier used by the administrative trigger.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::LsLearns => "lsLearns",
            CollectionKind::Music => "music",
            CollectionKind::Paintings => "paintings",
            CollectionKind::Downloads => "downloads",
        }
    }

    /// Static layout and indexing rules of this collection.
    pub fn spec(&self) -> &'static CollectionSpec {
        match self {
            CollectionKind::LsLearns => &COLLECTIONS[0],
            CollectionKind::Music => &COLLECTIONS[1],
            CollectionKind::Paintings => &COLLECTIONS[2],
            CollectionKind::Downloads => &COLLECTIONS[3],
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SyncError::UnknownCollection(s.to_string()))
    }
}

/// Resolved on-disk locations for one variant of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPaths {
    /// Locale of this variant; `None` for unlocalized collections.
    pub locale: Option<&'static str>,
    /// Directory holding `db.json`.
    pub base_dir: PathBuf,
    /// Directory whose top-level files are the assets.
    pub asset_dir: PathBuf,
    /// Location of the variant's `db.json`.
    pub index_path: PathBuf,
}

impl CollectionSpec {
    /// `<root>/<dir>`.
    pub fn collection_dir(&self, root: &Path) -> PathBuf {
        root.join(self.dir)
    }

    /// One entry per locale, or a single unlocalized variant.
    pub fn variants(&self, root: &Path) -> Vec<VariantPaths> {
        let collection_dir = self.collection_dir(root);
        if self.locales.is_empty() {
            return vec![self.variant_paths(collection_dir, None)];
        }

        self.locales
            .iter()
            .map(|locale| {
                self.variant_paths(collection_dir.join(locale), Some(*locale))
            })
            .collect()
    }

    fn variant_paths(
        &self,
        base_dir: PathBuf,
        locale: Option<&'static str>,
    ) -> VariantPaths {
        let asset_dir = match self.asset_dir {
            Some(sub) => base_dir.join(sub),
            None => base_dir.clone(),
        };
        VariantPaths {
            locale,
            index_path: base_dir.join(INDEX_FILE_NAME),
            base_dir,
            asset_dir,
        }
    }

    /// Case-insensitive extension check against the allow-list.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    /// True when missing titles default to the file stem.
    pub fn uses_titles(&self) -> bool {
        self.title == TitlePolicy::FromStem
    }
}
