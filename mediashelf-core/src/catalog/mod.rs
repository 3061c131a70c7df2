//! Collection table, persisted index model and asset enumeration.

pub mod collection;
pub mod index;
pub mod scanner;

pub use collection::{
    AssetMetric, CollectionKind, CollectionSpec, INDEX_FILE_NAME, TitlePolicy,
    VariantPaths,
};
pub use index::{AssetRecord, CollectionIndex, PriorIndex};
pub use scanner::{AssetScanner, DiscoveredAsset};
