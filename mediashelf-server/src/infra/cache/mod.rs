pub mod reload_cache;

pub use reload_cache::{CachedFile, ContentKind, ReloadCache, normalize_key};
