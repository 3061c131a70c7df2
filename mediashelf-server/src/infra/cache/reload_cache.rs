use arc_swap::ArcSwap;
use axum::body::Bytes;
use dashmap::DashMap;
use std::{
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::debug;

/// Content classification derived from the file extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Html,
    Binary,
}

impl ContentKind {
    pub fn from_path(path: &str) -> Self {
        let extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("json") => ContentKind::Json,
            Some("html") => ContentKind::Html,
            _ => ContentKind::Binary,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ContentKind::Json => "application/json; charset=utf-8",
            ContentKind::Html => "text/html; charset=utf-8",
            ContentKind::Binary => "application/octet-stream",
        }
    }
}

/// Immutable payload of one cache entry. Cloning shares the bytes.
#[derive(Debug, Clone)]
pub struct CachedFile {
    pub bytes: Bytes,
    pub content_kind: ContentKind,
}

type EntryMap = DashMap<String, CachedFile>;

/// Read-through byte cache over the served root.
///
/// Entries are only ever added on a successful read and only ever removed
/// all at once by [`ReloadCache::invalidate_all`]. Absent files are never
/// memoized.
///
/// Callers must validate that a key stays under the served root; the cache
/// only normalizes separators.
pub struct ReloadCache {
    root: PathBuf,
    entries: ArcSwap<EntryMap>,
    generation: AtomicU64,
}

impl std::fmt::Debug for ReloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadCache")
            .field("root", &self.root)
            .field("entries", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl ReloadCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: ArcSwap::from_pointee(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the cached bytes for `relative_path`, loading them from disk
    /// on a miss. `Ok(None)` means the file does not exist right now.
    pub async fn get_or_load(
        &self,
        relative_path: &str,
    ) -> io::Result<Option<CachedFile>> {
        let key = normalize_key(relative_path);
        // Loads started before an invalidation land in the retired map.
        let entries = self.current();

        if let Some(hit) = entries.get(&key) {
            return Ok(Some(hit.value().clone()));
        }

        let path = self.root.join(&key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let file = CachedFile {
            bytes,
            content_kind: ContentKind::from_path(&key),
        };
        debug!(key = %key, size = file.bytes.len(), "reload cache miss loaded");
        entries.insert(key, file.clone());
        Ok(Some(file))
    }

    /// Drop every entry at once.
    pub fn invalidate_all(&self) -> usize {
        let retired = self.entries.swap(Arc::new(DashMap::new()));
        self.generation.fetch_add(1, Ordering::AcqRel);
        retired.len()
    }

    /// Number of completed invalidations since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current(&self) -> Arc<EntryMap> {
        self.entries.load_full()
    }
}

/// Unify separators and drop leading ones: `\en\index.html` -> `en/index.html`.
pub fn normalize_key(relative_path: &str) -> String {
    relative_path
        .replace('\\', "/")
        .trim_start_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_with(files: &[(&str, &str)]) -> (TempDir, ReloadCache) {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
        let cache = ReloadCache::new(dir.path());
        (dir, cache)
    }

    #[tokio::test]
    async fn serves_stale_content_until_invalidated() {
        let (dir, cache) = cache_with(&[("en/index.html", "v1")]);

        let first = cache.get_or_load("en/index.html").await.unwrap().unwrap();
        assert_eq!(&first.bytes[..], b"v1");

        std::fs::write(dir.path().join("en/index.html"), "v2").unwrap();
        let cached = cache.get_or_load("en/index.html").await.unwrap().unwrap();
        assert_eq!(&cached.bytes[..], b"v1");

        assert_eq!(cache.invalidate_all(), 1);
        assert_eq!(cache.generation(), 1);
        assert!(cache.is_empty());

        let fresh = cache.get_or_load("en/index.html").await.unwrap().unwrap();
        assert_eq!(&fresh.bytes[..], b"v2");
    }

    #[tokio::test]
    async fn absent_file_is_not_memoized() {
        let (dir, cache) = cache_with(&[]);

        assert!(cache.get_or_load("late.json").await.unwrap().is_none());
        assert!(cache.is_empty());

        std::fs::write(dir.path().join("late.json"), "{}").unwrap();
        let loaded = cache.get_or_load("late.json").await.unwrap().unwrap();
        assert_eq!(&loaded.bytes[..], b"{}");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn directories_are_not_found() {
        let (_dir, cache) = cache_with(&[("en/index.html", "x")]);
        assert!(cache.get_or_load("en").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn classifies_by_extension() {
        let (_dir, cache) = cache_with(&[
            ("db.json", "[]"),
            ("page.HTML", "<p>"),
            ("cover.jpg", "jpg"),
        ]);

        let json = cache.get_or_load("db.json").await.unwrap().unwrap();
        assert_eq!(json.content_kind.mime(), "application/json; charset=utf-8");
        let html = cache.get_or_load("page.HTML").await.unwrap().unwrap();
        assert_eq!(html.content_kind, ContentKind::Html);
        let jpg = cache.get_or_load("cover.jpg").await.unwrap().unwrap();
        assert_eq!(jpg.content_kind.mime(), "application/octet-stream");
    }

    #[tokio::test]
    async fn separator_variants_share_one_entry() {
        let (_dir, cache) = cache_with(&[("multimedia/music/db.json", "{}")]);

        cache.get_or_load("/multimedia/music/db.json").await.unwrap();
        cache.get_or_load("multimedia\\music\\db.json").await.unwrap();
        cache.get_or_load("multimedia/music/db.json").await.unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn simultaneous_misses_leave_one_consistent_entry() {
        let payload = "x".repeat(64 * 1024);
        let (_dir, cache) = cache_with(&[("multimedia/music/db.json", &payload)]);
        let cache = Arc::new(cache);

        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            let key = if i % 2 == 0 {
                "multimedia/music/db.json"
            } else {
                "/multimedia\\music\\db.json"
            };
            handles.push(tokio::spawn(async move {
                cache.get_or_load(key).await.unwrap().unwrap()
            }));
        }

        for handle in handles {
            let file = handle.await.unwrap();
            assert_eq!(file.bytes.len(), payload.len());
            assert_eq!(&file.bytes[..], payload.as_bytes());
            assert_eq!(file.content_kind, ContentKind::Json);
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn normalizes_keys() {
        assert_eq!(normalize_key("\\cn\\index.html"), "cn/index.html");
        assert_eq!(normalize_key("//a/b.json"), "a/b.json");
        assert_eq!(normalize_key("a/b.json"), "a/b.json");
    }
}
