//! Staging and durable storage for encoded assets.
//!
//! The worker writes finished assets into a *staging* directory; requests
//! promote them into the *durable* cache. Every write lands under a temporary
//! name first and becomes visible through a single rename, so a reader can
//! only ever open a complete asset.

use crate::{AssetFormat, Error, Result, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Encoded asset bytes together with their media type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedAsset {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

/// Storage consulted by the request path and written by the worker.
pub trait AssetStore: Send + Sync + 'static {
    /// Whether an asset for `value` is cached or staged.
    fn exists(&self, value: Value) -> bool {
        self.is_cached(value) || self.is_staged(value)
    }

    fn is_cached(&self, value: Value) -> bool;

    fn is_staged(&self, value: Value) -> bool;

    /// Moves a staged asset into the durable cache, replacing any older one.
    ///
    /// Returns `false` when nothing was staged, including when a concurrent
    /// caller promoted it first.
    fn promote(&self, value: Value) -> Result<bool>;

    /// Stages a complete asset for `value`.
    fn write(&self, value: Value, bytes: &[u8]) -> Result<()>;

    /// Reads the durable asset for `value`, if any.
    fn read(&self, value: Value) -> Result<Option<CachedAsset>>;

    fn media_type(&self) -> &'static str;
}

impl<S: AssetStore + ?Sized> AssetStore for std::sync::Arc<S> {
    fn exists(&self, value: Value) -> bool {
        (**self).exists(value)
    }

    fn is_cached(&self, value: Value) -> bool {
        (**self).is_cached(value)
    }

    fn is_staged(&self, value: Value) -> bool {
        (**self).is_staged(value)
    }

    fn promote(&self, value: Value) -> Result<bool> {
        (**self).promote(value)
    }

    fn write(&self, value: Value, bytes: &[u8]) -> Result<()> {
        (**self).write(value, bytes)
    }

    fn read(&self, value: Value) -> Result<Option<CachedAsset>> {
        (**self).read(value)
    }

    fn media_type(&self) -> &'static str {
        (**self).media_type()
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// [`AssetStore`] keeping `<value>.<ext>` files in two directories.
#[derive(Clone, Debug)]
pub struct DiskAssetStore {
    staging_dir: PathBuf,
    cache_dir: PathBuf,
    format: AssetFormat,
}

impl DiskAssetStore {
    /// Creates both directories if they do not exist yet.
    pub fn new(
        staging_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        format: AssetFormat,
    ) -> Result<Self> {
        let store = Self {
            staging_dir: staging_dir.into(),
            cache_dir: cache_dir.into(),
            format,
        };
        for dir in [&store.staging_dir, &store.cache_dir] {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        Ok(store)
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn staged_path(&self, value: Value) -> PathBuf {
        self.staging_dir.join(self.file_name(value))
    }

    pub fn cached_path(&self, value: Value) -> PathBuf {
        self.cache_dir.join(self.file_name(value))
    }

    fn file_name(&self, value: Value) -> String {
        format!("{value}.{}", self.format.extension())
    }

    fn temp_path(&self, dir: &Path, value: Value) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        dir.join(format!(
            ".{}.{}.{seq}.partial",
            self.file_name(value),
            std::process::id()
        ))
    }

    /// Copies `from` next to `to` and renames it into place.
    fn copy_into_place(&self, from: &Path, to: &Path, value: Value) -> Result<()> {
        let temp = self.temp_path(&self.cache_dir, value);
        if let Err(e) = std::fs::copy(from, &temp) {
            let _ = std::fs::remove_file(&temp);
            return Err(Error::io(from, e));
        }
        std::fs::rename(&temp, to).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            Error::io(to, e)
        })?;
        match std::fs::remove_file(from) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(from, e)),
        }
    }
}

impl AssetStore for DiskAssetStore {
    fn is_cached(&self, value: Value) -> bool {
        self.cached_path(value).is_file()
    }

    fn is_staged(&self, value: Value) -> bool {
        self.staged_path(value).is_file()
    }

    fn promote(&self, value: Value) -> Result<bool> {
        let staged = self.staged_path(value);
        let cached = self.cached_path(value);
        match std::fs::rename(&staged, &cached) {
            Ok(()) => {
                tracing::debug!(%value, "promoted staged asset");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                match self.copy_into_place(&staged, &cached, value) {
                    Ok(()) => {
                        tracing::debug!(%value, "promoted staged asset across filesystems");
                        Ok(true)
                    }
                    // Another request finished the promotion first.
                    Err(Error::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(Error::io(&staged, e)),
        }
    }

    fn write(&self, value: Value, bytes: &[u8]) -> Result<()> {
        let temp = self.temp_path(&self.staging_dir, value);
        if let Err(e) = std::fs::write(&temp, bytes) {
            let _ = std::fs::remove_file(&temp);
            return Err(Error::io(&temp, e));
        }
        let staged = self.staged_path(value);
        std::fs::rename(&temp, &staged).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            Error::io(&staged, e)
        })
    }

    fn read(&self, value: Value) -> Result<Option<CachedAsset>> {
        let path = self.cached_path(value);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(CachedAsset {
                bytes,
                media_type: self.format.media_type(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    fn media_type(&self) -> &'static str {
        self.format.media_type()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Store rooted in a fresh temp dir. The dir is removed when the returned
    /// `TempDir` drops, so keep it alive for the whole test.
    pub(crate) fn temp_store() -> (TempDir, DiskAssetStore) {
        let dir = TempDir::new().unwrap();
        let store = DiskAssetStore::new(
            dir.path().join("output"),
            dir.path().join("cache"),
            AssetFormat::Gif,
        )
        .unwrap();
        (dir, store)
    }

    #[test]
    fn write_stages_without_caching() {
        let (_dir, store) = temp_store();
        store.write(Value(7), b"GIF89a").unwrap();
        assert!(store.is_staged(Value(7)));
        assert!(!store.is_cached(Value(7)));
        assert!(store.exists(Value(7)));
        assert_eq!(store.read(Value(7)).unwrap(), None);
        assert!(store.staged_path(Value(7)).ends_with("output/7.gif"));
    }

    #[test]
    fn promote_moves_staged_into_cache() {
        let (_dir, store) = temp_store();
        store.write(Value(3), b"first").unwrap();
        assert!(store.promote(Value(3)).unwrap());
        assert!(!store.is_staged(Value(3)));

        let asset = store.read(Value(3)).unwrap().unwrap();
        assert_eq!(asset.bytes, b"first");
        assert_eq!(asset.media_type, "image/gif");

        // A newer render replaces the cached one on its next promotion.
        store.write(Value(3), b"second").unwrap();
        assert_eq!(store.read(Value(3)).unwrap().unwrap().bytes, b"first");
        assert!(store.promote(Value(3)).unwrap());
        assert_eq!(store.read(Value(3)).unwrap().unwrap().bytes, b"second");
    }

    #[test]
    fn promote_without_staged_asset_is_a_no_op() {
        let (_dir, store) = temp_store();
        assert!(!store.promote(Value(1)).unwrap());
        assert!(!store.exists(Value(1)));
    }

    #[test]
    fn concurrent_promotions_move_once() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);
        store.write(Value(9), b"asset").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.promote(Value(9)).unwrap())
            })
            .collect();
        let moved = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|moved| *moved)
            .count();

        assert_eq!(moved, 1);
        assert_eq!(store.read(Value(9)).unwrap().unwrap().bytes, b"asset");
    }

    #[test]
    fn readers_never_observe_partial_assets() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);
        let a = vec![b'a'; 256 * 1024];
        let b = vec![b'b'; 512 * 1024];

        let writer = {
            let store = Arc::clone(&store);
            let (a, b) = (a.clone(), b.clone());
            std::thread::spawn(move || {
                for i in 0..50 {
                    store.write(Value(5), if i % 2 == 0 { &a } else { &b }).unwrap();
                    store.promote(Value(5)).unwrap();
                }
            })
        };

        while !writer.is_finished() {
            if let Some(asset) = store.read(Value(5)).unwrap() {
                assert!(asset.bytes == a || asset.bytes == b, "torn read");
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn no_partial_files_are_left_behind() {
        let (_dir, store) = temp_store();
        store.write(Value(11), b"x").unwrap();
        store.promote(Value(11)).unwrap();
        let leftovers = std::fs::read_dir(store.staging_dir())
            .unwrap()
            .chain(std::fs::read_dir(store.cache_dir()).unwrap())
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn temp_store_is_removed_on_drop() {
        let (dir, store) = temp_store();
        store.write(Value(2), b"x").unwrap();
        store.promote(Value(2)).unwrap();
        let root = dir.path().to_path_buf();
        assert!(store.cached_path(Value(2)).starts_with(&root));

        drop(dir);
        assert!(!root.exists());
        assert!(!store.cache_dir().exists());
    }
}
