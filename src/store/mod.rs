//! Offline cache store
//!
//! A file-backed key-value store used only when the remote gateway is
//! unreachable: one JSON document per logical key under a configured
//! directory. Reads degrade to the type's default on missing or corrupt
//! documents; writes serialize the full value. Read-modify-write cycles are
//! serialized behind one async mutex, so concurrent service calls within a
//! process cannot interleave; across processes the discipline stays
//! last-writer-wins.

pub mod keys;
pub mod remarks;
pub mod requests;
pub mod stock;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::AppResult;

/// Handle to the cache directory, cloned into each typed facade the way the
/// repository layer shares a connection pool.
#[derive(Clone)]
pub struct CacheDir {
    inner: Arc<CacheDirInner>,
}

struct CacheDirInner {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl CacheDir {
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            inner: Arc::new(CacheDirInner {
                dir,
                write_lock: Mutex::new(()),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.inner.dir.join(format!("{safe}.json"))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Read a document, degrading to the default on any failure.
    pub fn read<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(key, error = %e, "corrupt cache document, using default");
                T::default()
            }),
            Err(_) => T::default(),
        }
    }

    /// Serialize and write the full document.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let raw = serde_json::to_string_pretty(value)
            .map_err(|e| crate::error::AppError::Internal(format!("cache serialize failed: {e}")))?;
        fs::write(self.path_for(key), raw)?;
        Ok(())
    }

    /// Read-modify-write under the store mutex.
    pub async fn mutate<T, R, F>(&self, key: &str, f: F) -> AppResult<R>
    where
        T: DeserializeOwned + Default + Serialize,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut value: T = self.read(key);
        let result = f(&mut value);
        self.write(key, &value)?;
        Ok(result)
    }
}

/// The full cache store with its typed facades.
#[derive(Clone)]
pub struct CacheStore {
    pub dir: CacheDir,
    pub requests: requests::RequestsCache,
    pub stock: stock::StockCache,
    pub remarks: remarks::RemarksCache,
}

impl CacheStore {
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = CacheDir::open(dir)?;
        Ok(Self {
            requests: requests::RequestsCache::new(dir.clone()),
            stock: stock::StockCache::new(dir.clone()),
            remarks: remarks::RemarksCache::new(dir.clone()),
            dir,
        })
    }
}
