//! Cover URL cache: books.com.tw id -> cover image URL.
//!
//! The host owns this storage. Sources write the URL they found while parsing
//! a detail page and read it back when asked for a cover.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::CacheError;

pub trait CoverUrlCache: Send + Sync {
    fn get(&self, id: &str) -> Option<String>;
    fn set(&self, id: &str, url: &str);
}

#[derive(Debug, Default)]
pub struct MemoryCoverCache {
    urls: RwLock<HashMap<String, String>>,
}

impl MemoryCoverCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_map(urls: HashMap<String, String>) -> Self {
        Self { urls: RwLock::new(urls) }
    }

    fn snapshot(&self) -> HashMap<String, String> {
        self.urls
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CoverUrlCache for MemoryCoverCache {
    fn get(&self, id: &str) -> Option<String> {
        self.urls
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }

    fn set(&self, id: &str, url: &str) {
        self.urls
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.to_string(), url.to_string());
    }
}

/// File name used inside the cache directory.
pub const COVER_CACHE_FILE: &str = "cover_urls.json";

/// Memory cache backed by a JSON file. Writes stay in memory until [`FileCoverCache::save`].
#[derive(Debug)]
pub struct FileCoverCache {
    path: PathBuf,
    inner: MemoryCoverCache,
}

impl FileCoverCache {
    /// Open the cache at `path`. A missing file starts an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let urls = match std::fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), "opened cover cache");
        Ok(Self {
            path,
            inner: MemoryCoverCache::from_map(urls),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.inner.snapshot())?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl CoverUrlCache for FileCoverCache {
    fn get(&self, id: &str) -> Option<String> {
        self.inner.get(id)
    }

    fn set(&self, id: &str, url: &str) {
        self.inner.set(id, url);
    }
}
