use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::fingerprint::model::FingerprintDocument;

/// On-disk fingerprint documents (`<dir>/<category>.json`) with a process-wide
/// read cache.
///
/// A cached document is never re-read from disk until `reload` or
/// `invalidate` is called for its category. Cache misses are serialized so that
/// concurrent first loads of a category share a single read and a single `Arc`.
pub struct FingerprintStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<FingerprintDocument>>>,
    load_lock: Mutex<()>,
}

impl FingerprintStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
            load_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Backing file for a category.
    pub fn path_for(&self, category: &str) -> Result<PathBuf, StoreError> {
        validate_category(category)?;
        Ok(self.dir.join(format!("{}.json", category)))
    }

    /// Load a category, serving it from the cache after the first success.
    pub fn load(&self, category: &str) -> Result<Arc<FingerprintDocument>, StoreError> {
        if let Some(doc) = self.cached(category) {
            return Ok(doc);
        }

        let _guard = self.load_lock.lock();
        // Another caller may have finished the load while we waited.
        if let Some(doc) = self.cached(category) {
            return Ok(doc);
        }

        let doc = Arc::new(self.read(category)?);
        self.cache
            .write()
            .insert(category.to_string(), Arc::clone(&doc));
        Ok(doc)
    }

    /// Drop any cached copy and read the category from disk again.
    pub fn reload(&self, category: &str) -> Result<Arc<FingerprintDocument>, StoreError> {
        let _guard = self.load_lock.lock();
        self.cache.write().remove(category);
        let doc = Arc::new(self.read(category)?);
        self.cache
            .write()
            .insert(category.to_string(), Arc::clone(&doc));
        Ok(doc)
    }

    /// Evict a category from the cache. Returns whether it was cached.
    pub fn invalidate(&self, category: &str) -> bool {
        let removed = self.cache.write().remove(category).is_some();
        if removed {
            debug!(category, "fingerprint evicted from cache");
        }
        removed
    }

    pub fn is_cached(&self, category: &str) -> bool {
        self.cache.read().contains_key(category)
    }

    /// Sorted names of every category with a backing file.
    pub fn categories(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source: e,
                });
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn cached(&self, category: &str) -> Option<Arc<FingerprintDocument>> {
        self.cache.read().get(category).map(Arc::clone)
    }

    fn read(&self, category: &str) -> Result<FingerprintDocument, StoreError> {
        let path = self.path_for(category)?;
        info!(category, path = %path.display(), "loading fingerprint");
        read_document(category, &path).inspect_err(|e| {
            error!(category, path = %path.display(), error = %e, "failed to load fingerprint");
        })
    }
}

/// Parse and validate a fingerprint file.
pub fn read_document(category: &str, path: &Path) -> Result<FingerprintDocument, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            StoreError::NotFound {
                category: category.to_string(),
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let doc: FingerprintDocument =
        serde_json::from_str(&content).map_err(|e| StoreError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    doc.validate().map_err(|reason| StoreError::Malformed {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok(doc)
}

/// Persist a document as pretty JSON without ever exposing a partial file.
pub fn write_document(path: &Path, doc: &FingerprintDocument) -> Result<(), StoreError> {
    let mut json = serde_json::to_string_pretty(doc)?;
    json.push('\n');
    write_atomic(path, &json)
}

/// Write to a sibling temp file, then rename over the target.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    let tmp = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name,
        uuid::Uuid::new_v4().simple()
    ));

    fs::write(&tmp, contents).map_err(io_err)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}

/// Category names become file stems, so they must not escape the store dir.
pub fn validate_category(category: &str) -> Result<(), StoreError> {
    let bad = category.trim().is_empty()
        || category.contains('/')
        || category.contains('\\')
        || category.contains("..");
    if bad {
        return Err(StoreError::InvalidCategory(category.to_string()));
    }
    Ok(())
}
