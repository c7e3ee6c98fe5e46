// Process-wide dataset cache. One slot per set of input paths and load
// mode; the slot remembers the content fingerprint it was loaded from, so
// the interactive menu only re-reads spreadsheets after they change or
// after an explicit `invalidate`, and an edited file replaces its old entry.
use crate::config::Sources;
use crate::error::Result;
use crate::loader::{load_dataset, load_dataset_lenient, Dataset};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

static DATASET_CACHE: Lazy<Mutex<DatasetCache>> = Lazy::new(|| Mutex::new(DatasetCache::default()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    Strict,
    Lenient,
}

struct CacheEntry {
    fingerprint: String,
    dataset: Arc<Dataset>,
}

#[derive(Default)]
pub struct DatasetCache {
    entries: HashMap<String, CacheEntry>,
    pub hits: usize,
    pub misses: usize,
}

impl DatasetCache {
    pub fn get_or_load<F>(&mut self, slot: String, fingerprint: String, load: F) -> Result<Arc<Dataset>>
    where
        F: FnOnce() -> Result<Dataset>,
    {
        if let Some(entry) = self.entries.get(&slot) {
            if entry.fingerprint == fingerprint {
                self.hits += 1;
                debug!(%slot, "dataset cache hit");
                return Ok(Arc::clone(&entry.dataset));
            }
            debug!(%slot, "input files changed; reloading");
        }
        self.misses += 1;
        let dataset = Arc::new(load()?);
        self.entries.insert(
            slot,
            CacheEntry {
                fingerprint,
                dataset: Arc::clone(&dataset),
            },
        );
        Ok(dataset)
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// SHA-256 over every input file's bytes plus the load mode. Missing files
/// hash as a marker so the lenient loader can still be cached.
pub fn fingerprint(sources: &Sources, mode: LoadMode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{mode:?}").as_bytes());
    for path in sources.all_paths() {
        hasher.update(path.to_string_lossy().as_bytes());
        match std::fs::read(path) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(b"<missing>"),
        }
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn global() -> MutexGuard<'static, DatasetCache> {
    DATASET_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cache slot for a set of input paths and a load mode.
pub fn slot_key(sources: &Sources, mode: LoadMode) -> String {
    let paths: Vec<String> = sources.all_paths().iter().map(|p| p.to_string_lossy().into_owned()).collect();
    format!("{mode:?}|{}", paths.join("|"))
}

pub fn cached_dataset(sources: &Sources, mode: LoadMode) -> Result<Arc<Dataset>> {
    let slot = slot_key(sources, mode);
    let fp = fingerprint(sources, mode);
    global().get_or_load(slot, fp, || match mode {
        LoadMode::Strict => load_dataset(sources),
        LoadMode::Lenient => load_dataset_lenient(sources),
    })
}

pub fn invalidate() {
    let mut cache = global();
    debug!(entries = cache.len(), hits = cache.hits, misses = cache.misses, "dataset cache cleared");
    cache.invalidate();
}
