//! JSON-file backed global variable store
//!
//! Reads are served from an in-memory cache. Writes update the cache at once
//! and mark it dirty; a single background thread ("trigger-var-saver")
//! writes the whole cache to disk on every autosave tick, on
//! [`GlobalStore::flush`] and when the store is dropped.
//! [`GlobalStore::reload`] picks up edits made to the file by hand.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, TriggerError};
use crate::interpreter::GlobalStore;
use crate::script::{StoredValue, Value};

struct StoreInner {
    path: PathBuf,
    cache: RwLock<HashMap<String, Value>>,
    dirty: AtomicBool,
    /// Serializes writers to the file
    file_lock: Mutex<()>,
}

impl StoreInner {
    fn save(&self) -> Result<()> {
        let _guard = self.file_lock.lock();
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let snapshot: BTreeMap<String, StoredValue> = self
            .cache
            .read()
            .iter()
            .filter_map(|(k, v)| v.to_stored().map(|s| (k.clone(), s)))
            .collect();

        let result = write_atomically(&self.path, &snapshot);
        if result.is_err() {
            // Try again on the next tick
            self.dirty.store(true, Ordering::SeqCst);
        }
        result
    }

    fn reload(&self) -> Result<()> {
        let _guard = self.file_lock.lock();
        let values = read_values(&self.path)?;
        let count = values.len();
        *self.cache.write() = values;
        self.dirty.store(false, Ordering::SeqCst);
        log::info!("Reloaded {} global variables from {}", count, self.path.display());
        Ok(())
    }
}

/// Missing and blank files hold no variables
fn read_values(path: &Path) -> Result<HashMap<String, Value>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let source = std::fs::read_to_string(path)?;
    if source.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let stored: HashMap<String, StoredValue> = serde_json::from_str(&source)?;
    Ok(stored.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

fn write_atomically(path: &Path, values: &BTreeMap<String, StoredValue>) -> Result<()> {
    let json = serde_json::to_string_pretty(values)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Global store persisted to one JSON object file
pub struct JsonFileStore {
    inner: Arc<StoreInner>,
    stop: Mutex<Option<Sender<()>>>,
    saver: Mutex<Option<JoinHandle<()>>>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path` and start autosaving
    pub fn open(path: impl Into<PathBuf>, autosave_interval: Duration) -> Result<Self> {
        let path = path.into();

        let cache = read_values(&path)?;
        log::info!("Loaded {} global variables from {}", cache.len(), path.display());

        let inner = Arc::new(StoreInner {
            path,
            cache: RwLock::new(cache),
            dirty: AtomicBool::new(false),
            file_lock: Mutex::new(()),
        });

        let (stop, stopped) = mpsc::channel::<()>();
        let saver_inner = inner.clone();
        let saver = thread::Builder::new()
            .name("trigger-var-saver".into())
            .spawn(move || loop {
                let last = match stopped.recv_timeout(autosave_interval) {
                    Err(RecvTimeoutError::Timeout) => false,
                    _ => true,
                };
                if let Err(e) = saver_inner.save() {
                    log::error!(
                        "Failed to save global variables to {}: {}",
                        saver_inner.path.display(),
                        e
                    );
                }
                if last {
                    break;
                }
            })?;

        Ok(Self {
            inner,
            stop: Mutex::new(Some(stop)),
            saver: Mutex::new(Some(saver)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn len(&self) -> usize {
        self.inner.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.cache.read().is_empty()
    }

    /// Whether writes are waiting for the next save
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Stop the saver thread after a final save
    pub fn close(&self) {
        drop(self.stop.lock().take());
        if let Some(handle) = self.saver.lock().take() {
            if handle.join().is_err() {
                log::error!("Global variable saver panicked");
            }
        }
    }
}

impl GlobalStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.cache.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        if value.to_stored().is_none() {
            return Err(TriggerError::Storage(format!(
                "{} is not a valid type to be saved",
                value.type_name()
            )));
        }

        {
            let mut cache = self.inner.cache.write();
            if value.is_null() {
                cache.remove(key);
            } else {
                cache.insert(key.to_string(), value);
            }
        }
        self.inner.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.inner.cache.read().contains_key(key)
    }

    fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.cache.write().remove(key);
        if removed.is_some() {
            self.inner.dirty.store(true, Ordering::SeqCst);
        }
        removed
    }

    fn flush(&self) -> Result<()> {
        self.inner.save()
    }

    /// Unsaved writes are discarded. On a read or parse error the cached
    /// values are kept.
    fn reload(&self) -> Result<()> {
        self.inner.reload()
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        self.close();
    }
}
