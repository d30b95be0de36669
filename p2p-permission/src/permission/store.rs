//! Preference storage for persisting the permission state
//!
//! Provides a trait-based key-value store with change subscriptions that
//! framework users can back with whatever durable storage their platform offers.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

/// Error type for preference store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access preference store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse preference store: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to watch preference store: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid value {value:?} for key {key:?}")]
    InvalidValue { key: String, value: String },

    #[error("Store is read-only")]
    ReadOnly,
}

/// Handle returned by [`PreferenceStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked with the key of every committed change
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Trait for durable preference storage
///
/// Implementations must deliver at least one change notification for every
/// committed write, including writes that originate outside this process when
/// the backend can observe them. Callbacks must be invoked without any internal
/// lock held, so subscribers may read, write and unsubscribe from inside them.
pub trait PreferenceStore: Send + Sync {
    /// Get the raw value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Register a change callback
    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId;

    /// Remove a change callback, returning false if it was not registered
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Read a boolean flag, falling back to `default` when absent
    fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        match self.get(key)? {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| StoreError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        }
    }

    /// Write a boolean flag
    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.set(key, if value { "true" } else { "false" })
    }
}

// ============================================================================
// Change listener registry
// ============================================================================

/// Subscriber list shared by the bundled stores
#[derive(Default)]
pub struct ChangeListeners {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, ChangeCallback)>>,
}

impl ChangeListeners {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().unwrap().push((id, callback));
        id
    }

    /// Remove a callback
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock().unwrap();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Check whether `id` is still registered
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.callbacks
            .lock()
            .unwrap()
            .iter()
            .any(|(existing, _)| *existing == id)
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    /// Check if no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback registered at the time of the call
    pub fn notify(&self, key: &str) {
        let snapshot: Vec<(SubscriptionId, ChangeCallback)> = self
            .callbacks
            .lock()
            .unwrap()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        for (id, callback) in snapshot {
            // Skip callbacks removed by an earlier callback in this round
            if self.contains(id) {
                callback(key);
            }
        }
    }
}

impl std::fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("count", &self.len())
            .finish()
    }
}

// ============================================================================
// File-based Preference Store
// ============================================================================

/// Persistent file data structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PreferenceFileData {
    version: u32,
    values: BTreeMap<String, String>,
}

impl PreferenceFileData {
    fn new() -> Self {
        Self {
            version: 1,
            values: BTreeMap::new(),
        }
    }

    fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Keys whose value differs between `self` and `other`
    fn changed_keys(&self, other: &Self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .iter()
            .filter(|(k, v)| other.values.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        keys.extend(
            other
                .values
                .keys()
                .filter(|k| !self.values.contains_key(*k))
                .cloned(),
        );
        keys
    }
}

struct FileStoreShared {
    path: PathBuf,
    data: RwLock<PreferenceFileData>,
    listeners: ChangeListeners,
}

impl FileStoreShared {
    /// Persist `data`; callers hold the write lock so memory and disk change together
    fn persist(&self, data: &PreferenceFileData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a concurrent reader never sees a partial file
        let tmp = self.tmp_path();
        let written = write_then_rename(&tmp, &self.path, data);
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }

    /// Unique per write, so store instances sharing a file never share a tmp file
    fn tmp_path(&self) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            name,
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ))
    }

    /// Re-read the backing file and notify subscribers of every changed key
    fn reload(&self) -> Result<usize, StoreError> {
        let changed = {
            // Load under the write lock so a local write can't land between read and swap
            let mut data = self.data.write().unwrap();
            let fresh = PreferenceFileData::load(&self.path)?;
            let changed = fresh.changed_keys(&data);
            *data = fresh;
            changed
        };

        for key in &changed {
            tracing::debug!(key = %key, path = %self.path.display(), "Preference changed on disk");
            self.listeners.notify(key);
        }
        Ok(changed.len())
    }

    fn is_own_file(&self, candidate: &Path) -> bool {
        candidate.file_name().is_some() && candidate.file_name() == self.path.file_name()
    }
}

/// File-based preference store
///
/// Stores preferences in a JSON file at a configurable location.
/// Default: `~/.config/<app>/p2p_permission.json`
pub struct FilePreferenceStore {
    shared: Arc<FileStoreShared>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FilePreferenceStore {
    /// Create a new file-based store at the specified path
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = PreferenceFileData::load(&path)?;

        Ok(Self {
            shared: Arc::new(FileStoreShared {
                path,
                data: RwLock::new(data),
                listeners: ChangeListeners::new(),
            }),
            watcher: Mutex::new(None),
        })
    }

    /// Create a store in the default location for an application
    pub fn default_for_app(app_name: &str) -> Result<Self, StoreError> {
        Self::new(Self::default_path(app_name))
    }

    /// Default store location for an application
    pub fn default_path(app_name: &str) -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"));
        config_dir.join(app_name).join("p2p_permission.json")
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Number of active change subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Re-read the file now, notifying subscribers of changed keys
    pub fn reload(&self) -> Result<usize, StoreError> {
        self.shared.reload()
    }

    /// Start watching the backing file for writes made by other processes
    ///
    /// Calling this more than once is a no-op.
    pub fn watch(&self) -> Result<(), StoreError> {
        let mut slot = self.watcher.lock().unwrap();
        if slot.is_some() {
            return Ok(());
        }

        let dir = match self.shared.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let shared = Arc::clone(&self.shared);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Preference watcher error");
                    return;
                }
            };
            if !event.paths.iter().any(|p| shared.is_own_file(p)) {
                return;
            }
            if let Err(e) = shared.reload() {
                // A later event will carry the completed write
                tracing::warn!(path = %shared.path.display(), error = %e, "Failed to reload preferences");
            }
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.shared.path.display(), "Watching preference store");
        *slot = Some(watcher);
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.shared.data.read().unwrap();
        Ok(data.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut data = self.shared.data.write().unwrap();
            let previous = data.values.insert(key.to_string(), value.to_string());
            if let Err(e) = self.shared.persist(&data) {
                // Keep memory consistent with disk when the write is lost
                restore(&mut data, key, previous);
                return Err(e);
            }
        }
        self.shared.listeners.notify(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        {
            let mut data = self.shared.data.write().unwrap();
            let removed = data.values.remove(key);
            if removed.is_none() {
                return Ok(());
            }
            if let Err(e) = self.shared.persist(&data) {
                restore(&mut data, key, removed);
                return Err(e);
            }
        }
        self.shared.listeners.notify(key);
        Ok(())
    }

    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.shared.listeners.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }
}

fn write_then_rename(tmp: &Path, path: &Path, data: &PreferenceFileData) -> Result<(), StoreError> {
    let file = File::create(tmp)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)?;
    writer.flush()?;
    fs::rename(tmp, path)?;
    Ok(())
}

fn restore(data: &mut PreferenceFileData, key: &str, previous: Option<String>) {
    match previous {
        Some(old) => data.values.insert(key.to_string(), old),
        None => data.values.remove(key),
    };
}

impl std::fmt::Debug for FilePreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePreferenceStore")
            .field("path", &self.shared.path)
            .field("watching", &self.watcher.lock().unwrap().is_some())
            .finish()
    }
}

// ============================================================================
// In-Memory Preference Store
// ============================================================================

/// In-memory preference store for testing or session-only state
pub struct MemoryPreferenceStore {
    data: RwLock<BTreeMap<String, String>>,
    listeners: ChangeListeners,
}

impl MemoryPreferenceStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            listeners: ChangeListeners::new(),
        }
    }

    /// Get the number of stored values
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    /// Number of active change subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.data.read().unwrap();
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut data = self.data.write().unwrap();
            data.insert(key.to_string(), value.to_string());
        }
        self.listeners.notify(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removed = {
            let mut data = self.data.write().unwrap();
            data.remove(key)
        };
        if removed.is_some() {
            self.listeners.notify(key);
        }
        Ok(())
    }

    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.listeners.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl std::fmt::Debug for MemoryPreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPreferenceStore")
            .field("count", &self.len())
            .field("subscribers", &self.listeners.len())
            .finish()
    }
}

// ============================================================================
// Read-Only Preference Store
// ============================================================================

/// Read-only wrapper for any preference store
///
/// Useful where the permission state is provisioned ahead of time and must
/// not change at runtime.
pub struct ReadOnlyPreferenceStore<S: PreferenceStore> {
    inner: S,
}

impl<S: PreferenceStore> ReadOnlyPreferenceStore<S> {
    /// Create a read-only wrapper
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Access the wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: PreferenceStore> PreferenceStore for ReadOnlyPreferenceStore<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.inner.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }
}

impl<S: PreferenceStore + std::fmt::Debug> std::fmt::Debug for ReadOnlyPreferenceStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyPreferenceStore")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<S: PreferenceStore + ?Sized> PreferenceStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        (**self).subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        (**self).unsubscribe(id)
    }
}
