use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tracing::{debug, warn};

use crate::models::{CacheEntry, Category, VideoRecord};

/// Durable string key/value storage with browser local-storage semantics.
pub trait Storage: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, value: String) -> Result<()>;
  fn remove(&self, key: &str) -> Result<()>;
}

// --- In-memory ---

#[derive(Default)]
pub struct MemoryStorage {
  entries: StdMutex<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Storage for MemoryStorage {
  fn get(&self, key: &str) -> Option<String> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
  }

  fn set(&self, key: &str, value: String) -> Result<()> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_string(), value);
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    Ok(())
  }
}

// --- File-backed ---

/// All keys live in one JSON object file, rewritten atomically on each change.
/// Writers re-read the file first so keys set by other processes survive.
pub struct FileStorage {
  path: PathBuf,
  entries: StdMutex<HashMap<String, String>>,
}

impl FileStorage {
  /// Open (or start) the store at `path`. A missing or unreadable file starts empty.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let entries = load(&path)?;
    Ok(Self { path, entries: StdMutex::new(entries) })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Apply one change on top of the current file contents and write it back.
  fn update(&self, change: impl FnOnce(&mut HashMap<String, String>) -> bool) -> Result<()> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    let mut latest = load(&self.path)?;
    if change(&mut latest) {
      self.flush(&latest)?;
    }
    *entries = latest;
    Ok(())
  }

  fn flush(&self, entries: &HashMap<String, String>) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(entries).context("Failed to serialize store")?;
    // Write to temp file first, then atomic rename
    let temp_path = self.path.with_extension("json.tmp");
    std::fs::write(&temp_path, serialized).with_context(|| format!("Failed to write {}", temp_path.display()))?;
    std::fs::rename(&temp_path, &self.path).with_context(|| format!("Failed to replace {}", self.path.display()))
  }
}

fn load(path: &Path) -> Result<HashMap<String, String>> {
  match std::fs::read_to_string(path) {
    Ok(content) => Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
      warn!(path = %path.display(), err = %e, "storage: corrupt store file, starting fresh");
      HashMap::new()
    })),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      debug!(path = %path.display(), "storage: no store file yet");
      Ok(HashMap::new())
    }
    Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to read {}", path.display()))),
  }
}

impl Storage for FileStorage {
  fn get(&self, key: &str) -> Option<String> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
  }

  fn set(&self, key: &str, value: String) -> Result<()> {
    self.update(|entries| {
      entries.insert(key.to_string(), value);
      true
    })
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.update(|entries| entries.remove(key).is_some())
  }
}

// --- Feed cache ---

/// Timestamped feed snapshots keyed `cache:<category>`. Entries are only ever
/// superseded, never evicted.
#[derive(Clone)]
pub struct PersistentCache {
  storage: Arc<dyn Storage>,
}

impl PersistentCache {
  pub fn new(storage: Arc<dyn Storage>) -> Self {
    Self { storage }
  }

  /// The stored entry regardless of age. Undecodable entries read as absent.
  pub fn read(&self, category: Category) -> Option<CacheEntry> {
    let raw = self.storage.get(&category.cache_key())?;
    match serde_json::from_str(&raw) {
      Ok(entry) => Some(entry),
      Err(e) => {
        warn!(%category, err = %e, "cache: ignoring undecodable entry");
        None
      }
    }
  }

  /// The stored entry only if it is still inside the expiry window.
  pub fn read_valid(&self, category: Category, now_ms: i64) -> Option<CacheEntry> {
    self.read(category).filter(|entry| entry.is_valid_at(now_ms))
  }

  pub fn write(&self, category: Category, records: &[VideoRecord], now_ms: i64) -> Result<()> {
    let entry = CacheEntry { data: records.to_vec(), timestamp: now_ms };
    let value = serde_json::to_string(&entry).context("Failed to serialize cache entry")?;
    self.storage.set(&category.cache_key(), value)
  }
}

pub fn now_ms() -> i64 {
  chrono::Utc::now().timestamp_millis()
}
