use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::warn;

use crate::constants::constants;
use crate::models::VideoRecord;
use crate::storage::Storage;

const SEARCH_HISTORY_KEY: &str = "search-history";

fn read_json<T: DeserializeOwned + Default>(storage: &dyn Storage, key: &str) -> T {
  let Some(raw) = storage.get(key) else { return T::default() };
  serde_json::from_str(&raw).unwrap_or_else(|e| {
    warn!(key, err = %e, "history: ignoring undecodable list");
    T::default()
  })
}

// --- Search history ---

/// Most-recent-first free-text queries, capped and de-duplicated ignoring case.
#[derive(Clone)]
pub struct SearchHistory {
  storage: Arc<dyn Storage>,
}

impl SearchHistory {
  pub fn new(storage: Arc<dyn Storage>) -> Self {
    Self { storage }
  }

  pub fn entries(&self) -> Vec<String> {
    read_json(self.storage.as_ref(), SEARCH_HISTORY_KEY)
  }

  /// Blank queries are ignored. The query moves to the front, replacing any
  /// earlier entry that differs only in case.
  pub fn record(&self, query: &str) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
      return Ok(());
    }
    let lowered = query.to_lowercase();
    let mut entries: Vec<String> = self.entries().into_iter().filter(|e| e.to_lowercase() != lowered).collect();
    entries.insert(0, query.to_string());
    entries.truncate(constants().search_history_limit);
    let value = serde_json::to_string(&entries).context("Failed to serialize search history")?;
    self.storage.set(SEARCH_HISTORY_KEY, value)
  }

  pub fn clear(&self) -> Result<()> {
    self.storage.remove(SEARCH_HISTORY_KEY)
  }
}

// --- Collections ---

/// User-curated video lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
  WatchLater,
  Playlist,
  History,
}

impl ListKind {
  pub const ALL: [ListKind; 3] = [ListKind::WatchLater, ListKind::Playlist, ListKind::History];

  fn key(self) -> &'static str {
    match self {
      ListKind::WatchLater => "watch-later",
      ListKind::Playlist => "playlist",
      ListKind::History => "history",
    }
  }
}

#[derive(Clone)]
pub struct Collections {
  storage: Arc<dyn Storage>,
}

impl Collections {
  pub fn new(storage: Arc<dyn Storage>) -> Self {
    Self { storage }
  }

  pub fn list(&self, kind: ListKind) -> Vec<VideoRecord> {
    read_json(self.storage.as_ref(), kind.key())
  }

  /// Prepend `record` unless a video with the same id is already listed.
  pub fn add(&self, kind: ListKind, record: VideoRecord) -> Result<bool> {
    let mut records = self.list(kind);
    if records.iter().any(|r| r.id == record.id) {
      return Ok(false);
    }
    records.insert(0, record);
    self.save(kind, &records)?;
    Ok(true)
  }

  pub fn remove(&self, kind: ListKind, id: &str) -> Result<bool> {
    let mut records = self.list(kind);
    let before = records.len();
    records.retain(|r| r.id != id);
    if records.len() == before {
      return Ok(false);
    }
    self.save(kind, &records)?;
    Ok(true)
  }

  /// Remove the video from every list. Returns how many lists contained it.
  pub fn remove_everywhere(&self, id: &str) -> Result<usize> {
    let mut removed = 0;
    for kind in ListKind::ALL {
      if self.remove(kind, id)? {
        removed += 1;
      }
    }
    Ok(removed)
  }

  fn save(&self, kind: ListKind, records: &[VideoRecord]) -> Result<()> {
    let value = serde_json::to_string(records).context("Failed to serialize list")?;
    self.storage.set(kind.key(), value)
  }
}
