//! Last-known-good data for category feeds.
//!
//! `MemoryCache` holds the latest successful result per category for the
//! lifetime of the process. `FallbackChain` walks an ordered list of providers
//! (memory, persisted cache, seed data) when the network can't answer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tracing::{debug, info, warn};

use crate::models::{Category, VideoRecord};
use crate::seed::seed_records;
use crate::storage::PersistentCache;

// --- In-memory cache ---

/// Issued when a feed request starts; presented again when it wants to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
  category: Category,
  generation: u64,
}

impl Ticket {
  pub fn category(&self) -> Category {
    self.category
  }
}

#[derive(Default)]
struct Slot {
  records: Vec<VideoRecord>,
  /// Generation of the request that produced `records`.
  written: u64,
}

#[derive(Default)]
pub struct MemoryCache {
  next_generation: AtomicU64,
  slots: StdMutex<HashMap<Category, Slot>>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn begin(&self, category: Category) -> Ticket {
    let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
    Ticket { category, generation }
  }

  /// Replace the category's records wholesale. Refused (returns `false`) when a
  /// request that started later has already written.
  pub fn store(&self, ticket: Ticket, records: Vec<VideoRecord>) -> bool {
    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    let slot = slots.entry(ticket.category).or_default();
    if ticket.generation < slot.written {
      debug!(
        category = %ticket.category,
        generation = ticket.generation,
        newer = slot.written,
        "memory: dropping superseded result"
      );
      return false;
    }
    slot.records = records;
    slot.written = ticket.generation;
    true
  }

  pub fn snapshot(&self, category: Category) -> Vec<VideoRecord> {
    let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    slots.get(&category).map(|slot| slot.records.clone()).unwrap_or_default()
  }
}

// --- Providers ---

/// One tier of the fallback chain. `None` means "ask the next tier".
pub trait FallbackProvider: Send + Sync {
  fn name(&self) -> &'static str;
  fn provide(&self, category: Category) -> Option<Vec<VideoRecord>>;
}

pub struct MemoryFallback {
  memory: Arc<MemoryCache>,
}

impl MemoryFallback {
  pub fn new(memory: Arc<MemoryCache>) -> Self {
    Self { memory }
  }
}

impl FallbackProvider for MemoryFallback {
  fn name(&self) -> &'static str {
    "memory"
  }

  fn provide(&self, category: Category) -> Option<Vec<VideoRecord>> {
    Some(self.memory.snapshot(category)).filter(|records| !records.is_empty())
  }
}

/// Serves the persisted entry however old it is.
pub struct PersistedFallback {
  cache: PersistentCache,
}

impl PersistedFallback {
  pub fn new(cache: PersistentCache) -> Self {
    Self { cache }
  }
}

impl FallbackProvider for PersistedFallback {
  fn name(&self) -> &'static str {
    "persisted"
  }

  fn provide(&self, category: Category) -> Option<Vec<VideoRecord>> {
    self.cache.read(category).map(|entry| entry.data).filter(|records| !records.is_empty())
  }
}

/// Always answers: seed records truncated to the category's result cap.
pub struct SeedFallback;

impl FallbackProvider for SeedFallback {
  fn name(&self) -> &'static str {
    "seed"
  }

  fn provide(&self, category: Category) -> Option<Vec<VideoRecord>> {
    Some(seed_records(category.max_results()))
  }
}

// --- Chain ---

pub struct FallbackChain {
  providers: Vec<Box<dyn FallbackProvider>>,
}

impl FallbackChain {
  pub fn new(providers: Vec<Box<dyn FallbackProvider>>) -> Self {
    Self { providers }
  }

  /// Memory, then persisted cache, then seed data.
  pub fn standard(memory: Arc<MemoryCache>, cache: PersistentCache) -> Self {
    Self::new(vec![
      Box::new(MemoryFallback::new(memory)),
      Box::new(PersistedFallback::new(cache)),
      Box::new(SeedFallback),
    ])
  }

  pub fn resolve(&self, category: Category) -> Vec<VideoRecord> {
    for provider in &self.providers {
      if let Some(records) = provider.provide(category) {
        info!(%category, provider = provider.name(), count = records.len(), "fallback: serving");
        return records;
      }
    }
    warn!(%category, "fallback: no provider had data");
    Vec::new()
  }
}
