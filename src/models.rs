use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::constants;

// --- Canonical records ---

/// A catalog video in the one shape every feed hands out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
  pub id: String,
  pub title: String,
  pub channel_title: String,
  pub thumbnail: String,
  /// Human-readable view count, or `"N/A"` when the catalog gave no statistics.
  pub views: String,
  /// Published-at timestamp exactly as the catalog returned it (ISO-8601).
  pub timestamp: String,
}

/// A persisted feed snapshot. `timestamp` is epoch milliseconds at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub data: Vec<VideoRecord>,
  pub timestamp: i64,
}

impl CacheEntry {
  /// An entry is valid while it is younger than the expiry window. Stale entries
  /// are still returned by the store; callers decide whether to use them.
  pub fn is_valid_at(&self, now_ms: i64) -> bool {
    let window = constants().cache_expiry().as_millis() as i64;
    now_ms.saturating_sub(self.timestamp) < window
  }
}

/// The independently cached category feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  Popular,
  Live,
  Music,
  Gaming,
}

impl Category {
  pub const ALL: [Category; 4] = [Category::Popular, Category::Live, Category::Music, Category::Gaming];

  pub fn name(self) -> &'static str {
    match self {
      Category::Popular => "popular",
      Category::Live => "live",
      Category::Music => "music",
      Category::Gaming => "gaming",
    }
  }

  /// Durable storage key, e.g. `cache:music`.
  pub fn cache_key(self) -> String {
    format!("{}{}", constants().cache_key_prefix, self.name())
  }

  pub fn max_results(self) -> usize {
    match self {
      Category::Popular => constants().popular_max_results,
      Category::Live | Category::Music | Category::Gaming => constants().category_max_results,
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.name())
  }
}

// --- Catalog wire types ---

/// One page of a `/search` or `/videos` response. Only `items` matters here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
  #[serde(default)]
  pub items: Vec<RawItem>,
}

impl CatalogPage {
  pub fn empty() -> Self {
    Self::default()
  }
}

/// A catalog item as returned by either the search or the videos endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
  #[serde(default)]
  pub id: ItemId,
  #[serde(default)]
  pub snippet: Option<Snippet>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub statistics: Option<Statistics>,
}

impl RawItem {
  pub fn video_id(&self) -> Option<&str> {
    self.id.video_id()
  }
}

/// Video resources carry a flat id; search results nest it as `{kind, videoId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
  Flat(String),
  Nested(SearchId),
}

impl Default for ItemId {
  fn default() -> Self {
    ItemId::Flat(String::new())
  }
}

impl ItemId {
  pub fn video_id(&self) -> Option<&str> {
    match self {
      ItemId::Nested(SearchId { video_id: Some(id), .. }) if !id.is_empty() => Some(id.as_str()),
      ItemId::Flat(id) if !id.is_empty() => Some(id.as_str()),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchId {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub channel_title: String,
  #[serde(default)]
  pub published_at: String,
  #[serde(default)]
  pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnails {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub medium: Option<Thumbnail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
  #[serde(default)]
  pub url: String,
}

/// Engagement statistics. The catalog encodes counts as decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub view_count: Option<String>,
}

impl Statistics {
  pub fn views(&self) -> Option<u64> {
    self.view_count.as_deref().and_then(|v| v.trim().parse().ok())
  }
}

/// Error body the catalog sends with non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorEnvelope {
  #[serde(default)]
  pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiError {
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorDetail {
  #[serde(default)]
  pub reason: String,
}

impl ApiErrorEnvelope {
  pub fn reasons(&self) -> impl Iterator<Item = &str> {
    self.error.iter().flat_map(|e| e.errors.iter().map(|d| d.reason.as_str()))
  }

  pub fn message(&self) -> &str {
    self.error.as_ref().map_or("API request failed", |e| e.message.as_str())
  }
}
