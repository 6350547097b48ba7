//! Static seed videos, embedded from `seed.ron`.
//!
//! Seed entries are kept in the catalog's raw shape so they pass through the
//! same normalizer as live data.

use serde::Deserialize;
use std::sync::LazyLock;

use crate::models::{ItemId, RawItem, Snippet, Statistics, Thumbnail, Thumbnails, VideoRecord};
use crate::normalize::normalize_all;

#[derive(Debug, Clone, Deserialize)]
pub struct SeedVideo {
  pub id: String,
  pub title: String,
  pub channel_title: String,
  pub thumbnail: String,
  pub view_count: Option<u64>,
  pub published_at: String,
}

impl SeedVideo {
  fn to_raw(&self) -> RawItem {
    RawItem {
      id: ItemId::Flat(self.id.clone()),
      snippet: Some(Snippet {
        title: self.title.clone(),
        channel_title: self.channel_title.clone(),
        published_at: self.published_at.clone(),
        thumbnails: Some(Thumbnails { medium: Some(Thumbnail { url: self.thumbnail.clone() }) }),
      }),
      statistics: self.view_count.map(|n| Statistics { view_count: Some(n.to_string()) }),
    }
  }
}

static SEED: LazyLock<Vec<SeedVideo>> = LazyLock::new(|| {
  // Safety: embedded at compile time; a malformed file fails the first test run.
  ron::from_str(include_str!("../seed.ron")).expect("seed.ron must be valid RON (embedded at compile time)")
});

pub fn seed_videos() -> &'static [SeedVideo] {
  &SEED
}

/// Up to `limit` seed videos in raw catalog shape.
pub fn seed_items(limit: usize) -> Vec<RawItem> {
  SEED.iter().take(limit).map(SeedVideo::to_raw).collect()
}

/// Up to `limit` seed videos, normalized.
pub fn seed_records(limit: usize) -> Vec<VideoRecord> {
  normalize_all(&seed_items(limit))
}
