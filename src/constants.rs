//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub api_base: String,
  pub suggest_url: String,
  pub placeholder_thumbnail: String,
  pub user_agent: String,

  // Persistent feed cache
  pub cache_expiry_secs: u64,
  pub cache_key_prefix: String,

  // Result caps
  pub popular_max_results: usize,
  pub category_max_results: usize,
  pub search_max_results: usize,
  pub default_max_results: usize,

  // Local lists
  pub search_history_limit: usize,
  pub suggestion_limit: usize,
  pub history_feed_size: usize,

  // HTTP
  pub request_timeout_secs: u64,
  pub default_region: String,
}

impl Constants {
  pub fn cache_expiry(&self) -> Duration {
    Duration::from_secs(self.cache_expiry_secs)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed the first test run catches it.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
