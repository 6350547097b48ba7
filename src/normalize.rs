use crate::constants::constants;
use crate::models::{RawItem, VideoRecord};

/// Render a view count the way feed cards show it.
///
/// `>= 1M` -> `"2.5M views"`, `>= 1K` -> `"1.5K views"`, otherwise `"500 views"`.
/// No statistics at all -> `"N/A"`.
pub fn format_views(count: Option<u64>) -> String {
  match count {
    None => "N/A".to_string(),
    Some(n) if n >= 1_000_000 => format!("{:.1}M views", n as f64 / 1_000_000.0),
    Some(n) if n >= 1_000 => format!("{:.1}K views", n as f64 / 1_000.0),
    Some(n) => format!("{} views", n),
  }
}

/// Convert either a search result or a video resource into a `VideoRecord`.
/// Missing pieces are filled with defaults; this never fails.
pub fn normalize(item: &RawItem) -> VideoRecord {
  let snippet = item.snippet.as_ref();
  let thumbnail = snippet
    .and_then(|s| s.thumbnails.as_ref())
    .and_then(|t| t.medium.as_ref())
    .map(|m| m.url.trim())
    .filter(|url| !url.is_empty())
    .map_or_else(|| constants().placeholder_thumbnail.clone(), str::to_string);

  VideoRecord {
    id: item.video_id().unwrap_or_default().to_string(),
    title: snippet.map(|s| s.title.clone()).unwrap_or_default(),
    channel_title: snippet.map(|s| s.channel_title.clone()).unwrap_or_default(),
    thumbnail,
    views: format_views(item.statistics.as_ref().and_then(|s| s.views())),
    timestamp: snippet.map(|s| s.published_at.clone()).unwrap_or_default(),
  }
}

pub fn normalize_all(items: &[RawItem]) -> Vec<VideoRecord> {
  items.iter().map(normalize).collect()
}
