use tracing::{debug, warn};

use crate::models::RawItem;
use crate::youtube::{CatalogClient, Params};

/// Attach view statistics to search results with one batched `/videos` lookup.
///
/// The search endpoint never returns statistics inline. If the lookup fails the
/// items come back untouched and normalize to `"N/A"` views.
pub async fn merge_statistics(client: &CatalogClient, mut items: Vec<RawItem>) -> Vec<RawItem> {
  let ids: Vec<String> = items.iter().filter_map(RawItem::video_id).map(str::to_string).collect();
  if ids.is_empty() {
    return items;
  }

  let params = Params::new().with("part", "statistics").with("id", ids.join(","));
  let stats = match client.fetch("/videos", &params).await {
    Ok(page) => page.items,
    Err(e) => {
      warn!(count = ids.len(), err = %e, "stats: lookup failed, leaving views unset");
      return items;
    }
  };

  let mut matched = 0;
  for item in &mut items {
    let Some(id) = item.video_id() else { continue };
    if let Some(found) = stats.iter().find(|s| s.video_id() == Some(id)) {
      item.statistics = found.statistics.clone();
      matched += 1;
    }
  }
  debug!(requested = items.len(), matched, "stats: merged statistics");
  items
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Settings;
  use crate::normalize::normalize_all;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(base: &str) -> CatalogClient {
    let settings = Settings { api_keys: vec!["k".to_string()], api_base: base.to_string(), ..Settings::default() };
    CatalogClient::new(&settings).unwrap()
  }

  fn search_items(ids: &[&str]) -> Vec<RawItem> {
    let items: Vec<serde_json::Value> = ids
      .iter()
      .map(|id| json!({"id": {"kind": "youtube#video", "videoId": id}, "snippet": {"title": id}}))
      .collect();
    serde_json::from_value(json!(items)).unwrap()
  }

  #[tokio::test]
  async fn empty_input_makes_no_request() {
    let server = MockServer::start().await;
    let merged = merge_statistics(&client(&server.uri()), Vec::new()).await;
    assert!(merged.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn partial_statistics_leave_unmatched_items_bare() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .and(query_param("part", "statistics"))
      .and(query_param("id", "A,B"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "B", "statistics": {"viewCount": "1500"}}]})),
      )
      .expect(1)
      .mount(&server)
      .await;

    let merged = merge_statistics(&client(&server.uri()), search_items(&["A", "B"])).await;
    let records = normalize_all(&merged);
    assert_eq!(records[0].id, "A");
    assert_eq!(records[0].views, "N/A");
    assert_eq!(records[1].id, "B");
    assert_eq!(records[1].views, "1.5K views");
  }

  #[tokio::test]
  async fn lookup_failure_returns_items_unannotated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let merged = merge_statistics(&client(&server.uri()), search_items(&["A", "B"])).await;
    assert_eq!(merged.len(), 2);
    assert!(merged.iter().all(|item| item.statistics.is_none()));
  }
}
