use anyhow::{Result, bail};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::constants::constants;
use crate::fallback::{FallbackChain, MemoryCache, Ticket};
use crate::history::{Collections, SearchHistory};
use crate::models::{Category, VideoRecord};
use crate::normalize::normalize_all;
use crate::seed::seed_records;
use crate::stats::merge_statistics;
use crate::storage::{PersistentCache, Storage, now_ms};
use crate::suggest::SuggestClient;
use crate::youtube::{CatalogClient, Params};

/// How one category is asked for.
struct FeedRequest {
  endpoint: &'static str,
  params: Params,
  /// Search-type requests need a second lookup for view counts.
  merge_statistics: bool,
}

impl FeedRequest {
  fn for_category(category: Category, region_code: &str) -> Self {
    let max_results = category.max_results();
    match category {
      Category::Popular => Self {
        endpoint: "/videos",
        params: Params::new()
          .with("part", "snippet,statistics")
          .with("chart", "mostPopular")
          .with("maxResults", max_results)
          .with("regionCode", region_code),
        merge_statistics: false,
      },
      Category::Live => Self::search(
        Params::new().with("part", "snippet").with("eventType", "live").with("type", "video").with("maxResults", max_results),
      ),
      Category::Music => Self::search(by_category_id("10", max_results)),
      Category::Gaming => Self::search(by_category_id("20", max_results)),
    }
  }

  fn search(params: Params) -> Self {
    Self { endpoint: "/search", params, merge_statistics: true }
  }
}

fn by_category_id(id: &str, max_results: usize) -> Params {
  Params::new()
    .with("part", "snippet")
    .with("videoCategoryId", id)
    .with("type", "video")
    .with("maxResults", max_results)
    .with("order", "viewCount")
}

/// The feed layer handed to UI collaborators. Every public fetch resolves to a
/// list (possibly empty) and never returns an error.
pub struct FeedService {
  client: CatalogClient,
  cache: PersistentCache,
  memory: Arc<MemoryCache>,
  fallback: FallbackChain,
  searches: SearchHistory,
  lists: Collections,
  suggest: SuggestClient,
  region_code: String,
}

impl FeedService {
  pub fn new(settings: &Settings, storage: Arc<dyn Storage>) -> Result<Self> {
    let client = CatalogClient::new(settings)?;
    let cache = PersistentCache::new(storage.clone());
    let memory = Arc::new(MemoryCache::new());
    let fallback = FallbackChain::standard(memory.clone(), cache.clone());
    let suggest = SuggestClient::new(client.http().clone(), settings.suggest_url.clone(), settings.use_mock);
    Ok(Self {
      client,
      cache,
      memory,
      fallback,
      searches: SearchHistory::new(storage.clone()),
      lists: Collections::new(storage),
      suggest,
      region_code: settings.region_code.clone(),
    })
  }

  pub fn search_history(&self) -> &SearchHistory {
    &self.searches
  }

  pub fn collections(&self) -> &Collections {
    &self.lists
  }

  pub async fn popular(&self) -> Vec<VideoRecord> {
    self.feed(Category::Popular).await
  }

  pub async fn live(&self) -> Vec<VideoRecord> {
    self.feed(Category::Live).await
  }

  pub async fn music(&self) -> Vec<VideoRecord> {
    self.feed(Category::Music).await
  }

  pub async fn gaming(&self) -> Vec<VideoRecord> {
    self.feed(Category::Gaming).await
  }

  /// Cache check, then network, then the fallback chain.
  pub async fn feed(&self, category: Category) -> Vec<VideoRecord> {
    if let Some(entry) = self.cache.read_valid(category, now_ms()) {
      debug!(%category, count = entry.data.len(), "feeds: cache hit");
      return entry.data;
    }

    let ticket = self.memory.begin(category);
    match self.fetch_fresh(category).await {
      Ok(records) => {
        info!(%category, count = records.len(), "feeds: fetched");
        self.remember(ticket, &records);
        records
      }
      Err(e) => {
        warn!(%category, err = %e, "feeds: fetch failed, falling back");
        self.fallback.resolve(category)
      }
    }
  }

  async fn fetch_fresh(&self, category: Category) -> Result<Vec<VideoRecord>> {
    let request = FeedRequest::for_category(category, &self.region_code);
    let page = self.client.fetch(request.endpoint, &request.params).await?;
    if page.items.is_empty() {
      bail!("Catalog returned no items for {}", category);
    }
    let items = if request.merge_statistics { merge_statistics(&self.client, page.items).await } else { page.items };
    Ok(normalize_all(&items))
  }

  /// Update memory, and disk only if memory accepted the write.
  fn remember(&self, ticket: Ticket, records: &[VideoRecord]) {
    if !self.memory.store(ticket, records.to_vec()) {
      return;
    }
    if let Err(e) = self.cache.write(ticket.category(), records, now_ms()) {
      warn!(category = %ticket.category(), err = %e, "feeds: failed to persist cache entry");
    }
  }

  /// Free-text search. Not cached; an empty result is a valid answer.
  pub async fn search(&self, query: &str) -> Vec<VideoRecord> {
    let query = query.trim();
    if query.is_empty() {
      return Vec::new();
    }
    if let Err(e) = self.searches.record(query) {
      warn!(err = %e, "feeds: failed to record search history");
    }

    let params = Params::new()
      .with("q", query)
      .with("part", "snippet")
      .with("maxResults", constants().search_max_results)
      .with("type", "video");
    let fetched = self.client.fetch_or_degrade("/search", &params).await;
    if fetched.page.items.is_empty() {
      info!(query, "feeds: search returned no results");
      return Vec::new();
    }
    // Seed items already carry statistics and their ids mean nothing to the catalog.
    let items =
      if fetched.degraded { fetched.page.items } else { merge_statistics(&self.client, fetched.page.items).await };
    normalize_all(&items)
  }

  pub async fn suggestions(&self, query: &str) -> Vec<String> {
    self.suggest.suggestions(query).await
  }

  /// Watch history lives behind OAuth in the catalog; serve seed data instead.
  pub async fn history_videos(&self) -> Vec<VideoRecord> {
    info!("feeds: watch history requires OAuth, serving seed data");
    seed_records(constants().history_feed_size)
  }

  /// Fetch every category concurrently. Returns how many records each produced.
  pub async fn warm(&self) -> Vec<(Category, usize)> {
    let results = join_all(Category::ALL.map(|category| self.feed(category))).await;
    Category::ALL.into_iter().zip(results.iter().map(Vec::len)).collect()
  }

  /// Look a video up in what this process or the persisted cache has seen.
  pub fn find_record(&self, id: &str) -> Option<VideoRecord> {
    Category::ALL
      .into_iter()
      .flat_map(|category| {
        let mut records = self.memory.snapshot(category);
        records.extend(self.cache.read(category).map(|entry| entry.data).unwrap_or_default());
        records
      })
      .chain(seed_records(usize::MAX))
      .find(|record| record.id == id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::CacheEntry;
  use crate::storage::MemoryStorage;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn settings(base: &str, keys: &[&str], use_mock: bool) -> Settings {
    Settings {
      api_keys: keys.iter().map(|k| k.to_string()).collect(),
      use_mock,
      api_base: base.to_string(),
      suggest_url: format!("{}/complete/search", base),
      ..Settings::default()
    }
  }

  fn service(server: &MockServer, storage: Arc<MemoryStorage>) -> FeedService {
    FeedService::new(&settings(&server.uri(), &["k1"], false), storage).unwrap()
  }

  fn video(id: &str, views: &str) -> serde_json::Value {
    json!({
      "id": id,
      "snippet": {"title": format!("Video {}", id), "channelTitle": "Chan", "publishedAt": "2024-01-01T00:00:00Z"},
      "statistics": {"viewCount": views}
    })
  }

  fn search_hit(id: &str) -> serde_json::Value {
    json!({
      "id": {"kind": "youtube#video", "videoId": id},
      "snippet": {"title": format!("Video {}", id), "channelTitle": "Chan", "publishedAt": "2024-01-01T00:00:00Z"}
    })
  }

  fn record(id: &str) -> VideoRecord {
    VideoRecord {
      id: id.to_string(),
      title: id.to_string(),
      channel_title: "c".to_string(),
      thumbnail: "t".to_string(),
      views: "N/A".to_string(),
      timestamp: String::new(),
    }
  }

  async fn fail_everything(server: &MockServer) {
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(server).await;
  }

  #[tokio::test]
  async fn popular_is_served_from_cache_within_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .and(query_param("chart", "mostPopular"))
      .and(query_param("part", "snippet,statistics"))
      .and(query_param("regionCode", "US"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [video("p1", "2500000")]})))
      .expect(1)
      .mount(&server)
      .await;

    let storage = Arc::new(MemoryStorage::new());
    let feeds = service(&server, storage.clone());
    let first = feeds.popular().await;
    let raw_after_first = storage.get("cache:popular").unwrap();
    let second = feeds.popular().await;

    assert_eq!(first, second);
    assert_eq!(first[0].views, "2.5M views");
    assert_eq!(storage.get("cache:popular").unwrap(), raw_after_first);
  }

  #[tokio::test]
  async fn cache_is_shared_by_fresh_instances() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [video("p1", "10")]})))
      .expect(1)
      .mount(&server)
      .await;

    let storage = Arc::new(MemoryStorage::new());
    let first = service(&server, storage.clone()).popular().await;
    let second = service(&server, storage).popular().await;
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn network_failure_without_cache_serves_seed() {
    let server = MockServer::start().await;
    fail_everything(&server).await;
    let feeds = service(&server, Arc::new(MemoryStorage::new()));

    for category in Category::ALL {
      assert_eq!(feeds.feed(category).await, seed_records(category.max_results()), "{}", category);
    }
  }

  #[tokio::test]
  async fn no_credentials_serves_seed() {
    let server = MockServer::start().await;
    let feeds = FeedService::new(&settings(&server.uri(), &[], false), Arc::new(MemoryStorage::new())).unwrap();
    assert_eq!(feeds.gaming().await, seed_records(Category::Gaming.max_results()));
    assert!(server.received_requests().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn music_searches_by_category_then_merges_statistics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/search"))
      .and(query_param("videoCategoryId", "10"))
      .and(query_param("order", "viewCount"))
      .and(query_param("type", "video"))
      .and(query_param("maxResults", "30"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [search_hit("m1"), search_hit("m2")]})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .and(query_param("id", "m1,m2"))
      .and(query_param("part", "statistics"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [video("m1", "500"), video("m2", "1500")]})))
      .expect(1)
      .mount(&server)
      .await;

    let records = service(&server, Arc::new(MemoryStorage::new())).music().await;
    let views: Vec<&str> = records.iter().map(|r| r.views.as_str()).collect();
    assert_eq!(views, vec!["500 views", "1.5K views"]);
  }

  #[tokio::test]
  async fn gaming_searches_by_category_then_merges_statistics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/search"))
      .and(query_param("videoCategoryId", "20"))
      .and(query_param("order", "viewCount"))
      .and(query_param("type", "video"))
      .and(query_param("maxResults", "30"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [search_hit("g1")]})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .and(query_param("id", "g1"))
      .and(query_param("part", "statistics"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [video("g1", "3200000")]})))
      .expect(1)
      .mount(&server)
      .await;

    let records = service(&server, Arc::new(MemoryStorage::new())).gaming().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].views, "3.2M views");
  }

  #[tokio::test]
  async fn live_uses_event_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/search"))
      .and(query_param("eventType", "live"))
      .and(query_param("type", "video"))
      .and(query_param("maxResults", "30"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [search_hit("l1")]})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .and(query_param("id", "l1"))
      .and(query_param("part", "statistics"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
      .expect(1)
      .mount(&server)
      .await;

    let records = service(&server, Arc::new(MemoryStorage::new())).live().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "l1");
    assert_eq!(records[0].views, "N/A");
  }

  #[tokio::test]
  async fn empty_category_page_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/search"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
      .mount(&server)
      .await;

    let records = service(&server, Arc::new(MemoryStorage::new())).gaming().await;
    assert_eq!(records, seed_records(Category::Gaming.max_results()));
  }

  #[tokio::test]
  async fn expired_cache_refetches_and_stale_entry_is_last_resort() {
    let server = MockServer::start().await;
    fail_everything(&server).await;

    let storage = Arc::new(MemoryStorage::new());
    let stale = CacheEntry { data: vec![record("stale")], timestamp: now_ms() - 3 * 60 * 60 * 1000 };
    storage.set("cache:live", serde_json::to_string(&stale).unwrap()).unwrap();

    let records = service(&server, storage).live().await;
    assert_eq!(records, vec![record("stale")]);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn memory_is_preferred_over_stale_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [video("fresh", "1")]})))
      .up_to_n_times(1)
      .mount(&server)
      .await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let storage = Arc::new(MemoryStorage::new());
    let feeds = service(&server, storage.clone());
    assert_eq!(feeds.popular().await[0].id, "fresh");

    let expired = CacheEntry { data: vec![record("disk")], timestamp: 0 };
    storage.set("cache:popular", serde_json::to_string(&expired).unwrap()).unwrap();

    assert_eq!(feeds.popular().await[0].id, "fresh");
  }

  #[tokio::test]
  async fn superseded_result_is_not_persisted() {
    let server = MockServer::start().await;
    let storage = Arc::new(MemoryStorage::new());
    let feeds = service(&server, storage.clone());

    let older = feeds.memory.begin(Category::Music);
    let newer = feeds.memory.begin(Category::Music);
    feeds.remember(newer, &[record("new")]);
    feeds.remember(older, &[record("old")]);

    assert_eq!(feeds.cache.read(Category::Music).unwrap().data, vec![record("new")]);
    assert_eq!(feeds.memory.snapshot(Category::Music), vec![record("new")]);
  }

  #[tokio::test]
  async fn search_with_no_hits_is_empty_not_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/search"))
      .and(query_param("q", "cats"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
      .expect(1)
      .mount(&server)
      .await;

    let feeds = FeedService::new(&settings(&server.uri(), &["k1"], true), Arc::new(MemoryStorage::new())).unwrap();
    assert!(feeds.search("cats").await.is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn search_merges_partial_statistics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/search"))
      .and(query_param("q", "cats"))
      .and(query_param("maxResults", "50"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [search_hit("A"), search_hit("B")]})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/videos"))
      .and(query_param("id", "A,B"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [video("B", "2500000")]})))
      .expect(1)
      .mount(&server)
      .await;

    let storage = Arc::new(MemoryStorage::new());
    let feeds = service(&server, storage.clone());
    let records = feeds.search("  cats ").await;
    assert_eq!(records[0].views, "N/A");
    assert_eq!(records[1].views, "2.5M views");
    assert_eq!(feeds.search_history().entries(), vec!["cats"]);
    // Searches are never written to the feed cache.
    assert!(Category::ALL.iter().all(|c| storage.get(&c.cache_key()).is_none()));
  }

  #[tokio::test]
  async fn search_failure_in_mock_mode_serves_seed() {
    let server = MockServer::start().await;
    fail_everything(&server).await;
    let feeds = FeedService::new(&settings(&server.uri(), &["k1"], true), Arc::new(MemoryStorage::new())).unwrap();
    let records = feeds.search("anything").await;
    assert_eq!(records, seed_records(constants().search_max_results));
  }

  #[tokio::test]
  async fn mock_search_skips_statistics_for_seed_items() {
    let server = MockServer::start().await;
    fail_everything(&server).await;
    let feeds = FeedService::new(&settings(&server.uri(), &["k1"], true), Arc::new(MemoryStorage::new())).unwrap();
    let records = feeds.search("anything").await;

    assert_eq!(records[0].views, "150.0K views");
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/search");
  }

  #[tokio::test]
  async fn search_failure_without_mock_is_empty() {
    let server = MockServer::start().await;
    fail_everything(&server).await;
    assert!(service(&server, Arc::new(MemoryStorage::new())).search("anything").await.is_empty());
  }

  #[tokio::test]
  async fn blank_search_makes_no_request() {
    let server = MockServer::start().await;
    let feeds = service(&server, Arc::new(MemoryStorage::new()));
    assert!(feeds.search("   ").await.is_empty());
    assert!(feeds.search_history().entries().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn suggestions_go_to_autocomplete_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/complete/search"))
      .and(query_param("q", "lo"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!(["lo", ["lofi"]])))
      .expect(1)
      .mount(&server)
      .await;
    assert_eq!(service(&server, Arc::new(MemoryStorage::new())).suggestions("lo").await, vec!["lofi"]);
  }

  #[tokio::test]
  async fn history_feed_is_seed() {
    let server = MockServer::start().await;
    let records = service(&server, Arc::new(MemoryStorage::new())).history_videos().await;
    assert_eq!(records, seed_records(5));
  }

  #[tokio::test]
  async fn warm_reports_every_category() {
    let server = MockServer::start().await;
    fail_everything(&server).await;
    let counts = service(&server, Arc::new(MemoryStorage::new())).warm().await;
    assert_eq!(counts.len(), 4);
    assert!(counts.iter().all(|(_, n)| *n == 6));
  }

  #[tokio::test]
  async fn find_record_checks_caches_then_seed() {
    let server = MockServer::start().await;
    let storage = Arc::new(MemoryStorage::new());
    let feeds = service(&server, storage);
    feeds.cache.write(Category::Music, &[record("cached")], 0).unwrap();
    assert_eq!(feeds.find_record("cached"), Some(record("cached")));
    assert_eq!(feeds.find_record("4").map(|r| r.title), Some("Gaming Tournament Finals".to_string()));
    assert!(feeds.find_record("nope").is_none());
  }
}
