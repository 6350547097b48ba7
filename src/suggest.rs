use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::constants::constants;
use crate::seed::seed_videos;

/// Search-as-you-type suggestions from the public autocomplete endpoint.
#[derive(Clone)]
pub struct SuggestClient {
  http: Client,
  url: String,
  use_mock: bool,
}

impl SuggestClient {
  pub fn new(http: Client, url: impl Into<String>, use_mock: bool) -> Self {
    Self { http, url: url.into(), use_mock }
  }

  /// Never fails; any error yields an empty list.
  pub async fn suggestions(&self, query: &str) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
      return Vec::new();
    }
    if self.use_mock {
      return mock_suggestions(query);
    }
    match self.fetch(query).await {
      Ok(suggestions) => suggestions,
      Err(e) => {
        warn!(err = %e, "suggest: request failed");
        Vec::new()
      }
    }
  }

  async fn fetch(&self, query: &str) -> Result<Vec<String>> {
    let body: Value = self
      .http
      .get(&self.url)
      .query(&[("client", "firefox"), ("ds", "yt"), ("q", query)])
      .send()
      .await
      .context("Suggestion request failed")?
      .error_for_status()
      .context("Suggestion endpoint returned an error")?
      .json()
      .await
      .context("Failed to decode suggestions")?;
    Ok(parse_suggestions(&body))
  }
}

/// The endpoint answers `[query, [suggestion, ...], ...]`.
fn parse_suggestions(body: &Value) -> Vec<String> {
  body
    .get(1)
    .and_then(Value::as_array)
    .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
    .unwrap_or_default()
}

/// Seed titles containing the query, ignoring case.
fn mock_suggestions(query: &str) -> Vec<String> {
  let needle = query.to_lowercase();
  seed_videos()
    .iter()
    .filter(|v| v.title.to_lowercase().contains(&needle))
    .map(|v| v.title.clone())
    .take(constants().suggestion_limit)
    .collect()
}
