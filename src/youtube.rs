use anyhow::{Context, Result, anyhow, bail};
use reqwest::{Client, StatusCode};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::constants::constants;
use crate::models::{ApiErrorEnvelope, CatalogPage};
use crate::seed::seed_items;

/// Error reasons on a 403 that mean "this credential is out of quota".
const QUOTA_REASONS: [&str; 3] = ["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"];

/// Query parameters for a catalog request, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Params(Vec<(String, String)>);

impl Params {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, key: &str, value: impl ToString) -> Self {
    self.0.retain(|(k, _)| k != key);
    self.0.push((key.to_string(), value.to_string()));
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
  }

  fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

/// Outcome of one request made with one credential.
enum Attempt {
  Success(CatalogPage),
  /// 403 with a quota reason; the next credential may still work.
  QuotaExhausted,
  /// Anything else. Rotation stops here.
  Fatal(anyhow::Error),
}

/// A page from `fetch_or_degrade`. `degraded` pages did not come from the catalog.
pub struct Fetched {
  pub page: CatalogPage,
  pub degraded: bool,
}

/// Client for the video catalog REST API that rotates through credentials
/// when one runs out of quota.
#[derive(Clone)]
pub struct CatalogClient {
  http: Client,
  api_base: String,
  api_keys: Vec<String>,
  use_mock: bool,
}

impl CatalogClient {
  pub fn new(settings: &Settings) -> Result<Self> {
    let c = constants();
    let http = Client::builder()
      .user_agent(format!("{}/{}", c.user_agent, env!("CARGO_PKG_VERSION")))
      .timeout(c.request_timeout())
      .build()
      .context("Failed to build HTTP client")?;
    Ok(Self {
      http,
      api_base: settings.api_base.trim_end_matches('/').to_string(),
      api_keys: settings.api_keys.clone(),
      use_mock: settings.use_mock,
    })
  }

  pub fn http(&self) -> &Client {
    &self.http
  }

  /// Request `endpoint` with each credential in order until one succeeds.
  ///
  /// A quota-exceeded 403 moves on to the next credential. Any other HTTP
  /// error or transport failure aborts the whole rotation.
  pub async fn fetch(&self, endpoint: &str, params: &Params) -> Result<CatalogPage> {
    if self.api_keys.is_empty() {
      bail!("No catalog credentials configured");
    }
    let url = format!("{}{}", self.api_base, endpoint);

    for (idx, key) in self.api_keys.iter().enumerate() {
      match self.attempt(&url, params, key).await {
        Attempt::Success(page) => {
          debug!(endpoint, credential = idx, items = page.items.len(), "catalog: request succeeded");
          return Ok(page);
        }
        Attempt::QuotaExhausted => {
          warn!(endpoint, credential = idx, "catalog: quota exceeded, rotating credential");
        }
        Attempt::Fatal(e) => {
          error!(endpoint, credential = idx, err = %e, "catalog: request failed, aborting rotation");
          return Err(e);
        }
      }
    }
    Err(anyhow!("All {} catalog credentials are out of quota", self.api_keys.len()))
  }

  /// `fetch`, but never fails: an error yields an empty page, or seed items
  /// sized to `maxResults` when mock mode is on.
  pub async fn fetch_or_degrade(&self, endpoint: &str, params: &Params) -> Fetched {
    match self.fetch(endpoint, params).await {
      Ok(page) => Fetched { page, degraded: false },
      Err(e) => {
        warn!(endpoint, err = %e, "catalog: fetch failed");
        if self.use_mock {
          let limit =
            params.get("maxResults").and_then(|v| v.parse().ok()).unwrap_or(constants().default_max_results);
          info!(endpoint, limit, "catalog: falling back to mock data");
          Fetched { page: CatalogPage { items: seed_items(limit) }, degraded: true }
        } else {
          Fetched { page: CatalogPage::empty(), degraded: true }
        }
      }
    }
  }

  async fn attempt(&self, url: &str, params: &Params, key: &str) -> Attempt {
    let mut query: Vec<(&str, &str)> = params.pairs().collect();
    if params.get("part").is_none() {
      query.push(("part", "snippet"));
    }
    query.push(("key", key));

    let response = match self.http.get(url).query(&query).send().await {
      Ok(response) => response,
      Err(e) => return Attempt::Fatal(anyhow::Error::new(e).context("Catalog request failed")),
    };

    let status = response.status();
    if status.is_success() {
      return match response.json::<CatalogPage>().await {
        Ok(page) => Attempt::Success(page),
        Err(e) => Attempt::Fatal(anyhow::Error::new(e).context("Failed to decode catalog response")),
      };
    }

    let body: ApiErrorEnvelope = response.json().await.unwrap_or_default();
    if status == StatusCode::FORBIDDEN && body.reasons().any(|r| QUOTA_REASONS.iter().any(|q| *q == r)) {
      return Attempt::QuotaExhausted;
    }
    Attempt::Fatal(anyhow!("Catalog returned {}: {}", status, body.message()))
  }
}
