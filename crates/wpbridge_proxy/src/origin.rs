use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use url::Url;
use wpbridge_core::types::WpBridgeOptions;

use crate::codec::decode_origin;
use crate::path::ProxyPathRewriter;

/// Path segment of the origin endpoint, made to look like any other static file
pub const ORIGIN_ENDPOINT: &str = "assets/pixel.json";

/// Body returned by the origin endpoint
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EncodedOriginResponse {
  /// Base64 of the salted backend origin
  pub v: String,
}

/// Fetches the encoded backend origin of an instance
#[mockall::automock]
#[async_trait]
pub trait OriginFetcher: Send + Sync {
  async fn fetch_encoded(&self, instance: &str) -> anyhow::Result<String>;
}

pub type OriginFetcherRef = Arc<dyn OriginFetcher>;

/// Fetches the encoded origin from the proxy over HTTP
pub struct HttpOriginFetcher {
  client: reqwest::Client,
  frontend_origin: String,
  rewriter: ProxyPathRewriter,
}

impl HttpOriginFetcher {
  pub fn new(frontend_origin: impl Into<String>, rewriter: ProxyPathRewriter) -> Self {
    HttpOriginFetcher {
      client: reqwest::Client::new(),
      frontend_origin: frontend_origin.into(),
      rewriter,
    }
  }

  pub fn from_options(options: &WpBridgeOptions) -> Self {
    HttpOriginFetcher::new(
      options.frontend_origin.as_str(),
      ProxyPathRewriter::from_options(options),
    )
  }

  pub fn endpoint(&self, instance: &str) -> String {
    format!(
      "{}{}/{}",
      self.frontend_origin.trim_end_matches('/'),
      self.rewriter.proxy_base(instance),
      ORIGIN_ENDPOINT
    )
  }
}

#[async_trait]
impl OriginFetcher for HttpOriginFetcher {
  async fn fetch_encoded(&self, instance: &str) -> anyhow::Result<String> {
    let endpoint = self.endpoint(instance);
    let response = self
      .client
      .post(&endpoint)
      .send()
      .await
      .with_context(|| format!("Request to {endpoint} failed"))?
      .error_for_status()?;

    let body: EncodedOriginResponse = response.json().await?;
    Ok(body.v)
  }
}

/// Decoded backend origins by instance, kept for the lifetime of the page
#[derive(Debug, Default)]
pub struct BackendOriginCache {
  origins: RwLock<HashMap<String, String>>,
}

impl BackendOriginCache {
  pub fn get(&self, instance: &str) -> Option<String> {
    self.origins.read().get(instance).cloned()
  }

  pub fn insert(&self, instance: &str, origin: String) {
    self.origins.write().insert(instance.to_string(), origin);
  }

  pub fn len(&self) -> usize {
    self.origins.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.origins.read().is_empty()
  }
}

/// Resolves the backend origin of an instance, at most one successful fetch per instance
pub struct BackendOrigins {
  cache: BackendOriginCache,
  fetcher: OriginFetcherRef,
  salt: Vec<u8>,
  fetch_lock: tokio::sync::Mutex<()>,
}

impl BackendOrigins {
  pub fn new(fetcher: OriginFetcherRef, salt: impl AsRef<[u8]>) -> Self {
    BackendOrigins {
      cache: BackendOriginCache::default(),
      fetcher,
      salt: salt.as_ref().to_vec(),
      fetch_lock: tokio::sync::Mutex::new(()),
    }
  }

  pub fn from_options(fetcher: OriginFetcherRef, options: &WpBridgeOptions) -> Self {
    BackendOrigins::new(fetcher, options.origin_salt.as_bytes())
  }

  pub fn cache(&self) -> &BackendOriginCache {
    &self.cache
  }

  /// Returns the backend origin, or `None` when it cannot be resolved
  ///
  /// Callers treat `None` as "every asset is same-origin".
  #[tracing::instrument(level = "debug", skip(self))]
  pub async fn resolve(&self, instance: &str) -> Option<String> {
    if let Some(origin) = self.cache.get(instance) {
      return Some(origin);
    }

    let _guard = self.fetch_lock.lock().await;
    if let Some(origin) = self.cache.get(instance) {
      return Some(origin);
    }

    match self.fetch_origin(instance).await {
      Ok(origin) => {
        tracing::debug!(instance, "Resolved backend origin");
        self.cache.insert(instance, origin.clone());
        Some(origin)
      }
      Err(error) => {
        tracing::warn!(
          instance,
          error = %error,
          "Unable to resolve the backend origin, assets will be treated as same-origin"
        );
        None
      }
    }
  }

  async fn fetch_origin(&self, instance: &str) -> anyhow::Result<String> {
    let encoded = self.fetcher.fetch_encoded(instance).await?;
    let origin = decode_origin(&encoded, &self.salt)?;
    let origin = origin.trim().trim_end_matches('/').to_string();

    Url::parse(&origin).with_context(|| format!("Decoded origin {origin:?} is not a URL"))?;

    Ok(origin)
  }
}
