use std::sync::LazyLock;

use regex::Regex;
use serde_json::Map;
use serde_json::Value;
use wpbridge_core::types::WpBridgeOptions;
use wpbridge_proxy::path::replace_origin;
use wpbridge_proxy::path::ProxyPathRewriter;

use crate::codec::decode;
use crate::codec::encode;

/// Page-navigation URLs at the top level of the payload and of `wcBlocksConfig`
const PAGE_KEYS: &[&str] = &[
  "homeUrl",
  "dashboardUrl",
  "adminUrl",
  "shopUrl",
  "cartUrl",
  "checkoutUrl",
];

/// Asset URLs at the top level of the payload and of `wcBlocksConfig`
const ASSET_KEYS: &[&str] = &["pluginUrl", "wcAssetUrl"];

/// Gateway URLs the shopper is sent back to
static RETURN_URL_KEY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)(return|cancel|redirect|success|failure|fail)_?url$").unwrap()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UrlKind {
  /// Pages the shopper navigates to, served by the frontend
  Page,
  /// Files and API routes, served through the proxy
  Asset,
}

/// The variable assignment a settings script performs, with its URLs rewritten
#[derive(Clone, Debug, PartialEq)]
pub struct RewrittenPayload {
  pub variable: String,
  pub payload: Value,
}

/// Points the absolute backend URLs of a settings payload at the frontend and the proxy
#[derive(Clone, Debug)]
pub struct SettingsRewriter {
  frontend_origin: String,
  proxy_base: String,
}

impl SettingsRewriter {
  pub fn new(frontend_origin: impl Into<String>, proxy_base: impl Into<String>) -> Self {
    SettingsRewriter {
      frontend_origin: frontend_origin.into(),
      proxy_base: proxy_base.into(),
    }
  }

  pub fn from_options(options: &WpBridgeOptions, instance: &str) -> Self {
    let rewriter = ProxyPathRewriter::new(options.proxy_prefix.as_str());
    SettingsRewriter::new(
      options.frontend_origin.trim_end_matches('/'),
      rewriter.proxy_base(instance),
    )
  }

  /// Rewrites a settings script, returning it unchanged when anything goes wrong
  #[tracing::instrument(level = "debug", skip_all)]
  pub fn rewrite_script(&self, raw_script: &str) -> String {
    let result = decode(raw_script).and_then(|mut decoded| {
      let rewritten = self.rewrite_urls(&mut decoded.payload);
      tracing::debug!(rewritten, "Rewrote settings payload URLs");
      encode(raw_script, &decoded.payload)
    });

    match result {
      Ok(script) => script,
      Err(error) => {
        tracing::warn!(%error, "Leaving settings script untouched");
        raw_script.to_string()
      }
    }
  }

  /// Decodes a settings script and rewrites its URLs, without re-encoding it
  pub fn rewrite_payload(&self, raw_script: &str) -> Option<RewrittenPayload> {
    let mut decoded = match decode(raw_script) {
      Ok(decoded) => decoded,
      Err(error) => {
        tracing::warn!(%error, "Unable to decode settings payload");
        return None;
      }
    };

    let Some(declaration) = decoded.declaration.take() else {
      tracing::warn!("Settings script does not declare a variable");
      return None;
    };

    self.rewrite_urls(&mut decoded.payload);

    Some(RewrittenPayload {
      variable: declaration.name,
      payload: decoded.payload,
    })
  }

  /// Applies the URL rules in place and returns how many URLs changed
  ///
  /// Keys the rules do not know about are left alone.
  pub fn rewrite_urls(&self, payload: &mut Value) -> usize {
    let Some(root) = payload.as_object_mut() else {
      return 0;
    };

    let mut count = self.rewrite_known_keys(root);

    if let Some(pages) = root.get_mut("storePages").and_then(Value::as_object_mut) {
      for page in pages.values_mut() {
        if let Some(permalink) = page.get_mut("permalink") {
          count += self.rewrite_value(permalink, UrlKind::Page) as usize;
        }
      }
    }

    if let Some(routes) = root.get_mut("restApiRoutes") {
      count += self.rewrite_all(routes, UrlKind::Asset);
    }

    if let Some(gateways) = root.get_mut("paymentMethodData") {
      count += self.rewrite_return_urls(gateways);
    }

    if let Some(config) = root
      .get_mut("wcBlocksConfig")
      .and_then(Value::as_object_mut)
    {
      count += self.rewrite_known_keys(config);
      if let Some(routes) = config.get_mut("restApiRoutes") {
        count += self.rewrite_all(routes, UrlKind::Asset);
      }
    }

    count
  }

  fn rewrite_known_keys(&self, object: &mut Map<String, Value>) -> usize {
    let mut count = 0;

    for (keys, kind) in [(PAGE_KEYS, UrlKind::Page), (ASSET_KEYS, UrlKind::Asset)] {
      for key in keys {
        if let Some(value) = object.get_mut(*key) {
          count += self.rewrite_value(value, kind) as usize;
        }
      }
    }

    count
  }

  fn rewrite_all(&self, value: &mut Value, kind: UrlKind) -> usize {
    match value {
      Value::String(_) => self.rewrite_value(value, kind) as usize,
      Value::Array(items) => items
        .iter_mut()
        .map(|item| self.rewrite_all(item, kind))
        .sum(),
      Value::Object(entries) => entries
        .values_mut()
        .map(|item| self.rewrite_all(item, kind))
        .sum(),
      _ => 0,
    }
  }

  fn rewrite_return_urls(&self, value: &mut Value) -> usize {
    match value {
      Value::Array(items) => items
        .iter_mut()
        .map(|item| self.rewrite_return_urls(item))
        .sum(),
      Value::Object(entries) => entries
        .iter_mut()
        .map(|(key, item)| {
          if item.is_string() && RETURN_URL_KEY.is_match(key) {
            self.rewrite_value(item, UrlKind::Page) as usize
          } else {
            self.rewrite_return_urls(item)
          }
        })
        .sum(),
      _ => 0,
    }
  }

  fn rewrite_value(&self, value: &mut Value, kind: UrlKind) -> bool {
    let Value::String(url) = value else {
      return false;
    };

    if !(url.starts_with("http://") || url.starts_with("https://")) {
      return false;
    }

    let base = match kind {
      UrlKind::Page => self.frontend_origin.as_str(),
      UrlKind::Asset => self.proxy_base.as_str(),
    };

    match replace_origin(url, base) {
      Ok(rewritten) => {
        *url = rewritten;
        true
      }
      Err(error) => {
        tracing::debug!(%error, url = url.as_str(), "Skipping settings URL");
        false
      }
    }
  }
}
