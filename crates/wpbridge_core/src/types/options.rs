use anyhow::anyhow;
use serde::Deserialize;
use serde::Serialize;

use crate::diagnostic::Diagnostic;
use crate::diagnostic::Diagnostics;
use crate::from_env::optional_var;
use crate::from_env::FromEnvError;

/// The options shared by the proxy rewriter, the settings transform and the loaders
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WpBridgeOptions {
  /// First path segment of every proxy path, without slashes
  pub proxy_prefix: String,

  /// Shared key used to obfuscate the backend origin in transit
  ///
  /// This is not a secret. The same value is configured on the proxy side.
  pub origin_salt: String,

  /// Origin the frontend is served from, used for page-navigation URLs and origin lookups
  pub frontend_origin: String,

  /// Handle of the script whose inline payload carries the e-commerce settings blob
  pub settings_handle: String,

  /// Handle of the WordPress api-fetch bootstrap script
  pub api_fetch_handle: String,

  /// Event dispatched once the body phase completes
  pub dom_ready_event: String,
}

impl Default for WpBridgeOptions {
  fn default() -> Self {
    WpBridgeOptions {
      proxy_prefix: String::from("wp-proxy"),
      origin_salt: String::from("wpbridge"),
      frontend_origin: String::from("http://localhost:3000"),
      settings_handle: String::from("wc-settings"),
      api_fetch_handle: String::from("wp-api-fetch"),
      dom_ready_event: String::from("DOMContentLoaded"),
    }
  }
}

impl WpBridgeOptions {
  pub fn from_json(json: &str) -> anyhow::Result<Self> {
    let options: WpBridgeOptions = serde_json::from_str(json)?;
    options.validate()?;
    Ok(options)
  }

  /// Reads `WPBRIDGE_*` variables on top of the defaults
  pub fn from_env() -> Result<Self, FromEnvError> {
    let mut options = WpBridgeOptions::default();

    let vars: [(&str, &mut String); 6] = [
      ("WPBRIDGE_PROXY_PREFIX", &mut options.proxy_prefix),
      ("WPBRIDGE_ORIGIN_SALT", &mut options.origin_salt),
      ("WPBRIDGE_FRONTEND_ORIGIN", &mut options.frontend_origin),
      ("WPBRIDGE_SETTINGS_HANDLE", &mut options.settings_handle),
      ("WPBRIDGE_API_FETCH_HANDLE", &mut options.api_fetch_handle),
      ("WPBRIDGE_DOM_READY_EVENT", &mut options.dom_ready_event),
    ];

    for (name, field) in vars {
      if let Some(value) = optional_var(name) {
        *field = value;
      }
    }

    options
      .validate()
      .map_err(|err| FromEnvError::InvalidKey(String::from("WPBRIDGE_*"), anyhow!(err)))?;

    Ok(options)
  }

  pub fn validate(&self) -> Result<(), Diagnostics> {
    let mut diagnostics = Diagnostics::default();

    diagnostics.check(self.origin_salt.is_empty(), || {
      Diagnostic::new("originSalt must not be empty")
        .with_origin("originSalt")
        .with_hint("Use the same salt that is configured on the proxy")
    });

    let prefix = self.proxy_prefix.as_str();
    diagnostics.check(
      prefix.is_empty() || prefix.starts_with('/') || prefix.ends_with('/'),
      || {
        Diagnostic::new(format!(
          "must be a non-empty path without leading or trailing slashes, got {prefix:?}"
        ))
        .with_origin("proxyPrefix")
      },
    );

    diagnostics.into_result()
  }
}
