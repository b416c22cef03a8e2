use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::ParseError;
use url::Url;
use wpbridge_core::types::WpBridgeOptions;

/// Paths served by WordPress core rather than themes, plugins or uploads
static CORE_PATH: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^/wp-(?:includes|admin)/").unwrap());

/// Base used to parse root-relative and protocol-relative URLs
static PLACEHOLDER_BASE: LazyLock<Url> =
  LazyLock::new(|| Url::parse("http://placeholder.invalid").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum ProxyPathError {
  #[error("Unable to parse URL {url:?}: {source}")]
  Parse {
    url: String,
    #[source]
    source: ParseError,
  },
  #[error("Only http(s) URLs can be rewritten, got {0:?}")]
  UnsupportedScheme(String),
}

/// The proxy namespace an asset is routed through
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProxyNamespace {
  /// WordPress core files (`/wp-includes/`, `/wp-admin/`)
  InternalAssets,
  /// Everything else: themes, plugins, uploads
  ContentAssets,
}

impl ProxyNamespace {
  pub fn classify(path: &str) -> Self {
    if CORE_PATH.is_match(path) {
      ProxyNamespace::InternalAssets
    } else {
      ProxyNamespace::ContentAssets
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ProxyNamespace::InternalAssets => "wp-internal-assets",
      ProxyNamespace::ContentAssets => "wp-assets",
    }
  }

  pub fn from_segment(segment: &str) -> Option<Self> {
    match segment {
      "wp-internal-assets" => Some(ProxyNamespace::InternalAssets),
      "wp-assets" => Some(ProxyNamespace::ContentAssets),
      _ => None,
    }
  }
}

impl Display for ProxyNamespace {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A proxy path split back into its parts
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProxyTarget {
  pub instance: String,
  pub namespace: ProxyNamespace,
  /// Backend path, with its leading slash and query string
  pub original_path: String,
}

impl ProxyTarget {
  /// The backend URL this proxy path stands for
  pub fn backend_url(&self, backend_origin: &str) -> Result<Url, ProxyPathError> {
    let parse_error = |source| ProxyPathError::Parse {
      url: backend_origin.to_string(),
      source,
    };

    Url::parse(backend_origin)
      .map_err(parse_error)?
      .join(&self.original_path)
      .map_err(parse_error)
  }
}

/// Produces and parses `/{prefix}/{instance}/{namespace}/{path}` proxy paths
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProxyPathRewriter {
  prefix: String,
}

impl ProxyPathRewriter {
  pub fn new(prefix: impl Into<String>) -> Self {
    let prefix = prefix.into();
    ProxyPathRewriter {
      prefix: prefix.trim_matches('/').to_string(),
    }
  }

  pub fn from_options(options: &WpBridgeOptions) -> Self {
    ProxyPathRewriter::new(options.proxy_prefix.as_str())
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  /// The root of every proxy path for one instance
  pub fn proxy_base(&self, instance: &str) -> String {
    format!("/{}/{}", self.prefix, instance)
  }

  pub fn to_proxy_path(&self, url: &str, instance: &str) -> Result<String, ProxyPathError> {
    to_proxy_path(url, instance, &self.prefix)
  }

  pub fn parse_proxy_path(&self, path: &str) -> Option<ProxyTarget> {
    parse_proxy_path(path, &self.prefix)
  }
}

fn parse_url(url: &str) -> Result<Url, ProxyPathError> {
  let parsed = match Url::parse(url) {
    Err(ParseError::RelativeUrlWithoutBase) => PLACEHOLDER_BASE.join(url),
    result => result,
  };

  parsed.map_err(|source| ProxyPathError::Parse {
    url: url.to_string(),
    source,
  })
}

fn path_and_query(url: &Url) -> String {
  match url.query() {
    Some(query) => format!("{}?{}", url.path(), query),
    None => url.path().to_string(),
  }
}

/// Maps an absolute or root-relative asset URL onto its proxy path
///
/// Core WordPress paths go to the internal assets namespace, everything else to the content
/// assets namespace. The original path and query string are kept as they are.
pub fn to_proxy_path(url: &str, instance: &str, prefix: &str) -> Result<String, ProxyPathError> {
  let parsed = parse_url(url)?;
  let namespace = ProxyNamespace::classify(parsed.path());

  Ok(format!(
    "/{}/{}/{}{}",
    prefix.trim_matches('/'),
    instance,
    namespace,
    path_and_query(&parsed)
  ))
}

pub fn parse_proxy_path(path: &str, prefix: &str) -> Option<ProxyTarget> {
  let rest = path
    .strip_prefix('/')?
    .strip_prefix(prefix.trim_matches('/'))?
    .strip_prefix('/')?;

  let (instance, rest) = rest.split_once('/')?;
  let (namespace, original_path) = match rest.find(['/', '?']) {
    Some(index) => rest.split_at(index),
    None => (rest, ""),
  };

  if instance.is_empty() || !original_path.starts_with('/') {
    return None;
  }

  Some(ProxyTarget {
    instance: instance.to_string(),
    namespace: ProxyNamespace::from_segment(namespace)?,
    original_path: original_path.to_string(),
  })
}

/// Whether an asset is served by the backend origin
///
/// Anything that cannot be parsed is treated as same-origin so it keeps going through the
/// proxy instead of bypassing it.
pub fn is_same_origin(src: &str, backend_origin: &str) -> bool {
  let src = match Url::parse(src) {
    Ok(src) => src,
    Err(_) => return true,
  };

  match Url::parse(backend_origin) {
    Ok(backend) => src.origin() == backend.origin(),
    Err(_) => true,
  }
}

/// Swaps scheme, host and port of an absolute http(s) URL for `base`
///
/// `base` can be an origin (`https://shop.example.com`) or a root-relative path
/// (`/wp-proxy/shop`). Path, query and fragment are preserved.
pub fn replace_origin(url: &str, base: &str) -> Result<String, ProxyPathError> {
  let parsed = Url::parse(url).map_err(|source| ProxyPathError::Parse {
    url: url.to_string(),
    source,
  })?;

  if !matches!(parsed.scheme(), "http" | "https") {
    return Err(ProxyPathError::UnsupportedScheme(parsed.scheme().to_string()));
  }

  let mut rewritten = format!("{}{}", base.trim_end_matches('/'), path_and_query(&parsed));
  if let Some(fragment) = parsed.fragment() {
    rewritten.push('#');
    rewritten.push_str(fragment);
  }

  Ok(rewritten)
}
