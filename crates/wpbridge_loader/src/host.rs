use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use wpbridge_core::types::LoadStrategy;

/// A network element attached to the document
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AssetElement {
  Script {
    id: String,
    src: String,
    strategy: LoadStrategy,
  },
  Stylesheet {
    id: String,
    href: String,
    media: Option<String>,
  },
}

impl AssetElement {
  pub fn id(&self) -> &str {
    match self {
      AssetElement::Script { id, .. } => id,
      AssetElement::Stylesheet { id, .. } => id,
    }
  }

  pub fn url(&self) -> &str {
    match self {
      AssetElement::Script { src, .. } => src,
      AssetElement::Stylesheet { href, .. } => href,
    }
  }
}

/// The terminal event of an attached element
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttachOutcome {
  Loaded,
  Failed(String),
}

impl Display for AttachOutcome {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      AttachOutcome::Loaded => write!(f, "loaded"),
      AttachOutcome::Failed(reason) => write!(f, "failed: {reason}"),
    }
  }
}

/// The document the loaders write into
///
/// Nothing here returns an error. A document either accepts an injection or the page is
/// already broken, and element failures are reported through [`AttachOutcome`].
#[mockall::automock]
#[async_trait]
pub trait DocumentHost: Send + Sync {
  /// Appends an inline script block with the given element id
  fn inject_inline(&self, code: &str, id: &str);

  /// Sets a global variable to a JSON value
  fn assign_global(&self, name: &str, value: Value);

  /// Attaches the element and resolves once its load or error event fires
  async fn attach(&self, element: AssetElement) -> AttachOutcome;

  /// Dispatches a synthetic document event
  fn dispatch_event(&self, name: &str);
}

pub type DocumentHostRef = Arc<dyn DocumentHost>;
