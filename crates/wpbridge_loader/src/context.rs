use std::sync::Arc;

use wpbridge_core::types::WpBridgeOptions;
use wpbridge_proxy::origin::BackendOrigins;
use wpbridge_proxy::path::ProxyPathRewriter;
use wpbridge_settings::rewrite::SettingsRewriter;

use crate::cache::LoadCache;
use crate::host::DocumentHostRef;

/// Everything a loader shares with the rest of the page
///
/// Production wiring builds one context per page load. Tests build one per case so caches
/// never leak between them.
#[derive(Clone)]
pub struct PageContext {
  pub host: DocumentHostRef,
  pub load_cache: Arc<LoadCache>,
  pub origins: Arc<BackendOrigins>,
  pub options: Arc<WpBridgeOptions>,
}

impl PageContext {
  pub fn new(host: DocumentHostRef, origins: Arc<BackendOrigins>, options: WpBridgeOptions) -> Self {
    PageContext {
      host,
      load_cache: Arc::new(LoadCache::default()),
      origins,
      options: Arc::new(options),
    }
  }

  pub fn path_rewriter(&self) -> ProxyPathRewriter {
    ProxyPathRewriter::from_options(&self.options)
  }

  pub fn settings_rewriter(&self, instance: &str) -> SettingsRewriter {
    SettingsRewriter::from_options(&self.options, instance)
  }
}
