//! Loads the scripts and styles a WordPress instance enqueues into a headless frontend.
//!
//! Asset URLs are routed through a reverse proxy mounted under
//! `/{proxy_prefix}/{instance}/`, the embedded e-commerce settings are rewritten to point at
//! the frontend, and scripts run in the order WordPress would have printed them.
use std::sync::Arc;

use tokio::sync::watch;
use wpbridge_core::types::split_by_location;
use wpbridge_core::types::AssetDescriptor;
use wpbridge_core::types::WpBridgeOptions;
use wpbridge_proxy::origin::BackendOrigins;
use wpbridge_proxy::origin::HttpOriginFetcher;

pub use wpbridge_core;
pub use wpbridge_loader;
pub use wpbridge_loader::load_body_scripts;
pub use wpbridge_loader::load_head_scripts;
pub use wpbridge_loader::DocumentHostRef;
pub use wpbridge_loader::PageContext;
pub use wpbridge_loader::PhaseLoader;
pub use wpbridge_monitoring;
pub use wpbridge_proxy;
pub use wpbridge_settings;

/// Builds the context for one page load, resolving backend origins over HTTP
pub fn page_context(host: DocumentHostRef, options: WpBridgeOptions) -> anyhow::Result<PageContext> {
  options.validate()?;

  let fetcher = Arc::new(HttpOriginFetcher::from_options(&options));
  let origins = Arc::new(BackendOrigins::from_options(fetcher, &options));

  Ok(PageContext::new(host, origins, options))
}

/// Both phases of a page load
pub struct PageLoad {
  pub head: Arc<PhaseLoader>,
  pub body: Arc<PhaseLoader>,
}

/// Splits descriptors by location and loads the head phase, then the body phase
#[tracing::instrument(level = "debug", skip_all, fields(instance = %instance))]
pub async fn load_page(ctx: &PageContext, descriptors: Vec<AssetDescriptor>, instance: &str) -> PageLoad {
  let (header, footer) = split_by_location(descriptors);
  let (head_complete, gate) = watch::channel(false);

  tracing::debug!(
    header = header.len(),
    footer = footer.len(),
    "Loading page assets"
  );

  let (head, body) = tokio::join!(
    load_head_scripts(ctx, &header, instance, move || {
      let _ = head_complete.send(true);
    }),
    load_body_scripts(ctx, &footer, instance, gate, || {}),
  );

  PageLoad { head, body }
}
