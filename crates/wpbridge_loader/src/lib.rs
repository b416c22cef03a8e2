//! Loads the scripts and styles of a WordPress page into a document the way WordPress would
//! have printed them: dependencies first, one at a time, head before body.
use std::sync::Arc;

use tokio::sync::watch;
use wpbridge_core::types::AssetDescriptor;

pub mod cache;
pub mod context;
pub mod host;
pub mod phase;
#[cfg(test)]
mod test_utils;

pub use self::cache::LoadCache;
pub use self::cache::LoadClaim;
pub use self::cache::LoadTicket;
pub use self::context::PageContext;
pub use self::host::*;
pub use self::phase::*;

/// Loads the head phase immediately
pub async fn load_head_scripts<F>(
  ctx: &PageContext,
  descriptors: &[AssetDescriptor],
  instance: &str,
  on_complete: F,
) -> Arc<PhaseLoader>
where
  F: FnOnce() + Send,
{
  let loader = Arc::new(PhaseLoader::new(
    ctx.clone(),
    Phase::Head,
    instance,
    descriptors,
  ));
  loader.start(None, on_complete).await;
  loader
}

/// Loads the body phase once `head_complete` reads `true`
pub async fn load_body_scripts<F>(
  ctx: &PageContext,
  descriptors: &[AssetDescriptor],
  instance: &str,
  head_complete: watch::Receiver<bool>,
  on_complete: F,
) -> Arc<PhaseLoader>
where
  F: FnOnce() + Send,
{
  let loader = Arc::new(PhaseLoader::new(
    ctx.clone(),
    Phase::Body,
    instance,
    descriptors,
  ));
  loader.start(Some(head_complete), on_complete).await;
  loader
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use wpbridge_core::types::AssetLocation;

  use super::*;
  use crate::test_utils::*;

  #[tokio::test]
  async fn head_completion_opens_the_body_phase() {
    let host = Arc::new(RecordingHost::default());
    let ctx = page(host.clone());
    let (head_complete, gate) = watch::channel(false);

    let head = [AssetDescriptor::new("jquery")
      .with_src(format!("{BACKEND_ORIGIN}/wp-includes/js/jquery/jquery.min.js"))];
    let body = [AssetDescriptor::new("cart")
      .with_src(format!("{BACKEND_ORIGIN}/wp-content/plugins/shop/cart.js"))
      .with_dependencies(["jquery"])
      .with_location(AssetLocation::Footer)];

    let (head_loader, body_loader) = tokio::join!(
      load_head_scripts(&ctx, &head, "shop", move || {
        let _ = head_complete.send(true);
      }),
      load_body_scripts(&ctx, &body, "shop", gate, || {}),
    );

    assert_eq!(head_loader.state(), LoaderState::Done);
    assert_eq!(body_loader.state(), LoaderState::Done);
    assert_eq!(host.attached(), vec!["jquery-js", "cart-js"]);
  }
}
