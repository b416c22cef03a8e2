use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde_json::json;
use tokio::sync::watch;
use wpbridge_core::resolve;
use wpbridge_core::types::AssetDescriptor;
use wpbridge_core::types::AssetKind;
use wpbridge_core::types::LoadStrategy;
use wpbridge_proxy::path::is_same_origin;
use wpbridge_proxy::path::ProxyPathRewriter;
use wpbridge_settings::rewrite::RewrittenPayload;

use crate::cache::LoadClaim;
use crate::context::PageContext;
use crate::host::AssetElement;
use crate::host::AttachOutcome;

/// Global read by the api-fetch bootstrap script when it executes
pub const API_SETTINGS_GLOBAL: &str = "wpApiSettings";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
  /// Scripts printed in `<head>`, loaded as soon as the page mounts
  Head,
  /// Scripts printed before `</body>`, loaded once the head phase completes
  Body,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Head => "head",
      Phase::Body => "body",
    }
  }

  /// The load attribute for a script of this phase
  ///
  /// Deferred head scripts would run after the body phase has started, so the head phase
  /// loads them blocking. Its loop already keeps them in order.
  pub fn strategy(&self, declared: Option<LoadStrategy>) -> LoadStrategy {
    match (self, declared) {
      (_, None) => LoadStrategy::Blocking,
      (Phase::Head, Some(LoadStrategy::Defer)) => LoadStrategy::Blocking,
      (_, Some(strategy)) => strategy,
    }
  }
}

impl Display for Phase {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoaderState {
  Idle,
  ResolvingOrigin,
  /// Index of the asset in flight, in resolved order
  Loading(usize),
  Done,
}

/// Loads the assets of one phase one at a time, in dependency order
pub struct PhaseLoader {
  phase: Phase,
  ctx: PageContext,
  instance: String,
  assets: Vec<AssetDescriptor>,
  rewriter: ProxyPathRewriter,
  started: AtomicBool,
  state: watch::Sender<LoaderState>,
}

impl PhaseLoader {
  /// Creates an idle loader, ordering `descriptors` by their dependencies
  pub fn new(
    ctx: PageContext,
    phase: Phase,
    instance: impl Into<String>,
    descriptors: &[AssetDescriptor],
  ) -> Self {
    let (state, _) = watch::channel(LoaderState::Idle);

    PhaseLoader {
      phase,
      rewriter: ctx.path_rewriter(),
      ctx,
      instance: instance.into(),
      assets: resolve(descriptors),
      started: AtomicBool::new(false),
      state,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn assets(&self) -> &[AssetDescriptor] {
    &self.assets
  }

  pub fn state(&self) -> LoaderState {
    *self.state.borrow()
  }

  pub fn subscribe(&self) -> watch::Receiver<LoaderState> {
    self.state.subscribe()
  }

  /// Runs the phase to completion, then calls `on_complete`
  ///
  /// When a gate is given the phase waits until it reads `true`. Only the first call does
  /// anything, later calls return `false` straight away.
  #[tracing::instrument(level = "debug", skip_all, fields(phase = %self.phase, instance = %self.instance))]
  pub async fn start<F>(&self, gate: Option<watch::Receiver<bool>>, on_complete: F) -> bool
  where
    F: FnOnce() + Send,
  {
    if self.started.swap(true, Ordering::SeqCst) {
      tracing::debug!("Loader already started, ignoring");
      return false;
    }

    if let Some(gate) = gate {
      wait_for_gate(gate).await;
    }

    self.run().await;
    on_complete();

    true
  }

  async fn run(&self) {
    if self.assets.is_empty() {
      self.finish();
      return;
    }

    self.state.send_replace(LoaderState::ResolvingOrigin);
    let backend_origin = self.ctx.origins.resolve(&self.instance).await;

    for (index, asset) in self.assets.iter().enumerate() {
      self.state.send_replace(LoaderState::Loading(index));
      self.load_asset(index, asset, backend_origin.as_deref()).await;
    }

    self.finish();
  }

  fn finish(&self) {
    self.state.send_replace(LoaderState::Done);
    tracing::debug!(assets = self.assets.len(), "Phase complete");

    if self.phase == Phase::Body {
      self.ctx.host.dispatch_event(&self.ctx.options.dom_ready_event);
    }
  }

  #[tracing::instrument(level = "debug", skip_all, fields(asset = %asset))]
  async fn load_asset(&self, index: usize, asset: &AssetDescriptor, backend_origin: Option<&str>) {
    let key = asset.cache_key(self.phase.as_str(), index);

    let _ticket = match self.ctx.load_cache.claim(&key) {
      LoadClaim::Claimed(ticket) => ticket,
      LoadClaim::InFlight(mut done) => {
        tracing::debug!("Loading in another loader, waiting for it");
        let _ = done.wait_for(|done| *done).await;
        return;
      }
      LoadClaim::Loaded => {
        tracing::debug!("Already loaded, skipping");
        return;
      }
    };

    let host = &self.ctx.host;
    let id = element_id(asset, &key);

    if let Some(extra_data) = asset.extra_data.as_deref() {
      if !extra_data.trim().is_empty() {
        host.inject_inline(extra_data, &format!("{id}-extra"));
      }
    }

    if let Some(before) = asset.before_code() {
      host.inject_inline(&before, &format!("{id}-before"));

      if self.is_handle(asset, &self.ctx.options.settings_handle) {
        self.apply_settings(&before);
      }
    }

    let Some(src) = asset.src.as_deref().filter(|src| !src.is_empty()) else {
      if let Some(after) = asset.after_code() {
        host.inject_inline(&after, &format!("{id}-after"));
      }
      tracing::debug!("Inline only asset done");
      return;
    };

    let target = self.load_target(src, backend_origin);

    if self.phase == Phase::Head && self.is_handle(asset, &self.ctx.options.api_fetch_handle) {
      host.assign_global(
        API_SETTINGS_GLOBAL,
        json!({
          "root": format!("{}/wp-json/", self.rewriter.proxy_base(&self.instance)),
          "versionString": "wp/v2/",
        }),
      );
    }

    let element = match asset.kind {
      AssetKind::Script => AssetElement::Script {
        id,
        src: target,
        strategy: self.phase.strategy(asset.strategy),
      },
      AssetKind::Style => AssetElement::Stylesheet {
        id,
        href: target,
        media: asset.media.clone(),
      },
    };

    tracing::debug!(url = element.url(), "Attaching");
    let attached_id = element.id().to_string();

    match host.attach(element).await {
      AttachOutcome::Loaded => {
        if let Some(after) = asset.after_code() {
          host.inject_inline(&after, &format!("{attached_id}-after"));
        }
      }
      AttachOutcome::Failed(reason) => {
        tracing::warn!(%reason, "Asset failed to load, continuing with the next one");
      }
    }
  }

  fn is_handle(&self, asset: &AssetDescriptor, handle: &str) -> bool {
    asset.handle.as_deref() == Some(handle)
  }

  /// Publishes the settings payload with its URLs pointed at the frontend and the proxy
  fn apply_settings(&self, script: &str) {
    let rewriter = self.ctx.settings_rewriter(&self.instance);

    if let Some(RewrittenPayload { variable, payload }) = rewriter.rewrite_payload(script) {
      self.ctx.host.assign_global(&variable, payload);
    }
  }

  /// Same-origin assets go through the proxy, assets on other origins load as they are
  fn load_target(&self, src: &str, backend_origin: Option<&str>) -> String {
    if let Some(origin) = backend_origin {
      if !is_same_origin(src, origin) {
        return src.to_string();
      }
    }

    match self.rewriter.to_proxy_path(src, &self.instance) {
      Ok(path) => path,
      Err(error) => {
        tracing::warn!(%error, "Unable to build a proxy path, loading the original URL");
        src.to_string()
      }
    }
  }
}

fn element_id(asset: &AssetDescriptor, key: &str) -> String {
  match asset.kind {
    AssetKind::Script => format!("{key}-js"),
    AssetKind::Style => format!("{key}-css"),
  }
}

async fn wait_for_gate(mut gate: watch::Receiver<bool>) {
  loop {
    if *gate.borrow_and_update() {
      return;
    }

    tracing::debug!("Waiting for the head phase");
    if gate.changed().await.is_err() {
      tracing::warn!("Head phase gate dropped before opening, loading anyway");
      return;
    }
  }
}
