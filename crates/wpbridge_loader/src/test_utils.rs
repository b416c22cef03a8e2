use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use wpbridge_core::types::WpBridgeOptions;
use wpbridge_proxy::codec::encode;
use wpbridge_proxy::origin::BackendOrigins;
use wpbridge_proxy::origin::MockOriginFetcher;

use crate::context::PageContext;
use crate::host::AssetElement;
use crate::host::AttachOutcome;
use crate::host::DocumentHost;

pub const BACKEND_ORIGIN: &str = "https://wp.example.com";

#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
  Inline { id: String, code: String },
  Global { name: String, value: Value },
  Attach(AssetElement),
  Settled { id: String, outcome: AttachOutcome },
  Event(String),
}

/// Records everything the loaders do to the document
///
/// Elements load immediately unless they were marked as failing or delayed.
#[derive(Default)]
pub struct RecordingHost {
  events: Mutex<Vec<HostEvent>>,
  failing: Mutex<HashSet<String>>,
  delayed: Mutex<HashMap<String, oneshot::Receiver<AttachOutcome>>>,
}

impl RecordingHost {
  pub fn fail(&self, id: &str) {
    self.failing.lock().insert(id.to_string());
  }

  /// Holds the element back until the returned sender fires
  pub fn delay(&self, id: &str) -> oneshot::Sender<AttachOutcome> {
    let (tx, rx) = oneshot::channel();
    self.delayed.lock().insert(id.to_string(), rx);
    tx
  }

  pub fn events(&self) -> Vec<HostEvent> {
    self.events.lock().clone()
  }

  pub fn attached(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|event| match event {
        HostEvent::Attach(element) => Some(element.id().to_string()),
        _ => None,
      })
      .collect()
  }

  pub fn attached_elements(&self) -> Vec<AssetElement> {
    self
      .events()
      .into_iter()
      .filter_map(|event| match event {
        HostEvent::Attach(element) => Some(element),
        _ => None,
      })
      .collect()
  }

  fn record(&self, event: HostEvent) {
    self.events.lock().push(event);
  }
}

#[async_trait]
impl DocumentHost for RecordingHost {
  fn inject_inline(&self, code: &str, id: &str) {
    self.record(HostEvent::Inline {
      id: id.to_string(),
      code: code.to_string(),
    });
  }

  fn assign_global(&self, name: &str, value: Value) {
    self.record(HostEvent::Global {
      name: name.to_string(),
      value,
    });
  }

  async fn attach(&self, element: AssetElement) -> AttachOutcome {
    let id = element.id().to_string();
    self.record(HostEvent::Attach(element));

    let delayed = self.delayed.lock().remove(&id);
    let outcome = match delayed {
      Some(rx) => rx
        .await
        .unwrap_or_else(|_| AttachOutcome::Failed(String::from("dropped"))),
      None if self.failing.lock().contains(&id) => AttachOutcome::Failed(String::from("404")),
      None => AttachOutcome::Loaded,
    };

    self.record(HostEvent::Settled {
      id,
      outcome: outcome.clone(),
    });
    outcome
  }

  fn dispatch_event(&self, name: &str) {
    self.record(HostEvent::Event(name.to_string()));
  }
}

/// Origins that always resolve to [`BACKEND_ORIGIN`]
pub fn backend_origins(options: &WpBridgeOptions) -> Arc<BackendOrigins> {
  let encoded = encode(BACKEND_ORIGIN.as_bytes(), options.origin_salt.as_bytes()).unwrap();
  let mut fetcher = MockOriginFetcher::new();
  fetcher
    .expect_fetch_encoded()
    .returning(move |_| Ok(encoded.clone()));

  Arc::new(BackendOrigins::from_options(Arc::new(fetcher), options))
}

/// Origins whose lookup always fails
pub fn unknown_origins(options: &WpBridgeOptions) -> Arc<BackendOrigins> {
  let mut fetcher = MockOriginFetcher::new();
  fetcher
    .expect_fetch_encoded()
    .returning(|_| Err(anyhow::anyhow!("connection refused")));

  Arc::new(BackendOrigins::from_options(Arc::new(fetcher), options))
}

pub fn page(host: Arc<RecordingHost>) -> PageContext {
  let options = WpBridgeOptions {
    frontend_origin: String::from("https://shop.example.com"),
    ..WpBridgeOptions::default()
  };

  PageContext::new(host, backend_origins(&options), options)
}

/// Yields until `condition` holds, so spawned loaders can make progress
pub async fn settle(condition: impl Fn() -> bool) {
  for _ in 0..1_000 {
    if condition() {
      return;
    }
    tokio::task::yield_now().await;
  }

  panic!("Condition never held");
}
