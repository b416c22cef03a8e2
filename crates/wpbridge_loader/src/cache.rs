use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Outcome of asking the cache for a key
#[derive(Debug)]
pub enum LoadClaim {
  /// The caller loads the asset, the key reads as loaded once the ticket is dropped
  Claimed(LoadTicket),
  /// Another loader is loading the asset, the receiver flips to `true` when it is done
  InFlight(watch::Receiver<bool>),
  Loaded,
}

/// Held while an asset loads
#[derive(Debug)]
pub struct LoadTicket {
  done: watch::Sender<bool>,
}

impl Drop for LoadTicket {
  fn drop(&mut self) {
    self.done.send_replace(true);
  }
}

/// Cache keys of every asset loading or loaded during the lifetime of the page
///
/// Shared by both phases and by repeated runs of the same phase, so a remounted loader never
/// executes an asset twice and never runs past one that is still loading elsewhere.
#[derive(Debug, Default)]
pub struct LoadCache {
  entries: Mutex<HashMap<String, watch::Receiver<bool>>>,
}

impl LoadCache {
  pub fn claim(&self, key: &str) -> LoadClaim {
    let mut entries = self.entries.lock();

    if let Some(done) = entries.get(key) {
      if *done.borrow() {
        return LoadClaim::Loaded;
      }
      return LoadClaim::InFlight(done.clone());
    }

    let (done, receiver) = watch::channel(false);
    entries.insert(key.to_string(), receiver);

    LoadClaim::Claimed(LoadTicket { done })
  }

  /// True once the asset has finished loading
  pub fn contains(&self, key: &str) -> bool {
    self
      .entries
      .lock()
      .get(key)
      .is_some_and(|done| *done.borrow())
  }

  pub fn is_loading(&self, key: &str) -> bool {
    self
      .entries
      .lock()
      .get(key)
      .is_some_and(|done| !*done.borrow())
  }

  /// Number of loaded keys
  pub fn len(&self) -> usize {
    self
      .entries
      .lock()
      .values()
      .filter(|done| *done.borrow())
      .count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
