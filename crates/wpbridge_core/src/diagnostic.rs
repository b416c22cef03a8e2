//! User facing problems with the configuration or the asset list.
use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Deserialize, PartialEq, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  pub message: String,

  /// The option or module the problem was found in
  pub origin: Option<String>,

  /// How the user can fix it
  pub hints: Option<Vec<String>>,

  pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match &self.origin {
      Some(origin) => write!(f, "[{origin}] {}", self.message),
      None => f.write_str(&self.message),
    }
  }
}

impl Diagnostic {
  pub fn new(message: impl Into<String>) -> Self {
    Diagnostic {
      message: message.into(),
      ..Diagnostic::default()
    }
  }

  pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
    self.origin = Some(origin.into());
    self
  }

  pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
    self.hints.get_or_insert_with(Vec::new).push(hint.into());
    self
  }

  pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    self
      .meta
      .get_or_insert_with(serde_json::Map::new)
      .insert(key.into(), value.into());
    self
  }
}

/// Every problem found in one validation pass
#[derive(Error, Default, Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
  pub fn as_slice(&self) -> &[Diagnostic] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Records a diagnostic when `failed` holds
  pub fn check(&mut self, failed: bool, diagnostic: impl FnOnce() -> Diagnostic) {
    if failed {
      self.0.push(diagnostic());
    }
  }

  /// `Ok` when nothing was recorded
  pub fn into_result(self) -> Result<(), Diagnostics> {
    if self.is_empty() {
      Ok(())
    } else {
      Err(self)
    }
  }
}

impl Display for Diagnostics {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let messages = self.0.iter().map(ToString::to_string).collect::<Vec<_>>();
    f.write_str(&messages.join("\n"))
  }
}

impl From<Diagnostic> for Diagnostics {
  fn from(diagnostic: Diagnostic) -> Self {
    Diagnostics(vec![diagnostic])
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn displays_the_origin_of_each_problem() {
    let mut diagnostics = Diagnostics::default();
    diagnostics.check(true, || Diagnostic::new("first").with_origin("options"));
    diagnostics.check(false, || Diagnostic::new("skipped"));
    diagnostics.check(true, || Diagnostic::new("second"));

    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics.to_string(), "[options] first\nsecond");
  }

  #[test]
  fn serializes_as_a_list() {
    let diagnostics = Diagnostics::from(
      Diagnostic::new("originSalt must not be empty")
        .with_hint("Set WPBRIDGE_ORIGIN_SALT")
        .with_meta("key", "originSalt"),
    );

    assert_eq!(
      serde_json::to_value(&diagnostics).unwrap(),
      serde_json::json!([{
        "message": "originSalt must not be empty",
        "origin": null,
        "hints": ["Set WPBRIDGE_ORIGIN_SALT"],
        "meta": { "key": "originSalt" },
      }])
    );
    assert!(Diagnostics::default().into_result().is_ok());
  }
}
