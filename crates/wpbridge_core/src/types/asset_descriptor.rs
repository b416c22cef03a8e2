use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

/// The loading phase that owns a descriptor
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetLocation {
  #[default]
  #[serde(alias = "header", alias = "head")]
  Header,
  #[serde(alias = "footer", alias = "body")]
  Footer,
}

/// The load attribute applied to a script element
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStrategy {
  #[default]
  #[serde(alias = "blocking")]
  Blocking,
  #[serde(alias = "async")]
  Async,
  #[serde(alias = "defer")]
  Defer,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
  #[default]
  #[serde(alias = "script")]
  Script,
  #[serde(alias = "style")]
  Style,
}

/// An enqueued WordPress script or stylesheet
///
/// Scripts and stylesheets share this shape. Fields that only make sense for one of them
/// (`strategy` for scripts, `media` for styles) are optional and ignored by the other.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetDescriptor {
  /// Identifier of the asset, unique within one resolution pass
  ///
  /// Anonymous inline assets have no handle. They are never dependency targets.
  pub handle: Option<String>,

  /// Absolute URL or path of the network resource
  pub src: Option<String>,

  /// Handles that must load before this asset
  ///
  /// References to handles missing from the current batch are ignored.
  #[serde(deserialize_with = "nullable_vec")]
  pub dependencies: Vec<String>,

  /// Inline code run immediately before the asset loads
  #[serde(deserialize_with = "fragments")]
  pub before: Vec<String>,

  /// Inline code run immediately after the asset loads
  #[serde(deserialize_with = "fragments")]
  pub after: Vec<String>,

  /// Opaque inline payload injected alongside the asset (localized data)
  pub extra_data: Option<String>,

  #[serde(deserialize_with = "nullable_default")]
  pub location: AssetLocation,

  pub strategy: Option<LoadStrategy>,

  #[serde(deserialize_with = "nullable_default")]
  pub kind: AssetKind,

  pub media: Option<String>,
}

impl AssetDescriptor {
  pub fn new(handle: impl Into<String>) -> Self {
    AssetDescriptor {
      handle: Some(handle.into()),
      ..AssetDescriptor::default()
    }
  }

  pub fn with_src(mut self, src: impl Into<String>) -> Self {
    self.src = Some(src.into());
    self
  }

  pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.dependencies = dependencies.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_location(mut self, location: AssetLocation) -> Self {
    self.location = location;
    self
  }

  /// The key used to deduplicate loads: handle, else src, else a synthetic ordinal
  pub fn cache_key(&self, phase: &str, ordinal: usize) -> String {
    if let Some(handle) = self.handle.as_deref().filter(|h| !h.is_empty()) {
      return handle.to_string();
    }

    if let Some(src) = self.src.as_deref().filter(|s| !s.is_empty()) {
      return src.to_string();
    }

    format!("{phase}:{ordinal}")
  }

  pub fn before_code(&self) -> Option<String> {
    join_fragments(&self.before)
  }

  pub fn after_code(&self) -> Option<String> {
    join_fragments(&self.after)
  }
}

impl Display for AssetDescriptor {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match (&self.handle, &self.src) {
      (Some(handle), _) => write!(f, "{handle}"),
      (None, Some(src)) => write!(f, "{src}"),
      (None, None) => write!(f, "<anonymous>"),
    }
  }
}

fn join_fragments(fragments: &[String]) -> Option<String> {
  let code = fragments
    .iter()
    .filter(|fragment| !fragment.trim().is_empty())
    .map(String::as_str)
    .collect::<Vec<_>>()
    .join("\n");

  if code.is_empty() {
    None
  } else {
    Some(code)
  }
}

/// Splits descriptors into header and footer lists, keeping the original order of each
pub fn split_by_location(
  descriptors: impl IntoIterator<Item = AssetDescriptor>,
) -> (Vec<AssetDescriptor>, Vec<AssetDescriptor>) {
  descriptors
    .into_iter()
    .partition(|descriptor| descriptor.location == AssetLocation::Header)
}

fn nullable_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let values = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
  Ok(values.into_iter().flatten().collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Fragments {
  One(String),
  Many(Vec<Option<String>>),
}

fn fragments<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(match Option::<Fragments>::deserialize(deserializer)? {
    None => Vec::new(),
    Some(Fragments::One(fragment)) => vec![fragment],
    Some(Fragments::Many(fragments)) => fragments.into_iter().flatten().collect(),
  })
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn deserializes_graphql_shape() {
    let descriptor: AssetDescriptor = serde_json::from_str(
      r#"{
        "handle": "wp-api-fetch",
        "src": "https://wp.example.com/wp-includes/js/dist/api-fetch.min.js",
        "dependencies": ["wp-polyfill", null, "wp-url"],
        "before": null,
        "after": ["wp.apiFetch.use( a );", "wp.apiFetch.use( b );"],
        "extraData": "var x = 1;",
        "location": "FOOTER",
        "strategy": "DEFER"
      }"#,
    )
    .unwrap();

    assert_eq!(
      descriptor,
      AssetDescriptor {
        handle: Some(String::from("wp-api-fetch")),
        src: Some(String::from(
          "https://wp.example.com/wp-includes/js/dist/api-fetch.min.js"
        )),
        dependencies: vec![String::from("wp-polyfill"), String::from("wp-url")],
        before: vec![],
        after: vec![
          String::from("wp.apiFetch.use( a );"),
          String::from("wp.apiFetch.use( b );"),
        ],
        extra_data: Some(String::from("var x = 1;")),
        location: AssetLocation::Footer,
        strategy: Some(LoadStrategy::Defer),
        kind: AssetKind::Script,
        media: None,
      }
    );
  }

  #[test]
  fn before_accepts_a_single_string() {
    let descriptor: AssetDescriptor =
      serde_json::from_str(r#"{ "handle": "a", "before": "var a;", "location": null }"#).unwrap();

    assert_eq!(descriptor.before, vec![String::from("var a;")]);
    assert_eq!(descriptor.location, AssetLocation::Header);
  }

  #[test]
  fn kind_accepts_both_spellings() {
    let upper: AssetDescriptor =
      serde_json::from_str(r#"{ "handle": "print", "kind": "STYLE", "media": "print" }"#).unwrap();
    let lower: AssetDescriptor =
      serde_json::from_str(r#"{ "handle": "print", "kind": "style", "media": "print" }"#).unwrap();

    assert_eq!(upper.kind, AssetKind::Style);
    assert_eq!(lower, upper);
    assert_eq!(serde_json::to_value(AssetKind::Script).unwrap(), "SCRIPT");
  }

  #[test]
  fn cache_key_falls_back_to_src_then_ordinal() {
    let with_handle = AssetDescriptor::new("jquery").with_src("/jquery.js");
    let with_src = AssetDescriptor::default().with_src("/anon.js");
    let anonymous = AssetDescriptor::default();

    assert_eq!(with_handle.cache_key("head", 0), "jquery");
    assert_eq!(with_src.cache_key("head", 1), "/anon.js");
    assert_eq!(anonymous.cache_key("body", 2), "body:2");
  }

  #[test]
  fn joins_fragments_skipping_blank_ones() {
    let descriptor = AssetDescriptor {
      after: vec![
        String::from("a();"),
        String::from("  "),
        String::from("b();"),
      ],
      ..AssetDescriptor::default()
    };

    assert_eq!(descriptor.after_code().as_deref(), Some("a();\nb();"));
    assert_eq!(descriptor.before_code(), None);
  }

  #[test]
  fn splits_by_location_preserving_order() {
    let (header, footer) = split_by_location(vec![
      AssetDescriptor::new("a"),
      AssetDescriptor::new("b").with_location(AssetLocation::Footer),
      AssetDescriptor::new("c"),
      AssetDescriptor::new("d").with_location(AssetLocation::Footer),
    ]);

    let handles = |list: &[AssetDescriptor]| {
      list
        .iter()
        .map(|d| d.handle.clone().unwrap())
        .collect::<Vec<_>>()
    };

    assert_eq!(handles(&header), vec!["a", "c"]);
    assert_eq!(handles(&footer), vec!["b", "d"]);
  }
}
