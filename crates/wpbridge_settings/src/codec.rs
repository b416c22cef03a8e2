use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use regex::Match;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Characters escaped by PHP's `rawurlencode`, which WordPress uses to print the payload
const RAW_URL_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
  .remove(b'-')
  .remove(b'_')
  .remove(b'.')
  .remove(b'~');

/// The quoted argument of `decodeURIComponent( ... )`, single or double quoted
static DECODE_CALL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r#"(?s)decodeURIComponent\(\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")\s*\)"#,
  )
  .unwrap()
});

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\b(var|let|const)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=").unwrap()
});

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("Could not find a decodeURIComponent( '...' ) call in the settings script")]
  PatternNotFound,
  #[error("Settings payload is not valid UTF-8 once percent-decoded: {0}")]
  PercentDecode(#[from] std::str::Utf8Error),
  #[error("Settings payload is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
}

/// The variable the settings script assigns, e.g. `var wcSettings`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VariableDeclaration {
  pub keyword: String,
  pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedSettings {
  pub payload: Value,
  /// The argument exactly as it appears in the script, still escaped and percent-encoded
  pub original_encoded: String,
  pub declaration: Option<VariableDeclaration>,
}

/// Reverses the string escaping of the quoted argument
///
/// Quotes are unescaped before backslashes so that `\\'` is not unescaped twice.
fn unescape(value: &str) -> String {
  value
    .replace("\\'", "'")
    .replace("\\\"", "\"")
    .replace("\\\\", "\\")
    .replace("\\n", "\n")
}

/// Inverse of [`unescape`], backslashes go first
fn escape(value: &str) -> String {
  value
    .replace('\\', "\\\\")
    .replace('\'', "\\'")
    .replace('"', "\\\"")
    .replace('\n', "\\n")
}

pub fn find_declaration(raw_script: &str) -> Option<VariableDeclaration> {
  let captures = DECLARATION.captures(raw_script)?;

  Some(VariableDeclaration {
    keyword: captures[1].to_string(),
    name: captures[2].to_string(),
  })
}

/// The quoted argument without its quotes, whichever quote style the script uses
fn find_argument(raw_script: &str) -> Result<Match<'_>, SettingsError> {
  let captures = DECODE_CALL
    .captures(raw_script)
    .ok_or(SettingsError::PatternNotFound)?;

  captures
    .get(1)
    .or_else(|| captures.get(2))
    .ok_or(SettingsError::PatternNotFound)
}

fn decode_argument(argument: &str) -> Result<Value, SettingsError> {
  let unescaped = unescape(argument);
  let json = percent_decode_str(&unescaped).decode_utf8()?;

  Ok(serde_json::from_str(&json)?)
}

/// Opens the settings envelope: extract, unescape, percent-decode, parse
pub fn decode(raw_script: &str) -> Result<DecodedSettings, SettingsError> {
  let argument = find_argument(raw_script)?;
  let payload = decode_argument(argument.as_str())?;

  Ok(DecodedSettings {
    payload,
    original_encoded: argument.as_str().to_string(),
    declaration: find_declaration(raw_script),
  })
}

/// Seals a payload back into `raw_script`
///
/// Only the quoted argument is replaced, every other byte of the script is kept. A payload
/// equal to the one already in the script leaves the script untouched.
pub fn encode(raw_script: &str, payload: &Value) -> Result<String, SettingsError> {
  let argument = find_argument(raw_script)?;

  if decode_argument(argument.as_str()).is_ok_and(|current| current == *payload) {
    return Ok(raw_script.to_string());
  }

  let json = serde_json::to_string(payload)?;
  let encoded = escape(&utf8_percent_encode(&json, RAW_URL_ENCODE).to_string());

  Ok(format!(
    "{}{}{}",
    &raw_script[..argument.start()],
    encoded,
    &raw_script[argument.end()..]
  ))
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use proptest::prelude::*;
  use serde_json::json;

  use super::*;

  const EMPTY_SCRIPT: &str =
    "var wcSettings = wcSettings || JSON.parse( decodeURIComponent( '%7B%7D' ) );";

  #[test]
  fn decodes_a_woocommerce_settings_script() {
    let raw = "var wcSettings = wcSettings || JSON.parse( decodeURIComponent( \
      '%7B%22homeUrl%22%3A%22https%3A%2F%2Fwp.example.com%2F%22%2C%22currency%22%3A%7B%22code%22%3A%22EUR%22%7D%7D' \
      ) );";

    let decoded = decode(raw).unwrap();

    assert_eq!(
      decoded.payload,
      json!({ "homeUrl": "https://wp.example.com/", "currency": { "code": "EUR" } })
    );
    assert_eq!(
      decoded.declaration,
      Some(VariableDeclaration {
        keyword: String::from("var"),
        name: String::from("wcSettings"),
      })
    );
    assert!(decoded.original_encoded.starts_with("%7B%22homeUrl"));
  }

  #[test]
  fn decodes_escaped_quotes_inside_the_argument() {
    let raw = r#"const s = JSON.parse( decodeURIComponent( '%7B%22name%22%3A%22Bob\'s shop%22%7D' ) );"#;

    assert_eq!(decode(raw).unwrap().payload, json!({ "name": "Bob's shop" }));
  }

  #[test]
  fn accepts_double_quoted_arguments() {
    let raw = r#"var s = s || JSON.parse( decodeURIComponent( "%5B1%2C2%5D" ) );"#;

    assert_eq!(decode(raw).unwrap().payload, json!([1, 2]));
  }

  #[test]
  fn missing_pattern_is_a_descriptive_error() {
    let error = decode("var wcSettings = {};").unwrap_err();

    assert!(matches!(error, SettingsError::PatternNotFound));
    assert!(error.to_string().contains("decodeURIComponent"));
  }

  #[test]
  fn invalid_json_is_an_error() {
    let raw = "var s = JSON.parse( decodeURIComponent( '%7Bnope' ) );";

    assert!(matches!(decode(raw), Err(SettingsError::Json(_))));
  }

  #[test]
  fn encode_keeps_the_declaration_and_quote_style() {
    let raw = r#"let shopSettings = JSON.parse( decodeURIComponent( "%7B%7D" ) );"#;

    assert_eq!(
      encode(raw, &json!({ "a": "it's (x)" })).unwrap(),
      r#"let shopSettings = JSON.parse( decodeURIComponent( "%7B%22a%22%3A%22it%27s%20%28x%29%22%7D" ) );"#
    );
  }

  #[test]
  fn encode_keeps_statements_around_the_call() {
    let raw = "window.wc = window.wc || {};\n\
      const wcSettings = JSON.parse( decodeURIComponent( '%7B%7D' ) );\n\
      var wcBlocksMiddlewareConfig = {\"storeApiNonce\":\"abc\"};";

    assert_eq!(
      encode(raw, &json!([1])).unwrap(),
      "window.wc = window.wc || {};\n\
      const wcSettings = JSON.parse( decodeURIComponent( '%5B1%5D' ) );\n\
      var wcBlocksMiddlewareConfig = {\"storeApiNonce\":\"abc\"};"
    );
  }

  #[test]
  fn encode_without_the_call_is_an_error() {
    assert!(matches!(
      encode("var wcSettings = {};", &json!({})),
      Err(SettingsError::PatternNotFound)
    ));
  }

  #[test]
  fn unchanged_payloads_keep_the_original_encoding() {
    // Encoded the way PHP's rawurlencode does it, with a few extra escapes
    let raw = "var s = s || JSON.parse( decodeURIComponent( '%7B%22a%22%3A%22%28x%29%21%22%7D' ) );";
    let decoded = decode(raw).unwrap();

    assert_eq!(decoded.payload, json!({ "a": "(x)!" }));
    assert_eq!(encode(raw, &decoded.payload).unwrap(), raw);
  }

  #[test]
  fn escaped_arguments_decode_after_encoding() {
    let raw = r#"var s = JSON.parse( decodeURIComponent( 'it\'s' ) );"#;
    let payload = json!({ "q": "a'b\\c\n\"" });

    let encoded = encode(raw, &payload).unwrap();

    assert_eq!(decode(&encoded).unwrap().payload, payload);
  }

  #[test]
  fn round_trip_of_an_encoded_script_is_the_identity() {
    let raw = encode(
      EMPTY_SCRIPT,
      &json!({
        "storePages": { "cart": { "id": 7, "permalink": "https://wp.example.com/cart/" } },
        "quote": "don't \"panic\"\n",
        "price": 12.5,
      }),
    )
    .unwrap();

    let decoded = decode(&raw).unwrap();

    assert_eq!(encode(&raw, &decoded.payload).unwrap(), raw);
  }

  fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
      Just(Value::Null),
      any::<bool>().prop_map(Value::Bool),
      any::<i64>().prop_map(Value::from),
      any::<String>().prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 32, 6, |inner| {
      prop_oneof![
        proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
        proptest::collection::vec((any::<String>(), inner), 0..6)
          .prop_map(|entries| Value::Object(entries.into_iter().collect())),
      ]
    })
  }

  proptest! {
    #[test]
    fn decode_then_encode_is_the_identity(payload in json_value()) {
      let raw = encode(EMPTY_SCRIPT, &payload).unwrap();
      let decoded = decode(&raw).unwrap();

      prop_assert_eq!(&decoded.payload, &payload);
      prop_assert_eq!(encode(&raw, &decoded.payload).unwrap(), raw);
    }
  }
}
