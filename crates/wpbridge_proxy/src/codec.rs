//! Reversible obfuscation of the backend origin.
//!
//! The plaintext is XORed byte by byte against a repeating salt and the result is base64
//! encoded. This only keeps the origin out of plain-text markup, the salt is shared
//! configuration and not a secret.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OriginCodecError {
  #[error("The origin salt must not be empty")]
  EmptySalt,
  #[error("Encoded origin is not valid base64: {0}")]
  Base64(#[from] base64::DecodeError),
  #[error("Decoded origin is not valid UTF-8: {0}")]
  Utf8(#[from] std::string::FromUtf8Error),
}

fn xor(bytes: &[u8], salt: &[u8]) -> Result<Vec<u8>, OriginCodecError> {
  if salt.is_empty() {
    return Err(OriginCodecError::EmptySalt);
  }

  Ok(
    bytes
      .iter()
      .zip(salt.iter().cycle())
      .map(|(byte, key)| byte ^ key)
      .collect(),
  )
}

pub fn encode(plaintext: &[u8], salt: &[u8]) -> Result<String, OriginCodecError> {
  Ok(STANDARD.encode(xor(plaintext, salt)?))
}

pub fn decode(encoded: &str, salt: &[u8]) -> Result<Vec<u8>, OriginCodecError> {
  let ciphertext = STANDARD.decode(encoded.trim())?;
  xor(&ciphertext, salt)
}

pub fn decode_origin(encoded: &str, salt: &[u8]) -> Result<String, OriginCodecError> {
  Ok(String::from_utf8(decode(encoded, salt)?)?)
}
