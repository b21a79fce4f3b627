#![forbid(unsafe_code)]

//! Reversible tagging of tracking-parameter values.
//!
//! This is obfuscation, not encryption. The shared secret ships with every build, so anyone holding
//! the binary can decode any tagged value. Both directions fail soft: a value that cannot be
//! encoded is returned as plaintext, and a tagged value that cannot be decoded is returned tagged.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use thiserror::Error;
use tracing::warn;

pub const ENCODED_PREFIX: &str = "enc_";
pub const SHARED_SECRET: &str = "survey_tracking_secret_key_2024";
pub const FIELD_SEPARATOR: char = ':';

// Padded on encode, padding optional on decode.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("parameter encoding failed: {0}")]
    EncodingFailure(String),
    #[error("tagged payload is not valid base64 text")]
    DecodingFailure,
    #[error("invalid encoded parameter")]
    InvalidEncodedValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamCodecConfig {
    pub prefix: &'static str,
    pub secret: &'static str,
    pub separator: char,
}

impl ParamCodecConfig {
    pub fn mvp_v1() -> Self {
        Self {
            prefix: ENCODED_PREFIX,
            secret: SHARED_SECRET,
            separator: FIELD_SEPARATOR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamCodec {
    config: ParamCodecConfig,
}

impl Default for ParamCodec {
    fn default() -> Self {
        Self::new(ParamCodecConfig::mvp_v1())
    }
}

impl ParamCodec {
    pub fn new(config: ParamCodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ParamCodecConfig {
        self.config
    }

    pub fn is_encoded(&self, value: &str) -> bool {
        value.starts_with(self.config.prefix)
    }

    /// Tags `plaintext`, falling back to the plaintext itself when encoding fails.
    pub fn encode(&self, plaintext: &str) -> String {
        match self.try_encode(plaintext) {
            Ok(tagged) => tagged,
            Err(err) => {
                warn!(error = %err, "parameter encoding failed; keeping plaintext");
                plaintext.to_string()
            }
        }
    }

    pub fn try_encode(&self, plaintext: &str) -> Result<String, CodecError> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CodecError::EncodingFailure(e.to_string()))?
            .as_millis();
        Ok(self.encode_at(plaintext, now_ms))
    }

    /// Deterministic encoding for a fixed timestamp (milliseconds since the Unix epoch).
    pub fn encode_at(&self, plaintext: &str, unix_ms: u128) -> String {
        let sep = self.config.separator;
        let payload = format!("{}{sep}{plaintext}{sep}{unix_ms}", self.config.secret);
        format!(
            "{}{}",
            self.config.prefix,
            PAYLOAD_ENGINE.encode(payload_bytes(&payload))
        )
    }

    /// Recovers the plaintext of a tagged value; untagged values pass through unchanged.
    pub fn decode(&self, value: &str) -> String {
        match self.try_decode(value) {
            Ok(plain) => plain,
            Err(err) => {
                warn!(error = %err, "parameter decoding failed; keeping tagged value");
                value.to_string()
            }
        }
    }

    pub fn try_decode(&self, value: &str) -> Result<String, CodecError> {
        let Some(encoded) = value.strip_prefix(self.config.prefix) else {
            return Ok(value.to_string());
        };
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = PAYLOAD_ENGINE
            .decode(compact.as_bytes())
            .map_err(|_| CodecError::DecodingFailure)?;
        let decoded = payload_text(bytes);

        // A separator inside the plaintext truncates it here; kept for compatibility with
        // values already in circulation.
        let mut fields = decoded.split(self.config.separator);
        match (fields.next(), fields.next()) {
            (Some(secret), Some(plain)) if secret == self.config.secret => Ok(plain.to_string()),
            _ => Err(CodecError::InvalidEncodedValue),
        }
    }
}

/// One byte per character when the text fits in Latin-1, which is what browser `btoa` tags
/// carry. Wider text falls back to UTF-8.
fn payload_bytes(payload: &str) -> Vec<u8> {
    payload
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .unwrap_or_else(|| payload.as_bytes().to_vec())
}

fn payload_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    }
}

pub fn encode(plaintext: &str) -> String {
    ParamCodec::default().encode(plaintext)
}

pub fn decode(value: &str) -> String {
    ParamCodec::default().decode(value)
}

pub fn is_encoded(value: &str) -> bool {
    ParamCodec::default().is_encoded(value)
}
