//! Packaging of instance user-data
//!
//! The API wants base64. Plain text from the user is (optionally) gzipped and
//! encoded; text that already is base64 is passed through untouched, and a
//! flag records that so Read hands it back the same way.

use crate::error::{ProviderError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest encoded payload the API accepts
pub const MAX_USER_DATA_LENGTH: usize = 32_768;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedUserData {
    /// Base64 payload sent to the API
    pub value: String,
    /// The user supplied base64 already
    pub already_encoded: bool,
}

pub fn is_base64(input: &str) -> bool {
    !input.is_empty() && STANDARD.decode(input).is_ok()
}

fn looks_gzipped(input: &str) -> bool {
    input.as_bytes().starts_with(&GZIP_MAGIC) || input.starts_with("\u{1f}\u{8b}")
}

/// Encode user-data for the API.
pub fn encode(input: &str, gzip: bool) -> Result<EncodedUserData> {
    if is_base64(input) {
        return checked(EncodedUserData {
            value: input.to_string(),
            already_encoded: true,
        });
    }

    if looks_gzipped(input) {
        return Err(ProviderError::invalid(
            "user_data is gzip-compressed but not base64-encoded; supply plain text or base64",
        ));
    }

    let payload = if gzip {
        let compress_error =
            |e: std::io::Error| ProviderError::invalid(format!("cannot compress user_data: {}", e));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(input.as_bytes()).map_err(compress_error)?;
        encoder.finish().map_err(compress_error)?
    } else {
        input.as_bytes().to_vec()
    };

    checked(EncodedUserData {
        value: STANDARD.encode(payload),
        already_encoded: false,
    })
}

fn checked(encoded: EncodedUserData) -> Result<EncodedUserData> {
    if encoded.value.len() > MAX_USER_DATA_LENGTH {
        return Err(ProviderError::invalid(format!(
            "user_data is {} bytes once encoded, the limit is {}",
            encoded.value.len(),
            MAX_USER_DATA_LENGTH
        )));
    }
    Ok(encoded)
}

/// Decode an API payload back to the text the user wrote, gunzipping when
/// needed.
pub fn decode(encoded: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ProviderError::invalid(format!("user_data is not valid base64: {}", e)))?;

    let bytes = if bytes.starts_with(&GZIP_MAGIC) {
        let mut text = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut text)
            .map_err(|e| ProviderError::invalid(format!("cannot decompress user_data: {}", e)))?;
        text
    } else {
        bytes
    };

    String::from_utf8(bytes)
        .map_err(|_| ProviderError::invalid("user_data is not valid UTF-8"))
}

/// Value to store for `user_data` after Read, honouring how the user wrote it
pub fn for_state(encoded: &str, already_encoded: bool) -> Result<String> {
    if already_encoded {
        Ok(encoded.to_string())
    } else {
        decode(encoded)
    }
}
