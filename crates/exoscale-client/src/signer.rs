//! Request signing for the v2 and legacy v1 APIs

use crate::config::Credentials;
use crate::error::{ApiError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// Build the `Authorization` header value of a v2 request.
///
/// The signed message is the request line, the body, the query values in
/// parameter-name order, an empty signed-headers line and the expiry.
pub fn v2_authorization(
    credentials: &Credentials,
    method: &str,
    path: &str,
    body: &[u8],
    query: &[(String, String)],
    expires: i64,
) -> Result<String> {
    let mut sorted: Vec<&(String, String)> = query.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut message = format!("{} {}\n", method, path).into_bytes();
    message.extend_from_slice(body);
    message.push(b'\n');
    for (_, value) in &sorted {
        message.extend_from_slice(value.as_bytes());
    }
    message.push(b'\n');
    message.push(b'\n');
    message.extend_from_slice(expires.to_string().as_bytes());

    let mut mac = HmacSha256::new_from_slice(credentials.secret.as_bytes())
        .map_err(|e| ApiError::Invalid(format!("unusable API secret: {}", e)))?;
    mac.update(&message);
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    let mut header = format!("EXO2-HMAC-SHA256 credential={}", credentials.key);
    if !sorted.is_empty() {
        let names: Vec<&str> = sorted.iter().map(|(k, _)| k.as_str()).collect();
        header.push_str(&format!(",signed-query-args={}", names.join(";")));
    }
    header.push_str(&format!(",expires={},signature={}", expires, signature));
    Ok(header)
}

/// Compute the `signature` parameter of a v1 command.
///
/// Parameters are sorted by lowercased name, percent-encoded with `%20` for
/// spaces, joined and lowercased before being signed with HMAC-SHA1.
pub fn v1_signature(secret: &str, params: &[(String, String)]) -> Result<String> {
    let payload = v1_canonical_query(params).to_lowercase();

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Invalid(format!("unusable API secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub(crate) fn v1_canonical_query(params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by_key(|(k, _)| k.to_lowercase());
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
