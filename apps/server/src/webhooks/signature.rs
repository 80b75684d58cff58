//! Delivery signatures.
//!
//! Expected signatures are computed as the exact header string each provider
//! sends and compared byte for byte in constant time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::Platform;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature
pub fn signature_header(platform: Platform) -> &'static str {
    match platform {
        Platform::Facebook | Platform::Instagram => "x-hub-signature-256",
        Platform::Twitter => "x-twitter-webhooks-signature",
        Platform::LinkedIn => "x-li-signature",
    }
}

fn hmac_sha256(secret: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Header value the provider sends for `body` signed with `secret`
pub fn compute_signature(platform: Platform, secret: &str, body: &[u8]) -> String {
    let digest = hmac_sha256(secret, body);
    match platform {
        Platform::Facebook | Platform::Instagram => format!("sha256={}", hex::encode(digest)),
        Platform::Twitter => format!("sha256={}", STANDARD.encode(digest)),
        Platform::LinkedIn => STANDARD.encode(digest),
    }
}

/// Accepts only the exact expected signature string; no secret means reject
pub fn verify_signature(
    platform: Platform,
    secret: Option<&str>,
    body: &[u8],
    provided: Option<&str>,
) -> bool {
    let (Some(secret), Some(provided)) = (secret, provided) else {
        return false;
    };
    if secret.is_empty() {
        return false;
    }
    let expected = compute_signature(platform, secret, body);
    constant_time_eq(expected.as_bytes(), provided.trim().as_bytes())
}

/// Twitter CRC challenge answer: `sha256=` + base64(HMAC(crc_token))
pub fn crc_response_token(secret: &str, crc_token: &str) -> String {
    format!(
        "sha256={}",
        STANDARD.encode(hmac_sha256(secret, crc_token.as_bytes()))
    )
}

/// Compares without short-circuiting on the first differing byte
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
