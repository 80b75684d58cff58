//! Unit tests for webhook signatures
//!
//! Only the exact expected signature string is accepted.

use postbridge::models::Platform;
use postbridge::webhooks::{compute_signature, crc_response_token, verify_signature};
use proptest::prelude::*;

const SECRET: &str = "whsec";

fn platform_strategy() -> impl Strategy<Value = Platform> {
    prop::sample::select(Platform::ALL.to_vec())
}

/// Flips bits of one byte, never leaving it unchanged
fn mutate(bytes: &mut [u8], index: usize, mask: u8) {
    let i = index % bytes.len();
    bytes[i] ^= mask.max(1);
}

proptest! {
    #[test]
    fn exact_signature_is_accepted(platform in platform_strategy(), body in prop::collection::vec(any::<u8>(), 0..256)) {
        let sig = compute_signature(platform, SECRET, &body);
        prop_assert!(verify_signature(platform, Some(SECRET), &body, Some(&sig)));
    }

    #[test]
    fn mutated_body_is_rejected(
        platform in platform_strategy(),
        body in prop::collection::vec(any::<u8>(), 1..256),
        index in any::<usize>(),
        mask in any::<u8>(),
    ) {
        let sig = compute_signature(platform, SECRET, &body);
        let mut tampered = body.clone();
        mutate(&mut tampered, index, mask);
        prop_assert!(!verify_signature(platform, Some(SECRET), &tampered, Some(&sig)));
    }

    #[test]
    fn mutated_signature_is_rejected(
        platform in platform_strategy(),
        body in prop::collection::vec(any::<u8>(), 0..256),
        index in any::<usize>(),
        mask in 1u8..=127,
    ) {
        let sig = compute_signature(platform, SECRET, &body);
        let mut bytes = sig.into_bytes();
        mutate(&mut bytes, index, mask);
        let tampered = String::from_utf8_lossy(&bytes).into_owned();
        prop_assert!(!verify_signature(platform, Some(SECRET), &body, Some(&tampered)));
    }
}

#[test]
fn test_known_facebook_signature() {
    // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
    let sig = compute_signature(
        Platform::Facebook,
        "key",
        b"The quick brown fox jumps over the lazy dog",
    );
    assert_eq!(
        sig,
        "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
    );
}

#[test]
fn test_twitter_and_linkedin_share_the_digest() {
    let twitter = compute_signature(Platform::Twitter, SECRET, b"{}");
    let linkedin = compute_signature(Platform::LinkedIn, SECRET, b"{}");
    assert_eq!(twitter, format!("sha256={}", linkedin));
}

#[test]
fn test_crc_response_matches_signature_of_token() {
    let token = crc_response_token(SECRET, "challenge");
    assert_eq!(token, compute_signature(Platform::Twitter, SECRET, b"challenge"));
}

#[test]
fn test_missing_header_rejected() {
    assert!(!verify_signature(Platform::LinkedIn, Some(SECRET), b"{}", None));
}
