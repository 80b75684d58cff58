//! Subscription handshakes answered on `GET /webhooks/{platform}`.

use std::collections::HashMap;

use serde::Serialize;

use super::signature::{constant_time_eq, crc_response_token};
use crate::config::PlatformConfig;
use crate::models::Platform;

/// What the gateway sends back to a verification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationReply {
    /// Echo the challenge as plain text
    Challenge(String),
    /// Twitter CRC answer, sent as JSON
    Crc(CrcResponse),
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrcResponse {
    pub response_token: String,
}

/// Meta sends dotted names; some proxies rewrite them with underscores
fn hub_param<'a>(query: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    query
        .get(&format!("hub.{}", name))
        .or_else(|| query.get(&format!("hub_{}", name)))
        .map(String::as_str)
}

pub fn verify_handshake(
    platform: Platform,
    config: &PlatformConfig,
    query: &HashMap<String, String>,
) -> VerificationReply {
    match platform {
        Platform::Facebook | Platform::Instagram => {
            let expected = config.webhook_verify_token.as_deref().unwrap_or_default();
            let mode = hub_param(query, "mode");
            let token = hub_param(query, "verify_token");
            let challenge = hub_param(query, "challenge");

            match (mode, token, challenge) {
                (Some("subscribe"), Some(token), Some(challenge))
                    if !expected.is_empty()
                        && constant_time_eq(token.as_bytes(), expected.as_bytes()) =>
                {
                    VerificationReply::Challenge(challenge.to_string())
                }
                _ => VerificationReply::Rejected,
            }
        }
        Platform::Twitter => {
            let secret = config.webhook_signing_secret(platform);
            match (secret, query.get("crc_token")) {
                (Some(secret), Some(token)) if !secret.is_empty() && !token.is_empty() => {
                    VerificationReply::Crc(CrcResponse {
                        response_token: crc_response_token(secret, token),
                    })
                }
                _ => VerificationReply::Rejected,
            }
        }
        Platform::LinkedIn => match query.get("challengeCode") {
            Some(code) if !code.is_empty() => VerificationReply::Challenge(code.clone()),
            _ => VerificationReply::Rejected,
        },
    }
}
