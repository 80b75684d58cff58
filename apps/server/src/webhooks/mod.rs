//! Webhook ingestion: handshakes, signature checks and envelope decoding.

pub mod envelope;
pub mod signature;
pub mod verification;

pub use envelope::{decode, delivery_event_type, EventKind, NormalizedEvent};
pub use signature::{
    compute_signature, constant_time_eq, crc_response_token, signature_header, verify_signature,
};
pub use verification::{verify_handshake, CrcResponse, VerificationReply};
