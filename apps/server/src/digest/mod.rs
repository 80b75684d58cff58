//! Deferred processing of verified webhook deliveries.

mod worker;

pub use worker::{apply_event, notification_for, process_delivery, DeliveryReport, ProcessOutcome};
