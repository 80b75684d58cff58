//! Common test utilities and helpers
//!
//! This module provides shared functionality for all tests.

pub mod db;
pub mod fixtures;

pub use db::TestDb;
#[allow(unused_imports)]
pub use fixtures::*;
