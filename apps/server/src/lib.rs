//! Postbridge server library
//!
//! Platform integrations, webhook ingestion and token lifecycle for the
//! scheduling platform. Exposed as a library for the binaries and tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod executor;
pub mod models;
pub mod platforms;
pub mod routes;
pub mod services;
pub mod webhooks;

use std::sync::Arc;

use config::Config;
use db::DbPool;
use executor::{HttpExecutor, PgApiCallLogger};
use platforms::{OAuthSessionStore, PlatformContext};
use services::RateLimiter;

/// Wires the executor, rate limiter and session store shared by every adapter
pub fn build_platform_context(
    config: &Config,
    pool: &DbPool,
) -> Result<PlatformContext, error::PlatformError> {
    let logger = Arc::new(PgApiCallLogger::new(pool.clone()));
    let executor = HttpExecutor::new(&config.executor, logger)?;

    Ok(PlatformContext::new(
        Arc::new(executor),
        Arc::new(RateLimiter::postgres(pool.clone())),
        Arc::new(OAuthSessionStore::default()),
        Arc::new(config.platforms.clone()),
    ))
}
