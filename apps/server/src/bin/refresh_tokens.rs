//! One-shot token refresh sweep, meant to be run from cron.
//!
//! Exits 0 when the sweep completes, even if individual accounts failed, and
//! 1 when the sweep could not run at all.

use std::process::ExitCode;

use postbridge::config::Config;
use postbridge::db;
use postbridge::services::TokenRefreshService;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Token refresh sweep aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let config = Config::from_env().map_err(|e| e.to_string())?;
    let pool = db::connect(&config.database).await?;
    let ctx = postbridge::build_platform_context(&config, &pool).map_err(|e| e.to_string())?;

    let report = TokenRefreshService::run_sweep(&pool, &ctx, &config.token_refresh)
        .await
        .map_err(|e| e.to_string())?;

    println!(
        "Token refresh: {} scanned, {} refreshed, {} failed, {} need re-authentication, {} skipped",
        report.scanned, report.refreshed, report.failed, report.reauth_required, report.skipped
    );
    Ok(())
}
