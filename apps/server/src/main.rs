use actix_web::{middleware, web, App, HttpServer};

use postbridge::config;
use postbridge::db;
use postbridge::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::Config::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("Starting Postbridge server on {}:{}", config.host, config.port);

    let db_pool = db::connect(&config.database).await.map_err(|e| {
        log::error!("{}", e);
        std::io::Error::other(e)
    })?;

    let platform_ctx = postbridge::build_platform_context(&config, &db_pool).map_err(|e| {
        log::error!("Platform setup error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    for platform in postbridge::models::Platform::ALL {
        if !config.platforms.get(platform).is_configured() {
            log::warn!("{} credentials not set; OAuth for it is disabled", platform);
        }
    }
    if config.token_refresh.cron_secret.is_none() {
        log::warn!("CRON_SECRET not set; /cron endpoints are disabled");
    }

    let host = config.host.clone();
    let port = config.port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(platform_ctx.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::health::configure)
            .configure(routes::webhooks::configure)
            .configure(routes::oauth::configure)
            .configure(routes::cron::configure)
    })
    .bind((host.as_str(), port))?
    .shutdown_timeout(30)
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
