use std::env;
use std::time::Duration;

use crate::models::Platform;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build OAuth redirect URIs
    pub public_url: String,
    pub database: DatabaseConfig,
    pub executor: ExecutorConfig,
    pub platforms: PlatformsConfig,
    pub token_refresh: TokenRefreshConfig,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Outbound HTTP settings shared by every platform adapter
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Length of one backoff "second"; tests shrink it to milliseconds
    pub backoff_unit: Duration,
}

/// Token refresh sweep settings
#[derive(Debug, Clone)]
pub struct TokenRefreshConfig {
    /// Shared secret for `POST /cron/refresh-tokens`; the route is disabled when unset
    pub cron_secret: Option<String>,
    pub look_ahead: chrono::Duration,
    pub delay_between_accounts: Duration,
    pub lock_ttl: chrono::Duration,
}

/// Endpoint families used by an adapter
#[derive(Debug, Clone)]
pub struct PlatformEndpoints {
    pub api_base: String,
    pub authorize_url: String,
    pub token_url: String,
    /// Separate media upload host (Twitter)
    pub upload_base: Option<String>,
}

/// Credentials and endpoints for one platform
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub webhook_verify_token: Option<String>,
    pub webhook_secret: Option<String>,
    pub endpoints: PlatformEndpoints,
}

#[derive(Debug, Clone)]
pub struct PlatformsConfig {
    pub facebook: PlatformConfig,
    pub instagram: PlatformConfig,
    pub twitter: PlatformConfig,
    pub linkedin: PlatformConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let public_url = env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            host,
            port,
            public_url,
            database: DatabaseConfig::from_env()?,
            executor: ExecutorConfig::from_env(),
            platforms: PlatformsConfig::from_env(),
            token_refresh: TokenRefreshConfig::from_env(),
        })
    }

    /// OAuth redirect URI registered with the platform
    pub fn oauth_redirect_uri(&self, platform: Platform) -> String {
        format!("{}/oauth/{}/callback", self.public_url, platform)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 1),
            acquire_timeout: Duration::from_secs(env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)),
            idle_timeout: Duration::from_secs(env_parse("DATABASE_IDLE_TIMEOUT_SECS", 600)),
            max_lifetime: Duration::from_secs(env_parse("DATABASE_MAX_LIFETIME_SECS", 1800)),
        })
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl ExecutorConfig {
    pub fn from_env() -> Self {
        Self {
            timeout: Duration::from_secs(env_parse("PLATFORM_HTTP_TIMEOUT_SECS", 30)),
            max_retries: env_parse("PLATFORM_HTTP_MAX_RETRIES", 3),
            backoff_unit: Duration::from_millis(env_parse("PLATFORM_HTTP_BACKOFF_UNIT_MS", 1000)),
        }
    }
}

impl Default for TokenRefreshConfig {
    fn default() -> Self {
        Self {
            cron_secret: None,
            look_ahead: chrono::Duration::hours(24),
            delay_between_accounts: Duration::from_millis(1000),
            lock_ttl: chrono::Duration::seconds(300),
        }
    }
}

impl TokenRefreshConfig {
    pub fn from_env() -> Self {
        Self {
            cron_secret: env_nonempty("CRON_SECRET"),
            look_ahead: chrono::Duration::hours(env_parse("TOKEN_REFRESH_LOOKAHEAD_HOURS", 24)),
            delay_between_accounts: Duration::from_millis(env_parse(
                "TOKEN_REFRESH_DELAY_MS",
                1000,
            )),
            lock_ttl: chrono::Duration::seconds(env_parse("TOKEN_REFRESH_LOCK_TTL_SECS", 300)),
        }
    }
}

impl PlatformEndpoints {
    /// Production endpoints for a platform
    pub fn defaults(platform: Platform) -> Self {
        match platform {
            Platform::Facebook | Platform::Instagram => Self {
                api_base: "https://graph.facebook.com/v18.0".to_string(),
                authorize_url: "https://www.facebook.com/v18.0/dialog/oauth".to_string(),
                token_url: "https://graph.facebook.com/v18.0/oauth/access_token".to_string(),
                upload_base: None,
            },
            Platform::Twitter => Self {
                api_base: "https://api.twitter.com/2".to_string(),
                authorize_url: "https://twitter.com/i/oauth2/authorize".to_string(),
                token_url: "https://api.twitter.com/2/oauth2/token".to_string(),
                upload_base: Some("https://upload.twitter.com/1.1".to_string()),
            },
            Platform::LinkedIn => Self {
                api_base: "https://api.linkedin.com/v2".to_string(),
                authorize_url: "https://www.linkedin.com/oauth/v2/authorization".to_string(),
                token_url: "https://www.linkedin.com/oauth/v2/accessToken".to_string(),
                upload_base: None,
            },
        }
    }

    /// Points every endpoint family at one base URL (local fakes, proxies)
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api_base: base.to_string(),
            authorize_url: format!("{}/oauth/authorize", base),
            token_url: format!("{}/oauth/token", base),
            upload_base: Some(format!("{}/upload", base)),
        }
    }
}

impl PlatformConfig {
    /// Reads `<PREFIX>_CLIENT_ID`, `<PREFIX>_CLIENT_SECRET`, `<PREFIX>_WEBHOOK_VERIFY_TOKEN`,
    /// `<PREFIX>_WEBHOOK_SECRET` and `<PREFIX>_API_BASE`.
    pub fn from_env(platform: Platform) -> Self {
        let prefix = platform.as_str().to_uppercase();
        let var = |suffix: &str| env_nonempty(&format!("{}_{}", prefix, suffix));

        let endpoints = match var("API_BASE") {
            Some(base) => PlatformEndpoints::rooted_at(&base),
            None => PlatformEndpoints::defaults(platform),
        };

        Self {
            client_id: var("CLIENT_ID"),
            client_secret: var("CLIENT_SECRET"),
            webhook_verify_token: var("WEBHOOK_VERIFY_TOKEN"),
            webhook_secret: var("WEBHOOK_SECRET"),
            endpoints,
        }
    }

    /// An unconfigured platform with production endpoints
    pub fn unconfigured(platform: Platform) -> Self {
        Self {
            client_id: None,
            client_secret: None,
            webhook_verify_token: None,
            webhook_secret: None,
            endpoints: PlatformEndpoints::defaults(platform),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Key used to verify webhook signatures.
    ///
    /// Meta signs deliveries with the app secret; Twitter and LinkedIn use a
    /// dedicated webhook secret.
    pub fn webhook_signing_secret(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Facebook | Platform::Instagram => self
                .webhook_secret
                .as_deref()
                .or(self.client_secret.as_deref()),
            Platform::Twitter | Platform::LinkedIn => self.webhook_secret.as_deref(),
        }
    }
}

impl PlatformsConfig {
    pub fn from_env() -> Self {
        Self {
            facebook: PlatformConfig::from_env(Platform::Facebook),
            instagram: PlatformConfig::from_env(Platform::Instagram),
            twitter: PlatformConfig::from_env(Platform::Twitter),
            linkedin: PlatformConfig::from_env(Platform::LinkedIn),
        }
    }

    pub fn get(&self, platform: Platform) -> &PlatformConfig {
        match platform {
            Platform::Facebook => &self.facebook,
            Platform::Instagram => &self.instagram,
            Platform::Twitter => &self.twitter,
            Platform::LinkedIn => &self.linkedin,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut PlatformConfig {
        match platform {
            Platform::Facebook => &mut self.facebook,
            Platform::Instagram => &mut self.instagram,
            Platform::Twitter => &mut self.twitter,
            Platform::LinkedIn => &mut self.linkedin,
        }
    }
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            facebook: PlatformConfig::unconfigured(Platform::Facebook),
            instagram: PlatformConfig::unconfigured(Platform::Instagram),
            twitter: PlatformConfig::unconfigured(Platform::Twitter),
            linkedin: PlatformConfig::unconfigured(Platform::LinkedIn),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    MissingDatabaseUrl,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::MissingDatabaseUrl => {
                write!(f, "DATABASE_URL environment variable is required")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
