use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Access token lifetime in seconds (default 1 hour)
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds (default 30 days)
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    pub use_starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// Base URL verification and reset links point at
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("APP_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").map_err(|_| anyhow::anyhow!("REDIS_URL must be set"))?,
            },
            jwt: JwtConfig {
                access_ttl_secs: env::var("JWT_ACCESS_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()?,
                refresh_ttl_secs: env::var("JWT_REFRESH_TTL_SECS")
                    .unwrap_or_else(|_| "2592000".to_string())
                    .parse()?,
            },
            email: EmailConfig {
                smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
                smtp_port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()?,
                smtp_username: env::var("SMTP_USERNAME").ok(),
                smtp_password: env::var("SMTP_PASSWORD").ok(),
                smtp_from: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "noreply@auth.local".to_string()),
                use_starttls: env::var("SMTP_USE_STARTTLS")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            frontend: FrontendConfig {
                base_url: env::var("FRONTEND_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}
