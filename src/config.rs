use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub rate_limit: RateLimitConfig,
    pub smtp: SmtpConfig,
    pub bootstrap: BootstrapConfig,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public URL of the web client; used for CORS and for links in emails.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Lifetime of email verification links.
    pub verify_email_ttl_hours: i64,
    /// Lifetime of password reset links.
    pub reset_password_ttl_minutes: i64,
    /// bcrypt work factor for stored password hashes.
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for auth endpoints (e.g. /api/auth/login)
    pub auth_per_second: u32,
    /// Burst size for auth endpoints
    pub auth_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Without a host, outgoing emails are written to the log instead of sent.
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// One of "starttls", "tls", "none".
    pub tls: String,
    pub from: String,
}

/// Optional owner account created on first start when no owner exists.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub owner_email: Option<String>,
    pub owner_password: Option<String>,
    pub owner_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.server.frontend_url),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env_parse("JWT_EXPIRATION_HOURS", 24),
            },
            tokens: TokenConfig {
                verify_email_ttl_hours: env_parse("VERIFY_EMAIL_TOKEN_TTL_HOURS", 48),
                reset_password_ttl_minutes: env_parse("RESET_PASSWORD_TOKEN_TTL_MINUTES", 60),
                bcrypt_cost: env_parse("BCRYPT_COST", bcrypt::DEFAULT_COST),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env_parse("RATE_LIMIT_AUTH_PER_SECOND", 3),
                auth_burst: env_parse("RATE_LIMIT_AUTH_BURST", 10),
            },
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
                port: env_parse("SMTP_PORT", 587),
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                tls: env::var("SMTP_TLS")
                    .map(|v| v.to_lowercase())
                    .unwrap_or(defaults.smtp.tls),
                from: env::var("EMAIL_FROM").unwrap_or(defaults.smtp.from),
            },
            bootstrap: BootstrapConfig {
                owner_email: env::var("OWNER_EMAIL").ok().filter(|v| !v.is_empty()),
                owner_password: env::var("OWNER_PASSWORD").ok().filter(|v| !v.is_empty()),
                owner_name: env::var("OWNER_NAME").unwrap_or(defaults.bootstrap.owner_name),
            },
            log_format: match env::var("LOG_FORMAT") {
                Ok(v) => match v.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "text" | "" => LogFormat::Text,
                    _ => return Err(ConfigError::InvalidValue("LOG_FORMAT".to_string())),
                },
                Err(_) => LogFormat::Text,
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/lodge.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 24,
            },
            tokens: TokenConfig {
                verify_email_ttl_hours: 48,
                reset_password_ttl_minutes: 60,
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
            smtp: SmtpConfig {
                host: None,
                port: 587,
                username: None,
                password: None,
                tls: "starttls".to_string(),
                from: "Lodge <no-reply@localhost>".to_string(),
            },
            bootstrap: BootstrapConfig {
                owner_email: None,
                owner_password: None,
                owner_name: "Owner".to_string(),
            },
            log_format: LogFormat::Text,
        }
    }
}
