use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Errors raised while reading configuration from the environment.
/// Any of them is fatal at startup.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    Missing(&'static str),
    /// A variable is set but cannot be parsed.
    Invalid { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "{} must be set", name),
            ConfigError::Invalid { name, value } => {
                write!(f, "{} has an invalid value: {:?}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Limits for one rate limiter: at most `max_requests` per `window` per client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Process-wide configuration, read once at startup and passed to the
/// components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub client_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: Duration,
    pub bcrypt_cost: u32,
    pub db_retry_interval: Duration,
    pub request_timeout: Duration,
    pub auth_rate_limit: RateLimitConfig,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port_name = if env::var("SERVER_PORT").is_ok() {
            "SERVER_PORT"
        } else {
            "PORT"
        };
        let expiration_days: u64 = parse_or("JWT_EXPIRATION_DAYS", 7)?;
        let jwt_expiration = expiration_days
            .checked_mul(86_400)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid {
                name: "JWT_EXPIRATION_DAYS",
                value: expiration_days.to_string(),
            })?;
        let bcrypt_cost: u32 = parse_or("BCRYPT_COST", 10)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_port: parse_or(port_name, 8000)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            client_url: env::var("CLIENT_URL").ok().filter(|url| !url.is_empty()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration,
            bcrypt_cost,
            db_retry_interval: Duration::from_secs(parse_or("DB_RETRY_SECS", 3)?),
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 10)?),
            auth_rate_limit: RateLimitConfig {
                max_requests: parse_or("AUTH_RATE_LIMIT_MAX", 10)?,
                window: Duration::from_secs(parse_or("AUTH_RATE_LIMIT_WINDOW_SECS", 60 * 60)?),
            },
            rate_limit: RateLimitConfig {
                max_requests: parse_or("RATE_LIMIT_MAX", 100)?,
                window: Duration::from_secs(parse_or("RATE_LIMIT_WINDOW_SECS", 15 * 60)?),
            },
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    /// Whether `DATABASE_URL` selects the in-process store instead of Postgres.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory:")
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global, so everything touching them
    // lives in one test.
    #[test]
    fn test_config_from_env() {
        env::remove_var("JWT_SECRET");
        env::set_var("DATABASE_URL", "postgres://test");
        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );

        env::set_var("JWT_SECRET", "   ");
        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );

        env::set_var("JWT_SECRET", "test-secret");
        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.jwt_expiration, Duration::from_secs(7 * 86_400));
        assert_eq!(config.auth_rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(900));
        assert!(!config.uses_memory_store());

        env::set_var("SERVER_PORT", "3000");
        env::set_var("SERVER_HOST", "0.0.0.0");
        env::set_var("DATABASE_URL", "memory://");

        let config = Config::from_env().unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_url(), "http://0.0.0.0:3000");
        assert!(config.uses_memory_store());

        env::set_var("SERVER_PORT", "eighty");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "SERVER_PORT", .. })
        ));

        env::set_var("SERVER_PORT", "3000");
        env::set_var("JWT_EXPIRATION_DAYS", u64::MAX.to_string());
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "JWT_EXPIRATION_DAYS", .. })
        ));
        env::remove_var("JWT_EXPIRATION_DAYS");

        env::set_var("BCRYPT_COST", "2");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "BCRYPT_COST", .. })
        ));
        env::remove_var("BCRYPT_COST");
    }
}
