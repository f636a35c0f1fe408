use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use jsonwebtoken::Algorithm;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub timezone: Tz,
    /// Receiver used when no finance supervisor exists yet.
    pub default_supervisor_id: i32,
    pub auth_service_url: String,
    pub vendors_lambda_url: String,
    pub vacations_lambda_url: String,
    pub http_timeout: Duration,
    pub permission_cache_ttl: Duration,
    pub run_migrations: bool,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load environment variables and set defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `std::env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_raw = or_default("BIND_ADDR", "127.0.0.1:3000");
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let alg_raw = or_default("JWT_ALGORITHM", "HS256");
        let jwt_algorithm = alg_raw.parse::<Algorithm>().map_err(|_| ConfigError::Invalid {
            key: "JWT_ALGORITHM",
            value: alg_raw.clone(),
        })?;

        let tz_raw = or_default("APP_TIMEZONE", "America/Santiago");
        let timezone = tz_raw.parse::<Tz>().map_err(|_| ConfigError::Invalid {
            key: "APP_TIMEZONE",
            value: tz_raw.clone(),
        })?;

        let default_supervisor_id = parse_num(&lookup, "DEFAULT_SUPERVISOR_ID", 1)?;
        let timeout_secs: u64 = parse_num(&lookup, "HTTP_TIMEOUT_SECS", 10)?;
        let cache_ttl_secs: u64 = parse_num(&lookup, "PERMISSION_CACHE_TTL_SECS", 600)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr,
            jwt_secret: required("JWT_SECRET")?,
            jwt_algorithm,
            timezone,
            default_supervisor_id,
            auth_service_url: or_default("AUTH_SERVICE_URL", "http://localhost:8001")
                .trim_end_matches('/')
                .to_string(),
            vendors_lambda_url: or_default("VENDORS_LAMBDA_URL", "http://localhost:9001/vendedores"),
            vacations_lambda_url: or_default("VACATIONS_LAMBDA_URL", "http://localhost:9001/vacaciones"),
            http_timeout: Duration::from_secs(timeout_secs.clamp(2, 30)),
            permission_cache_ttl: Duration::from_secs(cache_ttl_secs),
            run_migrations: or_default("RUN_MIGRATIONS", "true") == "true",
            log_dir: lookup("LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_num<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
