use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::warn;

const DEV_JWT_SECRET: &str = "billboard_dev_secret_change_me";

/// Process-wide settings, read once at startup and handed to whoever needs them.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` runs on the in-memory reference store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: None,
            db_max_connections: 10,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl: Duration::days(1),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let jwt_secret = match non_empty_var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET is not set; falling back to the development signing secret");
                defaults.jwt_secret
            }
        };

        Ok(Self {
            host: non_empty_var("HOST").unwrap_or(defaults.host),
            port: parsed_var("PORT")?.unwrap_or(defaults.port),
            database_url: non_empty_var("DATABASE_URL"),
            db_max_connections: parsed_var("DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.db_max_connections),
            jwt_secret,
            token_ttl: defaults.token_ttl,
            upload_dir: non_empty_var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: parsed_var("MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload_bytes),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_var(key)
        .map(|raw| raw.parse::<T>().with_context(|| format!("{key} has invalid value `{raw}`")))
        .transpose()
}
