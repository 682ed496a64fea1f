//! Server settings, read from the environment at startup.

use std::net::{Ipv4Addr, SocketAddr};

use attesta_core::config::DEFAULT_MAX_CAPTURES;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: Ipv4Addr,
    /// `None` or empty allows any origin.
    pub allowed_origins: Option<Vec<String>>,
    pub body_limit_mb: usize,
    pub max_file_size_mb: usize,
    pub timeout_secs: u64,

    /// Off in `Default` so tests are not throttled; on unless
    /// `RATE_LIMIT_ENABLED=false` when read from the environment.
    pub rate_limit_enabled: bool,
    pub rate_limit_per_sec: u64,
    pub rate_limit_burst: u32,

    /// PostgreSQL ledger. Unset keeps entries in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// HS256 secret for bearer tokens. Unset disables auth.
    pub jwt_secret: Option<String>,

    /// Used by capture fields that do not set `maxCaptures`.
    pub default_max_captures: u32,
    /// `collection.field` pairs registered as capture fields at startup.
    pub capture_fields: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: Ipv4Addr::LOCALHOST,
            allowed_origins: None,
            body_limit_mb: 50,
            max_file_size_mb: 25,
            timeout_secs: 30,
            rate_limit_enabled: false,
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            jwt_secret: None,
            default_max_captures: DEFAULT_MAX_CAPTURES,
            capture_fields: Vec::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Parse `inspections.photos, samples.images` into pairs, skipping malformed items.
fn parse_capture_fields(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|item| {
            let (collection, field) = item.trim().split_once('.')?;
            (!collection.is_empty() && !field.is_empty())
                .then(|| (collection.to_string(), field.to_string()))
        })
        .collect()
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            host: env_parse("HOST").unwrap_or(defaults.host),
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB").unwrap_or(defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            database_url: env_non_empty("DATABASE_URL"),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            jwt_secret: env_non_empty("AUTH_JWT_SECRET"),
            default_max_captures: env_parse("CAPTURE_MAX_CAPTURES")
                .unwrap_or(defaults.default_max_captures),
            capture_fields: std::env::var("CAPTURE_FIELDS")
                .map(|v| parse_capture_fields(&v))
                .unwrap_or_default(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Per-upload limit in bytes.
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}
