//! Configuration management for Tiergate.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::CacheConfig;
use crate::error::{Result, TierGateError};
use crate::ratelimit::{Tier, TierLimits};

/// Main configuration for the Tiergate service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierGateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Shared cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Per-tier window settings
    #[serde(default)]
    pub rate_limiting: TierLimits,

    /// Deployment mode
    #[serde(default)]
    pub environment: Environment,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Browser origin allowed to make cross-origin calls
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl ServerConfig {
    /// The socket address to listen on.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    4000
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// TTL applied when a caller gives none, in seconds
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Expiry sweep interval in seconds
    #[serde(default = "default_check_period_secs")]
    pub check_period_secs: u64,
}

impl CacheSettings {
    /// Convert to the cache's runtime configuration.
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            default_ttl: Duration::from_secs(self.default_ttl_secs),
            check_period: Duration::from_secs(self.check_period_secs),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            check_period_secs: default_check_period_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_check_period_secs() -> u64 {
    120
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Parse a mode name; anything unrecognised is development.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    /// Whether diagnostic endpoints must be hidden.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl TierGateConfig {
    /// Load configuration from a file path (YAML, TOML or JSON by extension).
    pub fn from_file(path: &str) -> Result<Self> {
        info!(path = %path, "Loading configuration file");
        let mut config: Self = config::Config::builder()
            .add_source(config::File::from(Path::new(path)))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| TierGateError::Config(format!("Failed to load {}: {}", path, e)))?;
        config.rate_limiting.sanitize();
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Self = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| TierGateError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.rate_limiting.sanitize();
        Ok(config)
    }

    /// Load the optional file, then apply process environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override settings from environment-style variables.
    ///
    /// Malformed values are logged and ignored so the current value stays.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = parse_var(&lookup, "HOST", |_: &IpAddr| true) {
            self.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT", |port: &u16| *port > 0) {
            self.server.port = port;
        }
        if let Some(origin) = lookup("FRONTEND_URL").filter(|o| !o.trim().is_empty()) {
            self.server.cors_origin = origin.trim().to_string();
        }
        if let Some(ttl) = parse_var(&lookup, "CACHE_TTL", |_: &u64| true) {
            self.cache.default_ttl_secs = ttl;
        }
        if let Some(period) = parse_var(&lookup, "CACHE_CHECK_PERIOD", |_: &u64| true) {
            self.cache.check_period_secs = period;
        }

        for (tier, var) in [
            (Tier::Strict, "STRICT_RATE_LIMIT"),
            (Tier::Normal, "NORMAL_RATE_LIMIT"),
            (Tier::Lenient, "LENIENT_RATE_LIMIT"),
        ] {
            if let Some(max) = parse_var(&lookup, var, |max: &u32| *max > 0) {
                self.rate_limiting.get_mut(tier).max = max;
            }
        }

        if let Some(mode) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            self.environment = Environment::from_name(&mode);
        }
    }
}

fn parse_var<T, F, A>(lookup: &F, key: &str, accept: A) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
    A: Fn(&T) -> bool,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if accept(&value) => Some(value),
        Ok(_) => {
            warn!(var = key, value = %raw, "Out of range value, keeping default");
            None
        }
        Err(e) => {
            warn!(var = key, value = %raw, error = %e, "Malformed value, keeping default");
            None
        }
    }
}
