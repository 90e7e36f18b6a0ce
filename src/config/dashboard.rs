// src/config/dashboard.rs
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::providers::similarweb::DEFAULT_RAPIDAPI_HOST;

pub const DEFAULT_CONFIG_PATH: &str = "config/dashboard.toml";
pub const ENV_CONFIG_PATH: &str = "WETRAN_CONFIG_PATH";
pub const ENV_CACHE_TTL_SECS: &str = "WETRAN_CACHE_TTL_SECS";
pub const ENV_UPSTREAM_TIMEOUT_MS: &str = "WETRAN_UPSTREAM_TIMEOUT_MS";
pub const ENV_SIMILARWEB_API_KEY: &str = "SIMILARWEB_API_KEY";
pub const ENV_TRAFFIC_API_KEY: &str = "TRAFFIC_API_KEY";

const DEFAULT_AUTH_BASE_URL: &str = "https://website-traffic-analyzer.herokuapp.com/api";

fn default_auth_base_url() -> String {
    DEFAULT_AUTH_BASE_URL.to_string()
}
fn default_ttl_secs() -> u64 {
    300
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    4_000
}
fn default_true() -> bool {
    true
}
fn default_rapidapi_host() -> String {
    DEFAULT_RAPIDAPI_HOST.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_base_url")]
    pub base_url: String,
    /// Where the session token is persisted; `None` keeps it in memory only.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Bound on a single adapter query; distinct from cache TTL.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub internal: InternalConfig,
    #[serde(default)]
    pub similarweb: Option<SimilarWebConfig>,
    #[serde(default)]
    pub trafficapi: Option<TrafficApiConfig>,
    #[serde(default = "default_true")]
    pub fixture: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InternalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Internal stats live on the auth backend unless overridden.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarWebConfig {
    pub base_url: String,
    #[serde(default = "default_rapidapi_host")]
    pub rapidapi_host: String,
    /// "ENV" means: read from SIMILARWEB_API_KEY
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficApiConfig {
    pub base_url: String,
    /// "ENV" means: read from TRAFFIC_API_KEY
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: default_auth_base_url(),
            token_file: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            internal: InternalConfig::default(),
            similarweb: None,
            trafficapi: None,
            fixture: true,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            cache: CacheConfig::default(),
            upstream: UpstreamConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("loading {}", path.display()))
    }

    /// Parses TOML, resolves `"ENV"` keys and applies env overrides.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: DashboardConfig = toml::from_str(s)?;
        cfg.resolve_env()?;
        Ok(cfg)
    }

    /// 1) $WETRAN_CONFIG_PATH (must exist)
    /// 2) config/dashboard.toml
    /// 3) built-in defaults (+ env overrides)
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from_file(&pb);
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(&default_path);
        }
        let mut cfg = Self::default();
        cfg.resolve_env()?;
        Ok(cfg)
    }

    fn resolve_env(&mut self) -> Result<()> {
        if let Some(sw) = &mut self.providers.similarweb {
            sw.api_key = resolve_key(&sw.api_key, ENV_SIMILARWEB_API_KEY)?;
        }
        if let Some(ta) = &mut self.providers.trafficapi {
            ta.api_key = resolve_key(&ta.api_key, ENV_TRAFFIC_API_KEY)?;
        }

        if let Some(v) = parse_env_u64(ENV_CACHE_TTL_SECS) {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = parse_env_u64(ENV_UPSTREAM_TIMEOUT_MS) {
            self.upstream.timeout_ms = v;
        }
        // A zero timeout would fail every query.
        if self.upstream.timeout_ms == 0 {
            self.upstream.timeout_ms = default_timeout_ms();
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.connect_timeout_ms)
    }

    /// Internal stats base URL, falling back to the auth backend.
    pub fn internal_base_url(&self) -> Option<String> {
        let internal = &self.providers.internal;
        internal.enabled.then(|| {
            internal
                .base_url
                .clone()
                .unwrap_or_else(|| self.auth.base_url.clone())
        })
    }
}

fn resolve_key(raw: &str, env_name: &str) -> Result<String> {
    if raw.trim().eq_ignore_ascii_case("env") {
        return env::var(env_name).map_err(|_| anyhow::anyhow!("Missing {env_name} env var"));
    }
    Ok(raw.trim().to_string())
}

fn parse_env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok())
}
