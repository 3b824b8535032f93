//! Shell configuration.
//!
//! Loaded from environment variables, or from a JSON file when a path is
//! passed as the first command line argument:
//!
//! - `TAXI_DASH_BASE_URL` -- dispatch service root (default `http://127.0.0.1:8000/`)
//! - `TAXI_DASH_POLL_INTERVAL_MS` -- snapshot poll interval (default 500)
//! - `TAXI_DASH_REQUEST_TIMEOUT_MS` -- client-wide request ceiling (default 20000)
//! - `TAXI_DASH_MAP_SCALE` -- map pixels per logical unit (default 5.0)
//! - `TAXI_DASH_RNG_SEED` -- seed for generated taxi identities (default random)

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use shared::{Settings, DEFAULT_BASE_URL};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 20_000;
const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Always ends in `/` so service paths join under it.
    pub base_url: Url,
    pub request_timeout_ms: u64,
    /// Handed to the core on mount; `settings.base_url` mirrors `base_url`.
    pub settings: Settings,
}

/// On-disk form; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    request_timeout_ms: Option<u64>,
    settings: Settings,
}

impl ShellConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(ms) = parse_var(&lookup, "TAXI_DASH_POLL_INTERVAL_MS")? {
            settings.poll_interval_ms = ms;
        }
        if let Some(scale) = parse_var(&lookup, "TAXI_DASH_MAP_SCALE")? {
            settings.map_scale_px = scale;
        }
        settings.rng_seed = parse_var(&lookup, "TAXI_DASH_RNG_SEED")?;

        Self::build(
            lookup("TAXI_DASH_BASE_URL").as_deref(),
            parse_var(&lookup, "TAXI_DASH_REQUEST_TIMEOUT_MS")?,
            settings,
        )
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::build(
            file.base_url.as_deref(),
            file.request_timeout_ms,
            file.settings,
        )
    }

    fn build(
        base_url: Option<&str>,
        request_timeout_ms: Option<u64>,
        mut settings: Settings,
    ) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(base_url.unwrap_or(DEFAULT_BASE_URL))?;
        settings.base_url = base_url.to_string();

        let request_timeout_ms = request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&request_timeout_ms) {
            return Err(ConfigError::OutOfRange {
                name: "request_timeout_ms",
                value: request_timeout_ms,
                min: MIN_REQUEST_TIMEOUT_MS,
                max: MAX_REQUEST_TIMEOUT_MS,
            });
        }

        if !settings.map_scale_px.is_finite() || settings.map_scale_px <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "map_scale_px",
                value: settings.map_scale_px.to_string(),
            });
        }

        Ok(Self {
            base_url,
            request_timeout_ms,
            settings,
        })
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue { name, value: raw })
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed).map_err(|source| ConfigError::InvalidUrl {
        value: trimmed.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::UnsupportedScheme(trimmed.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
