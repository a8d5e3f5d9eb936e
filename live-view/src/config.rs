use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_UPSTREAM: &str = "http://127.0.0.1:8080/api";
const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_POLL_MS: u64 = 5000;
const DEFAULT_OVERLAY_MS: u64 = 1800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub upstream_url: String,
    pub bind_addr: String,
    pub poll_interval: Duration,
    pub overlay_dismiss: Duration,
    pub client_state_path: Option<PathBuf>,
    pub speech_program: Option<String>,
    pub narrator_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM.to_string(),
            bind_addr: DEFAULT_BIND.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            overlay_dismiss: Duration::from_millis(DEFAULT_OVERLAY_MS),
            client_state_path: None,
            speech_program: None,
            narrator_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            upstream_url: optional("UPSTREAM_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_UPSTREAM.to_string()),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            poll_interval: Duration::from_millis(
                parse("POLL_INTERVAL_MS", optional("POLL_INTERVAL_MS"))?.unwrap_or(DEFAULT_POLL_MS),
            ),
            overlay_dismiss: Duration::from_millis(
                parse("OVERLAY_DISMISS_MS", optional("OVERLAY_DISMISS_MS"))?
                    .unwrap_or(DEFAULT_OVERLAY_MS),
            ),
            client_state_path: optional("CLIENT_STATE_PATH").map(PathBuf::from),
            speech_program: optional("SPEECH_PROGRAM"),
            narrator_seed: parse("NARRATOR_SEED", optional("NARRATOR_SEED"))?,
        })
    }
}

fn parse<T: FromStr>(name: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}
