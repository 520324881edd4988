use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::utils::url::{is_http_url, normalize_base_url};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const ENV_BASE_URL: &str = "NEST_API_URL";
pub const ENV_MODEL: &str = "NEST_MODEL";
pub const ENV_CONFIG_DIR: &str = "NEST_CONFIG_DIR";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the generation service; `/generate` is appended per call.
    pub base_url: Option<String>,
    /// Model identifier sent with each request. Omitted from requests when unset.
    pub model: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
}

/// Values given on the command line, which win over everything else.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Cli,
    Env,
    File,
    Default,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueSource::Cli => "command line",
            ValueSource::Env => "environment",
            ValueSource::File => "config file",
            ValueSource::Default => "default",
        })
    }
}

/// Settings after applying CLI, environment, file and built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub base_url_source: ValueSource,
    pub model: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    Model,
    RequestTimeout,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 3] = [ConfigKey::BaseUrl, ConfigKey::Model, ConfigKey::RequestTimeout];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::Model => "model",
            ConfigKey::RequestTimeout => "request-timeout",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl Config {
    /// Resolve effective settings. `env` looks up environment variables so
    /// callers and tests can supply their own source.
    pub fn resolve(
        &self,
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> ResolvedConfig {
        let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let (base_url, base_url_source) = if let Some(url) = non_empty(&overrides.base_url) {
            (url, ValueSource::Cli)
        } else if let Some(url) = env(ENV_BASE_URL) {
            (url, ValueSource::Env)
        } else if let Some(url) = non_empty(&self.base_url) {
            (url, ValueSource::File)
        } else {
            (DEFAULT_BASE_URL.to_string(), ValueSource::Default)
        };

        let model = non_empty(&overrides.model)
            .or_else(|| env(ENV_MODEL))
            .or_else(|| non_empty(&self.model));

        let timeout_secs = self
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        ResolvedConfig {
            base_url: normalize_base_url(&base_url),
            base_url_source,
            model,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn resolve_from_env(&self, overrides: &ConfigOverrides) -> ResolvedConfig {
        self.resolve(overrides, |name| std::env::var(name).ok())
    }

    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), String> {
        let value = value.trim();
        match key {
            ConfigKey::BaseUrl => {
                if !is_http_url(value) {
                    return Err(format!("'{value}' is not an http(s) URL"));
                }
                self.base_url = Some(normalize_base_url(value));
            }
            ConfigKey::Model => {
                if value.is_empty() {
                    return Err("model name cannot be empty".to_string());
                }
                self.model = Some(value.to_string());
            }
            ConfigKey::RequestTimeout => {
                let secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| format!("'{value}' is not a positive number of seconds"))?;
                self.request_timeout_secs = Some(secs);
            }
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::Model => self.model = None,
            ConfigKey::RequestTimeout => self.request_timeout_secs = None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
