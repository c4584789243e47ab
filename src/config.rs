use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::app_dirs::AppDirs;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api url must start with http:// or https://, got {0:?}")]
    ApiUrl(String),
    #[error("request timeout must be at least one second")]
    Timeout,
    #[error("language tag must not be empty")]
    Language,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    /// Never written back to disk.
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub dictation_command: Option<String>,
    pub language: String,
    /// Further language tags f3 cycles through while answering
    pub extra_languages: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_string(),
            api_token: None,
            dictation_command: None,
            language: "en-US".to_string(),
            extra_languages: Vec::new(),
            request_timeout_secs: 15,
        }
    }
}

/// Values given on the command line; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub dictation_command: Option<String>,
    pub language: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn merged(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(url) = overrides.api_url {
            self.api_url = url;
        }
        if overrides.api_token.is_some() {
            self.api_token = overrides.api_token;
        }
        if overrides.dictation_command.is_some() {
            self.dictation_command = overrides.dictation_command;
        }
        if let Some(lang) = overrides.language {
            self.language = lang;
        }
        if let Some(secs) = overrides.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::ApiUrl(self.api_url.clone()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Timeout);
        }
        if self.language.trim().is_empty()
            || self.extra_languages.iter().any(|l| l.trim().is_empty())
        {
            return Err(ConfigError::Language);
        }
        Ok(())
    }

    /// The primary language first, then the extras, without repeats.
    pub fn language_cycle(&self) -> Vec<String> {
        std::iter::once(&self.language)
            .chain(&self.extra_languages)
            .map(|l| l.trim().to_string())
            .unique()
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("ignoring unreadable config {}: {}", self.path.display(), e),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
