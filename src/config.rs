// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Client configuration.
//!
//! Stored as JSON at `~/.clinic/config.json`. Missing fields fall back to
//! defaults, and `CLINIC_API_URL` overrides the backend address.
//!
//! The idle window and the countdown are the only two timing inputs. The
//! overall session budget (10 minutes by default) is their sum, not a third
//! independent timer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_API_URL;
use crate::security::{WatchdogConfig, DEFAULT_COUNTDOWN_SECS, DEFAULT_IDLE_WARNING_SECS};

/// Environment variable overriding `api_url`.
pub const API_URL_ENV: &str = "CLINIC_API_URL";

const CONFIG_DIR_NAME: &str = ".clinic";
const CONFIG_FILE_NAME: &str = "config.json";
const TOKEN_FILE_NAME: &str = "session.json";

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_idle_warning_secs() -> u64 {
    DEFAULT_IDLE_WARNING_SECS
}

fn default_countdown_secs() -> u32 {
    DEFAULT_COUNTDOWN_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Idle time before the inactivity warning (default: 540 = 9 minutes)
    #[serde(default = "default_idle_warning_secs")]
    pub idle_warning_secs: u64,
    /// Countdown shown in the warning (default: 60)
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u32,
    /// Token file; defaults to `~/.clinic/session.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            idle_warning_secs: default_idle_warning_secs(),
            countdown_secs: default_countdown_secs(),
            token_file: None,
        }
    }
}

impl ClientConfig {
    /// Timing inputs for the watchdog.
    pub fn watchdog(&self) -> WatchdogConfig {
        WatchdogConfig::from_secs(self.idle_warning_secs, self.countdown_secs)
    }

    /// Where the token is persisted.
    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.token_file {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join(TOKEN_FILE_NAME)),
        }
    }

    /// Apply `CLINIC_API_URL` if set and non-empty.
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.apply_api_url_override(&url);
        }
        self
    }

    fn apply_api_url_override(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            tracing::debug!("CONFIG | api_url overridden by {}", API_URL_ENV);
            self.api_url = url.to_string();
        }
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: ClientConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }
}

/// `~/.clinic`, created if missing.
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    let dir = home.join(CONFIG_DIR_NAME);
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
    }
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load `~/.clinic/config.json` with the environment override applied.
pub fn load_config() -> Result<ClientConfig> {
    Ok(ClientConfig::load_from(&config_path()?)?.apply_env())
}

pub fn save_config(config: &ClientConfig) -> Result<()> {
    config.save_to(&config_path()?)
}
