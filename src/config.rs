//
// (C) Copyright IBM 2025, 2026
//
// This code is licensed under the Apache License, Version 2.0. You may
// obtain a copy of this license in the LICENSE.txt file in the root directory
// of this source tree or at http://www.apache.org/licenses/LICENSE-2.0.
//
// Any modifications or derivative works of this code must retain this
// copyright notice, and modified files need to carry a notice indicating
// that they have been altered from the originals.

//! Poller and connection settings.
//!
//! A setting named `KEY` for resource `<name>` is looked up in this order:
//!
//! 1. environment variable `<name>_KEY`
//! 2. `resources[].environment.KEY` of the JSON config file, for the resource
//!    whose `name` is `<name>`
//! 3. built-in default

use crate::models::Schedule;
use anyhow::{anyhow, bail, Result};
use log::debug;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use taxpayer_api::{Client, ClientBuilder};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/status_poller/config.json";

pub const SCHEDULE_KEY: &str = "STATUS_POLLER_SCHEDULE";
pub const IMMEDIATE_KEY: &str = "STATUS_POLLER_IMMEDIATE";

pub const BASE_URL_VAR: &str = "TAXPAYER_API_BASE_URL";
pub const API_KEY_VAR: &str = "TAXPAYER_API_KEY";
pub const API_SECRET_VAR: &str = "TAXPAYER_API_SECRET";
pub const COMPANY_GSTIN_VAR: &str = "COMPANY_GSTIN";
pub const TIMEOUT_VAR: &str = "TAXPAYER_API_TIMEOUT_SECS";

/// Settings of a [`crate::StatusPoller`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerConfig {
    pub schedule: Schedule,
    pub immediate: bool,
}

impl PollerConfig {
    /// Loads the settings of resource `name` using [`DEFAULT_CONFIG_PATH`].
    pub fn load(name: &str) -> Result<Self> {
        Self::load_from(name, Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Loads the settings of resource `name` using the config file at `path`.
    /// A missing or unreadable file is skipped.
    pub fn load_from(name: &str, path: &Path) -> Result<Self> {
        let schedule = match lookup(name, SCHEDULE_KEY, path) {
            Some(v) => Schedule::parse(&v)?,
            None => Schedule::default(),
        };
        let immediate = match lookup(name, IMMEDIATE_KEY, path) {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| anyhow!("{name}_{IMMEDIATE_KEY} must be true or false, got '{v}'"))?,
            None => false,
        };
        debug!(
            "Poller config for '{}': schedule={:?}ms, immediate={}",
            name,
            schedule.as_millis(),
            immediate
        );
        Ok(Self {
            schedule,
            immediate,
        })
    }
}

/// Where and how to reach the taxpayer API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub company_gstin: Option<String>,
    pub timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Reads the connection settings from the environment.
    ///
    /// # Environment variables
    ///
    /// * `TAXPAYER_API_BASE_URL`: required
    /// * `TAXPAYER_API_KEY`, `TAXPAYER_API_SECRET`: API token pair, both or neither
    /// * `COMPANY_GSTIN`: default company whose uploads are polled
    /// * `TAXPAYER_API_TIMEOUT_SECS`: per-request timeout
    pub fn from_env() -> Result<Self> {
        let base_url =
            env_value(BASE_URL_VAR).ok_or_else(|| anyhow!("{BASE_URL_VAR} is not set"))?;
        let timeout = match env_value(TIMEOUT_VAR) {
            Some(v) => Some(Duration::from_secs(v.parse::<u64>().map_err(|e| {
                anyhow!("{TIMEOUT_VAR} must be a number of seconds, got '{v}': {e}")
            })?)),
            None => None,
        };
        Ok(Self {
            base_url,
            api_key: env_value(API_KEY_VAR),
            api_secret: env_value(API_SECRET_VAR),
            company_gstin: env_value(COMPANY_GSTIN_VAR),
            timeout,
        })
    }

    pub fn build_client(&self) -> Result<Client> {
        let mut builder = ClientBuilder::new(self.base_url.as_str());
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) => {
                builder.with_api_token(key, secret);
            }
            (None, None) => {
                debug!("No API token configured for {}", self.base_url);
            }
            _ => bail!("{API_KEY_VAR} and {API_SECRET_VAR} must be set together"),
        }
        if let Some(timeout) = self.timeout {
            builder.with_timeout(timeout);
        }
        builder.build()
    }
}

fn env_value(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn lookup(name: &str, key: &str, path: &Path) -> Option<String> {
    env_value(&format!("{name}_{key}")).or_else(|| read_config_env_value(path, name, key))
}

fn read_config_env_value(path: &Path, name: &str, key: &str) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let root: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            debug!("Ignoring malformed config file {}: {}", path.display(), e);
            return None;
        }
    };
    let resources = root.get("resources")?.as_array()?;

    for r in resources {
        if r.get("name").and_then(|n| n.as_str()) != Some(name) {
            continue;
        }
        let v = r.get("environment")?.as_object()?.get(key)?;
        // Schedules may be written as a JSON array of milliseconds.
        let v = match v {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                .collect::<Vec<_>>()
                .join(","),
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };
        if v.is_empty() {
            return None;
        }
        return Some(v);
    }
    None
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
