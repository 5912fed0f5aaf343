// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use pedidos_app::{DEFAULT_SEARCH_DEBOUNCE, ObservationsStep};
use pedidos_tui::{DEFAULT_STATUS_TIMEOUT, WizardOptions};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "pedidos";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_TOKEN_ENV: &str = "PEDIDOS_TOKEN";
const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_PATH_ENV: &str = "PEDIDOS_CONFIG_PATH";
const API_URL_ENV: &str = "PEDIDOS_API_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub wizard: Wizard,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            ui: Ui::default(),
            wizard: Wizard::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub search_debounce: Option<String>,
    pub status_timeout: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            search_debounce: Some("300ms".to_owned()),
            status_timeout: Some("4s".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Wizard {
    pub observations_step: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub path: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [api], [ui], [wizard] and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.api.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            bail!(
                "api.base_url in {} must start with http:// or https://, got {base_url:?}",
                path.display()
            );
        }

        let durations = [
            ("api.timeout", &self.api.timeout),
            ("ui.status_timeout", &self.ui.status_timeout),
        ];
        for (key, value) in durations {
            if let Some(raw) = value {
                let parsed = parse_duration(raw)?;
                if parsed <= Duration::ZERO {
                    bail!(
                        "{key} in {} must be positive, got {raw}",
                        path.display()
                    );
                }
            }
        }
        if let Some(raw) = &self.ui.search_debounce {
            parse_duration(raw).with_context(|| format!("ui.search_debounce in {}", path.display()))?;
        }

        if let Some(step) = &self.wizard.observations_step
            && ObservationsStep::parse(step).is_none()
        {
            bail!(
                "wizard.observations_step in {} must be \"products\" or \"address\", got {step:?}",
                path.display()
            );
        }

        if let Some(token_env) = &self.api.token_env
            && token_env.trim().is_empty()
        {
            bail!("api.token_env in {} must not be empty", path.display());
        }

        Ok(())
    }

    /// Config value first, then `PEDIDOS_API_URL`, then the built-in default.
    pub fn api_base_url(&self) -> String {
        let raw = match &self.api.base_url {
            Some(url) => url.clone(),
            None => env::var(API_URL_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| pedidos_api::DEFAULT_BASE_URL.to_owned()),
        };
        raw.trim_end_matches('/').to_owned()
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        match &self.api.timeout {
            Some(raw) => parse_duration(raw),
            None => Ok(pedidos_api::DEFAULT_TIMEOUT),
        }
    }

    pub fn token_env(&self) -> &str {
        self.api.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV)
    }

    pub fn search_debounce(&self) -> Result<Duration> {
        match &self.ui.search_debounce {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_SEARCH_DEBOUNCE),
        }
    }

    pub fn status_timeout(&self) -> Result<Duration> {
        match &self.ui.status_timeout {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_STATUS_TIMEOUT),
        }
    }

    pub fn observations_step(&self) -> ObservationsStep {
        self.wizard
            .observations_step
            .as_deref()
            .and_then(ObservationsStep::parse)
            .unwrap_or_default()
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log.path {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].path in the config file")
        })?;
        Ok(data_root.join(APP_NAME).join("pedidos.log"))
    }

    pub fn wizard_options(&self, signed_in_as: Option<String>) -> Result<WizardOptions> {
        Ok(WizardOptions {
            search_debounce: self.search_debounce()?,
            status_timeout: self.status_timeout()?,
            observations_step: self.observations_step(),
            signed_in_as,
        })
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# pedidos config\n# Place this file at: {}\n\nversion = 1\n\n[api]\n# Overridden by {API_URL_ENV} when unset here.\nbase_url = \"{}\"\ntimeout = \"10s\"\n# Environment variable holding the bearer token.\ntoken_env = \"{DEFAULT_TOKEN_ENV}\"\n\n[ui]\nsearch_debounce = \"300ms\"\nstatus_timeout = \"4s\"\n\n[wizard]\n# Step that records order observations: \"products\" or \"address\".\nobservations_step = \"products\"\n\n[log]\nlevel = \"{DEFAULT_LOG_LEVEL}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/pedidos/pedidos.log)\n# path = \"/absolute/path/to/pedidos.log\"\n",
            path.display(),
            pedidos_api::DEFAULT_BASE_URL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 300ms or 10s)")
}
