//! Configuration for the portal client
//!
//! Load order: built-in defaults, then the TOML file (explicit path or
//! `<config dir>/portal-batch/config.toml`), then `PORTAL_BATCH_*` environment
//! variables.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::constants::MAX_BATCH_COMMANDS;
use crate::api::mutation::MutationChunking;

pub const ENV_WEBHOOK_URL: &str = "PORTAL_BATCH_WEBHOOK_URL";
pub const ENV_TIMEOUT_SECS: &str = "PORTAL_BATCH_TIMEOUT_SECS";
pub const ENV_CAPACITY: &str = "PORTAL_BATCH_CAPACITY";
pub const ENV_MUTATION_CHUNKING: &str = "PORTAL_BATCH_MUTATION_CHUNKING";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub http: HttpConfig,
    pub batch: BatchOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Inbound webhook base, e.g. `https://example.bitrix24.com/rest/1/<secret>`
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("portal-batch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Engine options shared by traversals and mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Commands per physical call, at most the portal's limit of 50
    pub capacity: usize,
    pub mutation_chunking: MutationChunking,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            capacity: MAX_BATCH_COMMANDS,
            mutation_chunking: MutationChunking::Reject,
        }
    }
}

impl BatchOptions {
    pub fn builder() -> BatchOptionsBuilder {
        BatchOptionsBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_COMMANDS).contains(&self.capacity) {
            bail!(
                "batch.capacity must be between 1 and {}, got {}",
                MAX_BATCH_COMMANDS,
                self.capacity
            );
        }
        Ok(())
    }
}

/// Builder for BatchOptions
#[derive(Debug)]
pub struct BatchOptionsBuilder {
    options: BatchOptions,
}

impl BatchOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: BatchOptions::default(),
        }
    }

    /// Set commands per physical call
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.options.capacity = capacity;
        self
    }

    /// Set the policy for mutations larger than one batch
    pub fn mutation_chunking(mut self, chunking: MutationChunking) -> Self {
        self.options.mutation_chunking = chunking;
        self
    }

    /// Build the options, rejecting an out-of-range capacity
    pub fn build(self) -> Result<BatchOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

impl Default for BatchOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("portal-batch").join("config.toml"))
    }

    /// Defaults, file, then process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override settings from `PORTAL_BATCH_*` variables found by `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_WEBHOOK_URL).filter(|url| !url.trim().is_empty()) {
            self.portal.webhook_url = Some(url);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            self.http.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))?;
        }
        if let Some(capacity) = lookup(ENV_CAPACITY) {
            self.batch.capacity = capacity
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer", ENV_CAPACITY))?;
        }
        if let Some(chunking) = lookup(ENV_MUTATION_CHUNKING) {
            self.batch.mutation_chunking = chunking
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("Invalid {}", ENV_MUTATION_CHUNKING))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.batch.validate()?;
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
