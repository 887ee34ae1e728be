use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tally_client::RetryPolicy;

use crate::home::ensure_tally_home;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub budget: BudgetSection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSection {
    pub budget_id: String,
    pub lookback_days: u32,
    pub base_url: String,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            budget_id: "last-used".to_string(),
            lookback_days: 7,
            base_url: tally_client::budget::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            model: tally_client::model::DEFAULT_MODEL.to_string(),
            base_url: tally_client::model::DEFAULT_BASE_URL.to_string(),
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSection {
    pub channel: String,
    pub base_url: String,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            channel: "#budget-review".to_string(),
            base_url: tally_client::channel::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Retry/backoff knobs. The defaults are a starting contract (see DESIGN.md);
/// deployments tune them here rather than in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(toml::from_str(&s).context("parse config.toml")?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
