use std::env;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Brutal24Error;

pub const URL_ENV: &str = "BRUTAL24_SUPABASE_URL";
pub const KEY_ENV: &str = "BRUTAL24_SUPABASE_KEY";

fn default_sweep_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_key: Option<String>,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            sweep_interval_secs: default_sweep_interval(),
            notifications: true,
            offline: false,
        }
    }
}

pub fn config_path() -> Result<PathBuf, Brutal24Error> {
    Ok(dirs::home_dir()
        .ok_or_else(|| Brutal24Error::Config("Could not find home directory".to_string()))?
        .join(".config/brutal24/config.json"))
}

impl Config {
    /// Reads the config file (absent file means defaults), then applies
    /// environment overrides.
    pub fn load() -> Result<Self, Brutal24Error> {
        let mut config = Self::load_from(&config_path()?)?;
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, Brutal24Error> {
        if !path.exists() {
            log::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let file = File::open(path)
            .with_context(|| format!("Failed to open config file at {:?}", path))?;

        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .context("Failed to parse config JSON")?;

        Ok(config)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(URL_ENV) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = var(KEY_ENV) {
            self.supabase_key = Some(key);
        }
    }

    pub fn save(&self) -> Result<(), Brutal24Error> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Brutal24Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(&self)
            .context("Failed to serialize config to JSON")?;

        let mut file = File::create(path)
            .with_context(|| format!("Failed to open conf file for writing at {:?}", path))?;

        file.write_all(json.as_bytes())
            .context("Failed to write config data")?;

        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Project url and anon key, both required unless running offline.
    pub fn credentials(&self) -> Result<(&str, &str), Brutal24Error> {
        match (self.supabase_url.as_deref(), self.supabase_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Ok((url, key)),
            _ => Err(Brutal24Error::Config(format!(
                "Set supabase_url and supabase_key in {:?} (or {} / {}), or pass --offline",
                config_path().unwrap_or_default(),
                URL_ENV,
                KEY_ENV
            ))),
        }
    }
}
