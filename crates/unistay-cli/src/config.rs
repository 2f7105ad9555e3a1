use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProfileConfig {
    pub api: Option<String>,
    pub format: Option<String>,
}

pub type ConfigFile = HashMap<String, ProfileConfig>;

/// `~/.unistay`, created on first use.
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("Cannot determine home directory")?
        .join(".unistay");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Profile configuration stored in `<dir>/config.toml`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join("config.toml"),
        }
    }

    pub fn load_all(&self) -> Result<ConfigFile> {
        if !self.path.exists() {
            return Ok(ConfigFile::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let cfg: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", self.path.display()))?;
        Ok(cfg)
    }

    pub fn load_profile(&self, profile: &str) -> Result<ProfileConfig> {
        Ok(self.load_all()?.remove(profile).unwrap_or_default())
    }

    pub fn save_profile(&self, profile: &str, config: &ProfileConfig) -> Result<()> {
        let mut all = self.load_all()?;
        all.insert(profile.to_string(), config.clone());
        let content = toml::to_string_pretty(&all)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Backend URL for `profile`.
///
/// 1. `--api` flag / `UNISTAY_API_URL` env
/// 2. `config.toml` profile
/// 3. The URL the stored session was obtained from
pub fn resolve_api(
    cli_api: Option<&str>,
    profile_cfg: &ProfileConfig,
    session_api: Option<&str>,
) -> Result<String> {
    cli_api
        .or(profile_cfg.api.as_deref())
        .or(session_api)
        .map(str::to_string)
        .context(
            "No API URL configured. Use --api, set UNISTAY_API_URL, or run: unistay config set api <url>",
        )
}
