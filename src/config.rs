//! Persistent application settings (`config.json`).
//!
//! Only the CA-installed flag and the proxy port matter to this crate; the
//! filter lists are carried along so that saving does not drop them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.json";
const APP_DIR: &str = "zen";
const DEFAULT_CONFIG: &str = include_str!("default-config.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterList {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSection {
    #[serde(default)]
    pub filter_lists: Vec<FilterList>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertManagerSection {
    #[serde(default)]
    pub ca_installed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySection {
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filter: FilterSection,
    #[serde(default)]
    pub certmanager: CertManagerSection,
    #[serde(default)]
    pub proxy: ProxySection,
    #[serde(skip)]
    config_dir: PathBuf,
}

/// `<platform config dir>/zen`.
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| Error::Config("no configuration directory on this platform".to_string()))
}

impl Config {
    /// Reads `config.json` from `config_dir`, creating the directory and
    /// writing the built-in defaults first if the file does not exist yet.
    pub fn load_or_init(config_dir: impl AsRef<Path>) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        std::fs::create_dir_all(config_dir)?;

        let file = config_dir.join(CONFIG_FILE);
        let data = if file.exists() {
            std::fs::read_to_string(&file)?
        } else {
            log::debug!("writing default configuration to {}", file.display());
            std::fs::write(&file, DEFAULT_CONFIG)?;
            DEFAULT_CONFIG.to_string()
        };

        let mut config: Config = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("{}: {}", file.display(), e)))?;
        config.config_dir = config_dir.to_path_buf();

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let data =
            serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(self.config_dir.join(CONFIG_FILE), data)?;
        Ok(())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn ca_installed(&self) -> bool {
        self.certmanager.ca_installed
    }

    pub fn set_ca_installed(&mut self, installed: bool) {
        self.certmanager.ca_installed = installed;
    }

    pub fn port(&self) -> u16 {
        self.proxy.port
    }
}
