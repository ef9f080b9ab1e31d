//! Engine configuration.
//!
//! TOML configuration loaded from `~/.vtgrid/config.toml`:
//!
//! ```toml
//! # Shell to launch (optional; defaults to $SHELL, then /bin/sh)
//! shell = "/bin/zsh"
//!
//! # Capability name exported as TERM to the child
//! term = "xterm-256color"
//! ```
//!
//! Any missing or unparsable file falls back to the defaults.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell command; `None` resolves through `$SHELL`.
    pub shell: Option<String>,
    /// Value exported as `TERM` to the child.
    pub term: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            term: "xterm-256color".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    /// Save configuration to file.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config path"))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The effective shell path: explicit config, then `$SHELL`, then
    /// `/bin/sh`.
    pub fn shell(&self) -> String {
        self.shell
            .clone()
            .or_else(|| env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }

    fn config_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".vtgrid").join("config.toml"))
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
