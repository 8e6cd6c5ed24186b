use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use nowcast_core::{AllowList, ALLOW_ENV};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cli::Args;
use crate::error::BridgeError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "PORT";

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub filter: FilterConfig,
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub public_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub allow: Vec<String>,
}

impl FilterConfig {
    pub fn policy(&self) -> AllowList {
        AllowList::parse(Some(&self.allow.join(",")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Explicit watcher executable; skips the candidate search when set.
    pub path: Option<PathBuf>,
    pub restart_delay_secs: u64,
}

impl WatcherConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// When set, logs are also written to a daily-rotated file here.
    pub directory: Option<PathBuf>,
}

impl BridgeConfig {
    /// Load config: `explicit` (or the user file, if it exists) merged over
    /// the built-in defaults. User files may be partial.
    pub fn load(explicit: Option<&Path>) -> Result<Self, BridgeError> {
        let user_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path().filter(|p| p.exists()),
        };

        match user_path {
            Some(path) => {
                let user_str = std::fs::read_to_string(&path).map_err(|e| {
                    BridgeError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_overlay(&user_str)
            }
            None => Self::from_overlay(""),
        }
    }

    /// Parse `overlay` as TOML and merge it table-by-table over the defaults.
    pub fn from_overlay(overlay: &str) -> Result<Self, BridgeError> {
        let mut base: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| BridgeError::Config(e.to_string()))?;
        let user: toml::Table =
            toml::from_str(overlay).map_err(|e| BridgeError::Config(e.to_string()))?;
        merge(&mut base, user);
        toml::Value::Table(base)
            .try_into()
            .map_err(|e: toml::de::Error| BridgeError::Config(e.to_string()))
    }

    /// Apply `PORT` and `YM_ALLOW`. Unparseable ports are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(PORT_ENV) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %raw, "ignoring invalid {PORT_ENV}"),
            }
        }
        if let Some(raw) = lookup(ALLOW_ENV) {
            self.filter.allow = AllowList::parse(Some(&raw)).patterns().to_vec();
        }
    }

    /// Apply command-line overrides; these win over everything else.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(dir) = &args.public_dir {
            self.server.public_dir = dir.clone();
        }
        if let Some(path) = &args.watcher {
            self.watcher.path = Some(path.clone());
        }
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "nowcast").map(|d| d.config_dir().join("config.toml"))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let value = match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(dst)), toml::Value::Table(src)) => {
                merge(dst, src);
                continue;
            }
            (_, value) => value,
        };
        base.insert(key, value);
    }
}
