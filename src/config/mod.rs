//! Shell configuration loaded from a key=value file.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Configuration for one shell session.
///
/// The file holds one `key = value` pair per line. `#` starts a comment,
/// blank lines are skipped, and a key repeated later in the file overwrites
/// the earlier value.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            debug!(
                "No config file at {}; using defaults",
                config_path.display()
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file '{}'", path.as_ref().display()))?;

        Ok(Self::parse(&contents))
    }

    /// Get default configuration path.
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;

        Ok(home.join(".crucible").join("config.conf"))
    }

    fn parse(contents: &str) -> Self {
        let mut values = HashMap::new();
        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            values.insert(key.to_string(), value.trim().to_string());
        }
        Self { values }
    }

    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Prompt shown by the interactive shell.
    #[must_use]
    pub fn prompt(&self) -> String {
        self.get_string("prompt", "[crucible]> ")
    }

    /// Per-call execution cap for script plugins and the `lua` command.
    ///
    /// `script_budget_ms = 0` (the default) disables the cap.
    #[must_use]
    pub fn script_budget(&self) -> Option<Duration> {
        let millis = self.get_int("script_budget_ms", 0);
        (millis > 0).then(|| Duration::from_millis(millis as u64))
    }

    /// Plugins to load on startup, from the comma-separated
    /// `startup_plugins` key.
    #[must_use]
    pub fn startup_plugins(&self) -> Vec<String> {
        self.get_string("startup_plugins", "")
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }
}
