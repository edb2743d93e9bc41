use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

/// Root configuration structure, deserialized from `.license-locatr/config.toml`.
///
/// Consumed read-only by the dependency sources for the lifetime of one scan.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Absolute project root. Set from the scanned path, never from the file.
    #[serde(skip)]
    pub root: PathBuf,
    /// Directory searched for dependency manifests, relative to `root` unless
    /// absolute. Defaults to the root itself.
    pub pwd: Option<PathBuf>,
    /// Python-specific settings.
    #[serde(default)]
    pub python: PythonConfig,
}

/// Settings consumed by the pip source.
#[derive(Debug, Default, Deserialize)]
pub struct PythonConfig {
    /// Virtual environment directory holding the `pip` executable. Expanded
    /// against the project root; when unset the pip source stays disabled.
    pub virtual_env_dir: Option<String>,
}

impl Config {
    /// Effective working directory for manifest lookup.
    pub fn working_dir(&self) -> PathBuf {
        match &self.pwd {
            Some(pwd) if pwd.is_absolute() => pwd.clone(),
            Some(pwd) => self.root.join(pwd),
            None => self.root.clone(),
        }
    }
}

/// Load the scan configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.license-locatr/config.toml`
/// 3. `~/.config/license-locatr/config.toml`
/// 4. Built-in [`Config::default`] (no virtual environment configured, so the
///    pip source reports itself disabled)
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    let mut config = read_config(project_path, config_override)?;
    config.root = project_path.to_path_buf();
    Ok(config)
}

fn read_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        let content = std::fs::read_to_string(path)?;
        return Ok(toml::from_str(&content)?);
    }

    let project_config = project_path.join(".license-locatr").join("config.toml");
    if project_config.exists() {
        let content = std::fs::read_to_string(&project_config)?;
        return Ok(toml::from_str(&content)?);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("license-locatr")
            .join("config.toml");
        if home_config.exists() {
            let content = std::fs::read_to_string(&home_config)?;
            return Ok(toml::from_str(&content)?);
        }
    }

    Ok(Config::default())
}

/// Expand a configured path against the project root: absolute paths pass
/// through, a leading `~` resolves to the home directory, anything else is
/// taken as root-relative.
pub fn expand_path(path: &str, root: &Path) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
