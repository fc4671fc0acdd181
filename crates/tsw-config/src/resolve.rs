//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI arguments → environment variables → XDG paths → defaults.

use std::path::{Path, PathBuf};

use tsw_common::{Error, Result};

use crate::denylist::Denylist;
use crate::settings::{ConfigOverrides, ConvertConfig};
use crate::validate::validate_config;

/// Discovered configuration file path.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to convert.json (or None if not found).
    pub convert: Option<PathBuf>,

    /// Source of the convert config (for diagnostics).
    pub convert_source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/tsw/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
const ENV_CONFIG_PATH: &str = "TSW_CONFIG";
const ENV_CONFIG_DIR: &str = "TSW_CONFIG_DIR";

/// Standard config file name.
const CONVERT_FILENAME: &str = "convert.json";

/// Application name for XDG directories.
const APP_NAME: &str = "tsw";

/// Resolve the convert.json path.
///
/// Resolution order:
/// 1. Explicit CLI path (if provided)
/// 2. TSW_CONFIG environment variable
/// 3. TSW_CONFIG_DIR environment variable + filename
/// 4. XDG config directory (~/.config/tsw/)
/// 5. System config (/etc/tsw/)
/// 6. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    let mut paths = ConfigPaths::default();
    paths.convert = resolve_single_config(
        cli_path,
        ENV_CONFIG_PATH,
        CONVERT_FILENAME,
        &mut paths.convert_source,
    );
    paths
}

fn resolve_single_config(
    cli_path: Option<&Path>,
    env_var: &str,
    filename: &str,
    source: &mut ConfigSource,
) -> Option<PathBuf> {
    // 1. CLI argument
    if let Some(path) = cli_path {
        if path.exists() {
            *source = ConfigSource::CliArgument;
            return Some(path.to_path_buf());
        }
    }

    // 2. Environment variable (direct path)
    if let Ok(env_path) = std::env::var(env_var) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            *source = ConfigSource::Environment;
            return Some(path);
        }
    }

    // 3. Environment variable (config dir)
    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(filename);
        if path.exists() {
            *source = ConfigSource::Environment;
            return Some(path);
        }
    }

    // 4. XDG config directory
    if let Some(xdg_config) = dirs::config_dir() {
        let path = xdg_config.join(APP_NAME).join(filename);
        if path.exists() {
            *source = ConfigSource::XdgConfig;
            return Some(path);
        }
    }

    // 5. System config
    let system_path = system_config_dir().join(filename);
    if system_path.exists() {
        *source = ConfigSource::SystemConfig;
        return Some(system_path);
    }

    *source = ConfigSource::BuiltinDefault;
    None
}

/// Get the XDG config directory for tsw.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

/// Fully resolved and validated settings.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ConvertConfig,

    /// File the settings came from, if any.
    pub path: Option<PathBuf>,

    pub source: ConfigSource,
}

impl ResolvedConfig {
    /// Inline `remove` list unioned with the denylist file, if one is set.
    pub fn denylist(&self) -> Result<Denylist> {
        let mut denylist = Denylist::from_keys(&self.config.remove)?;
        if let Some(ref path) = self.config.denylist {
            denylist.extend(Denylist::load(path)?);
        }
        Ok(denylist)
    }
}

/// Resolve, load, override, and validate the conversion settings.
///
/// An explicit CLI path that does not exist is an error rather than a
/// silent fall-through to defaults.
pub fn load_config(cli_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
    }

    let paths = resolve_config(cli_path);
    let mut config = match paths.convert {
        Some(ref path) => ConvertConfig::load(path)?,
        None => ConvertConfig::default(),
    };
    config.apply_overrides(overrides);
    validate_config(&config)?;

    tracing::debug!(
        source = %paths.convert_source,
        path = ?paths.convert,
        source_version = %config.source_version,
        merge_policy = %config.merge_policy,
        "conversion settings resolved"
    );

    Ok(ResolvedConfig {
        config,
        path: paths.convert,
        source: paths.convert_source,
    })
}
