//! User configuration file.
//!
//! # Responsibility
//! - Locate, read and atomically write the JSON configuration.
//! - Translate configuration into runtime settings (keymap, launch
//!   template, pending timeout, vault roots).
//!
//! # Invariants
//! - Loading never fails the application: problems come back next to a
//!   usable default configuration.
//! - Saves replace the file atomically.

use crate::handoff::{LaunchTemplate, ReintegratePolicy};
use crate::keymap::{Keymap, KeymapIssue, KeymapOverrides};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "BLOCKPAD_CONFIG_PATH";
const APP_DIR: &str = "blockpad";
const CONFIG_FILE: &str = "config.json";

/// Default pending-prefix timeout in milliseconds.
pub const DEFAULT_PENDING_TIMEOUT_MS: u64 = 2000;

#[derive(Debug)]
pub enum ConfigError {
    /// No config location could be derived from the environment.
    NoConfigDir,
    Io { path: PathBuf, source: io::Error },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoConfigDir => write!(
                f,
                "cannot locate config directory; set {CONFIG_PATH_ENV} or HOME"
            ),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoConfigDir => None,
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// External editor settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Editor argv; `{file}` marks the scratch path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Terminal argv; `{cmd}` marks the editor command. An empty list runs
    /// the editor without a terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<Vec<String>>,
    pub reintegrate: ReintegratePolicy,
}

/// Persisted application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub vaults: Vec<PathBuf>,
    pub keymap: KeymapOverrides,
    pub editor: EditorConfig,
    /// Pending-prefix timeout; `0` keeps prefixes until the next chord.
    pub pending_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vaults: Vec::new(),
            keymap: KeymapOverrides::default(),
            editor: EditorConfig::default(),
            pending_timeout_ms: DEFAULT_PENDING_TIMEOUT_MS,
            log_level: None,
            log_dir: None,
        }
    }
}

/// Loaded configuration plus the problem that forced defaults, if any.
#[derive(Debug)]
pub struct ConfigLoad {
    pub config: AppConfig,
    pub error: Option<ConfigError>,
}

impl AppConfig {
    pub fn pending_timeout(&self) -> Option<Duration> {
        (self.pending_timeout_ms > 0).then(|| Duration::from_millis(self.pending_timeout_ms))
    }

    /// Editor launch template; unset parts are discovered from the
    /// environment. A discovered terminal keeps the other detected
    /// terminals as fallbacks; a configured one is used alone.
    pub fn launch_template(&self) -> LaunchTemplate {
        let editor = self
            .editor
            .command
            .clone()
            .filter(|command| !command.is_empty())
            .unwrap_or_else(crate::handoff::default_editor_command);
        if let Some(terminal) = &self.editor.terminal {
            return LaunchTemplate::new(editor, terminal.clone());
        }
        let mut detected = crate::handoff::detect_terminal_commands();
        if detected.is_empty() {
            return LaunchTemplate::new(editor, Vec::new());
        }
        let primary = detected.remove(0);
        LaunchTemplate::new(editor, primary).with_fallback_terminals(detected)
    }

    pub fn resolve_keymap(&self) -> (Keymap, Vec<KeymapIssue>) {
        Keymap::resolve(&self.keymap)
    }

    /// Adds a vault root; returns `false` when it is already listed.
    pub fn add_vault(&mut self, root: impl Into<PathBuf>) -> bool {
        let root = root.into();
        if self.vaults.contains(&root) {
            return false;
        }
        self.vaults.push(root);
        true
    }
}

/// Config file location: `$BLOCKPAD_CONFIG_PATH`, else
/// `$XDG_CONFIG_HOME/blockpad/config.json`, else
/// `~/.config/blockpad/config.json`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = non_empty_var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    if let Some(base) = non_empty_var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(base).join(APP_DIR).join(CONFIG_FILE));
    }
    non_empty_var("HOME")
        .map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join(APP_DIR)
                .join(CONFIG_FILE)
        })
        .ok_or(ConfigError::NoConfigDir)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// Reads the config at `path`. A missing file yields defaults without
/// error; an unreadable or invalid file yields defaults plus the error.
pub fn load_config_from(path: &Path) -> ConfigLoad {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return ConfigLoad {
                config: AppConfig::default(),
                error: None,
            };
        }
        Err(source) => {
            warn!(
                "event=config_load module=config status=error path={} error={source}",
                path.display()
            );
            return ConfigLoad {
                config: AppConfig::default(),
                error: Some(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
            };
        }
    };
    match serde_json::from_str::<AppConfig>(&text) {
        Ok(config) => {
            info!(
                "event=config_load module=config status=ok path={} vaults={}",
                path.display(),
                config.vaults.len()
            );
            ConfigLoad {
                config,
                error: None,
            }
        }
        Err(source) => {
            warn!(
                "event=config_load module=config status=error path={} error={source}",
                path.display()
            );
            ConfigLoad {
                config: AppConfig::default(),
                error: Some(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }),
            }
        }
    }
}

/// Reads the config from [`config_path`].
pub fn load_config() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_from(&path),
        Err(err) => ConfigLoad {
            config: AppConfig::default(),
            error: Some(err),
        },
    }
}

/// Writes `config` to `path` through a temporary file in the same folder.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let io_err = |source: io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');

    let mut temp = NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(json.as_bytes()).map_err(io_err)?;
    temp.flush().map_err(io_err)?;
    temp.persist(path).map_err(|err| io_err(err.error))?;
    info!(
        "event=config_save module=config status=ok path={}",
        path.display()
    );
    Ok(())
}
