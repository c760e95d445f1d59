//! Layered TOML configuration for mcpipe.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > project file > global file > defaults

use mcpipe_mcp::{ClientInfo, IdCheck, McpServerConfig, PROTOCOL_VERSION, StderrMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Server launched when nothing else is configured.
pub const DEFAULT_COMMAND: &str = "python";
pub const DEFAULT_ARGS: &[&str] = &["weather.py"];

/// Name of the per-project config file, looked up in the working directory.
pub const PROJECT_FILE: &str = "mcpipe.toml";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct McpipeConfig {
    pub server: McpServerConfig,
    pub client: ClientInfo,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub client: ClientSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub stderr: Option<StderrMode>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSettings {
    pub name: Option<String>,
    pub version: Option<String>,
    pub protocol_version: Option<String>,
    pub strict_ids: Option<bool>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Use this file instead of the project and global files.
    pub config_path: Option<PathBuf>,
    /// Server command; when set, `args` replaces any configured arguments.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub stderr: Option<StderrMode>,
    pub timeout_ms: Option<u64>,
    pub strict_ids: bool,
}

impl McpipeConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`MCPIPE_COMMAND`, `MCPIPE_PROTOCOL_VERSION`)
    /// 3. Project config (./mcpipe.toml)
    /// 4. Global config (~/.mcpipe/config.toml)
    /// 5. Defaults
    ///
    /// An explicit `--config` path replaces 3 and 4 and must exist.
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let layers = match &overrides.config_path {
            Some(path) => vec![read_settings_file(path)?],
            None => vec![
                load_settings_file(&config_dir().join("config.toml")),
                load_settings_file(Path::new(PROJECT_FILE)),
            ],
        };
        Self::resolve(overrides, &layers, |key| std::env::var(key).ok())
    }

    /// Merge `layers` (lowest precedence first) with env and CLI overrides.
    pub fn resolve(
        overrides: CliOverrides,
        layers: &[SettingsFile],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut file = SettingsFile::default();
        for layer in layers {
            file.merge(layer.clone());
        }

        // Command and its arguments always come from the same source.
        let (command, args) = if let Some(command) = overrides.command {
            (command, overrides.args)
        } else if let Some(line) = env("MCPIPE_COMMAND") {
            let mut parts = line.split_whitespace().map(str::to_string);
            let command = parts.next().ok_or_else(|| ConfigError::InvalidValue {
                key: "MCPIPE_COMMAND".into(),
                message: "empty command".into(),
            })?;
            (command, parts.collect())
        } else if let Some(command) = file.server.command {
            (command, file.server.args.unwrap_or_default())
        } else {
            let args = file
                .server
                .args
                .unwrap_or_else(|| DEFAULT_ARGS.iter().map(|s| s.to_string()).collect());
            (DEFAULT_COMMAND.to_string(), args)
        };

        if command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "server.command".into(),
                message: "empty command".into(),
            });
        }

        let timeout_ms = overrides.timeout_ms.or(file.server.timeout_ms);
        if timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "server.timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }

        let server = McpServerConfig {
            command,
            args,
            env: file.server.env,
            cwd: file.server.cwd,
            stderr: overrides.stderr.or(file.server.stderr).unwrap_or_default(),
            timeout_ms,
        };

        let defaults = ClientInfo::default();
        let strict = overrides.strict_ids || file.client.strict_ids.unwrap_or(false);
        let client = ClientInfo {
            name: file.client.name.unwrap_or(defaults.name),
            version: file.client.version.unwrap_or(defaults.version),
            protocol_version: env("MCPIPE_PROTOCOL_VERSION")
                .or(file.client.protocol_version)
                .unwrap_or_else(|| PROTOCOL_VERSION.to_string()),
            id_check: if strict { IdCheck::Strict } else { IdCheck::Warn },
        };

        Ok(McpipeConfig { server, client })
    }
}

impl SettingsFile {
    /// Overlay `other` on top of `self`. Set fields in `other` win; `env`
    /// tables are merged key by key.
    fn merge(&mut self, other: SettingsFile) {
        if other.server.command.is_some() {
            self.server.command = other.server.command;
            self.server.args = other.server.args;
        } else if other.server.args.is_some() {
            self.server.args = other.server.args;
        }
        self.server.env.extend(other.server.env);
        self.server.cwd = other.server.cwd.or(self.server.cwd.take());
        self.server.stderr = other.server.stderr.or(self.server.stderr);
        self.server.timeout_ms = other.server.timeout_ms.or(self.server.timeout_ms);

        self.client.name = other.client.name.or(self.client.name.take());
        self.client.version = other.client.version.or(self.client.version.take());
        self.client.protocol_version = other
            .client
            .protocol_version
            .or(self.client.protocol_version.take());
        self.client.strict_ids = other.client.strict_ids.or(self.client.strict_ids);
    }
}

/// Get the mcpipe config directory path (~/.mcpipe/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MCPIPE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcpipe")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match read_settings_file(path) {
        Ok(settings) => settings,
        Err(ConfigError::Read { .. }) => SettingsFile::default(),
        Err(e) => {
            tracing::warn!("{e}");
            SettingsFile::default()
        }
    }
}

/// Load and parse a TOML settings file that must exist.
fn read_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
