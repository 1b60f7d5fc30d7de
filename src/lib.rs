//! sdm-indicator - status indicator for the sdm access-management CLI
//!
//! Polls `sdm status`, parses the output into a sectioned resource model
//! and projects it into a toolkit-independent menu:
//! - Connect and disconnect servers and datasources
//! - Disconnect everything at once
//! - Open websites exposed through the gateway

pub mod dispatcher;
pub mod indicator;
pub mod menu;
pub mod model;
pub mod runner;
pub mod status;
pub mod store;

pub use dispatcher::{Action, Dispatcher, Outcome};
pub use indicator::Indicator;
pub use menu::{Menu, MenuEntry, MenuItem};
pub use model::{Entry, ResourceModel, Section, SectionKind};
pub use runner::{CommandRunner, Launcher, ShellRunner, SystemLauncher};
pub use status::{LineError, StatusParser};
pub use store::ModelStore;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorConfig {
    /// Access-management CLI, invoked as `<tool> <command>`
    pub tool: String,

    /// Shell used to run tool commands
    pub shell: String,

    /// Time between status polls
    pub poll_interval: Duration,

    /// Upper bound for a single tool invocation
    pub command_timeout: Duration,

    /// Terminal launcher prefix; `<tool> ssh <name>` is appended
    pub terminal: Vec<String>,

    /// URL opener prefix; the url is appended
    pub opener: Vec<String>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            tool: "sdm".to_string(),
            shell: "bash".to_string(),
            poll_interval: Duration::from_secs(30),
            command_timeout: Duration::from_secs(30),
            terminal: vec!["gnome-terminal".to_string(), "--".to_string()],
            opener: vec!["gio".to_string(), "open".to_string()],
        }
    }
}

/// On-disk form of [`IndicatorConfig`]; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    tool: Option<String>,
    shell: Option<String>,
    poll_interval_secs: Option<u64>,
    command_timeout_secs: Option<u64>,
    terminal: Option<Vec<String>>,
    opener: Option<Vec<String>>,
}

impl IndicatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config_dir>/sdm-indicator/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sdm-indicator").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when absent.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IndicatorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigToml = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(tool) = file.tool {
            config = config.with_tool(tool);
        }
        if let Some(shell) = file.shell {
            config.shell = shell;
        }
        if let Some(secs) = file.poll_interval_secs {
            config = config.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = file.command_timeout_secs {
            config = config.with_command_timeout(Duration::from_secs(secs));
        }
        if let Some(terminal) = file.terminal {
            config.terminal = terminal;
        }
        if let Some(opener) = file.opener {
            config.opener = opener;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tool.trim().is_empty() {
            return Err(IndicatorError::Config("tool must not be empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(IndicatorError::Config(
                "poll interval must be at least one second".to_string(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(IndicatorError::Config(
                "command timeout must be at least one second".to_string(),
            ));
        }
        if self.terminal.is_empty() || self.opener.is_empty() {
            return Err(IndicatorError::Config(
                "terminal and opener must name a program".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result type for indicator operations
pub type Result<T> = std::result::Result<T, IndicatorError>;

/// Errors that can occur in the indicator
#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    #[error("`{command}` exited with {}: {stderr}", .code.map_or("signal".to_string(), |c| format!("status {c}")))]
    ToolFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_overrides_defaults() {
        let config = IndicatorConfig::from_toml(
            r#"
            tool = "/opt/sdm/bin/sdm"
            poll_interval_secs = 60
            terminal = ["alacritty", "-e"]
            "#,
        )
        .unwrap();

        assert_eq!(config.tool, "/opt/sdm/bin/sdm");
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.terminal, vec!["alacritty", "-e"]);
        assert_eq!(config.opener, vec!["gio", "open"]);
        assert_eq!(config.command_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(IndicatorConfig::from_toml("").unwrap(), IndicatorConfig::default());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = IndicatorConfig::from_toml("poll_interval_secs = 0").unwrap_err();
        assert!(matches!(err, IndicatorError::Config(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = IndicatorConfig::from_toml("intervall = 5").unwrap_err();
        assert!(matches!(err, IndicatorError::Toml(_)));
    }

    #[test]
    fn test_tool_failed_message() {
        let err = IndicatorError::ToolFailed {
            command: "sdm disconnect web".to_string(),
            code: Some(1),
            stderr: "not logged in".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`sdm disconnect web` exited with status 1: not logged in"
        );
    }
}
