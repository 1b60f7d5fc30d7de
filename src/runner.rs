//! Process invocation for the access-management CLI
//!
//! Tool commands go through a shell as `<tool> <command>` with stdout and
//! stderr captured. Terminal and URL launches are fire-and-forget.

use crate::{IndicatorConfig, IndicatorError, Result};
use futures::future::BoxFuture;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `<tool> <command>` and yields captured stdout on success.
///
/// A non-zero exit is an error carrying stderr; callers must not treat
/// the command as completed in that case.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Side effects that leave the tool's captured output alone
pub trait Launcher: Send + Sync {
    /// Start an interactive `<tool> ssh <resource>` session in a terminal.
    fn open_terminal(&self, resource: &str) -> Result<()>;

    /// Hand a URL to the desktop's default handler.
    fn open_url(&self, url: &str) -> Result<()>;
}

/// [`CommandRunner`] backed by a real shell
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    tool: String,
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            tool: config.tool.clone(),
            timeout: config.command_timeout,
        }
    }

    async fn execute(&self, command: &str) -> Result<String> {
        let full = format!("{} {}", self.tool, command);
        debug!("Running `{}`", full);

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(&full)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| IndicatorError::Spawn {
                program: self.shell.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(IndicatorError::Timeout {
                    command: full,
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(IndicatorError::ToolFailed {
                command: full,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CommandRunner for ShellRunner {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.execute(command))
    }
}

/// [`Launcher`] spawning the configured terminal and opener programs
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    tool: String,
    terminal: Vec<String>,
    opener: Vec<String>,
}

impl SystemLauncher {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            tool: config.tool.clone(),
            terminal: config.terminal.clone(),
            opener: config.opener.clone(),
        }
    }

    pub fn terminal_argv(&self, resource: &str) -> Vec<String> {
        let mut argv = self.terminal.clone();
        argv.extend([self.tool.clone(), "ssh".to_string(), resource.to_string()]);
        argv
    }

    pub fn opener_argv(&self, url: &str) -> Vec<String> {
        let mut argv = self.opener.clone();
        argv.push(url.to_string());
        argv
    }
}

impl Launcher for SystemLauncher {
    fn open_terminal(&self, resource: &str) -> Result<()> {
        spawn_detached(&self.terminal_argv(resource))
    }

    fn open_url(&self, url: &str) -> Result<()> {
        spawn_detached(&self.opener_argv(url))
    }
}

/// Spawn without waiting; exit status is only logged.
fn spawn_detached(argv: &[String]) -> Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| IndicatorError::Config("empty launcher command".to_string()))?;

    debug!("Launching {:?}", argv);
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| IndicatorError::Spawn {
            program: program.clone(),
            source,
        })?;

    let program = program.clone();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if !status.success() => warn!("{} exited with {}", program, status),
            Ok(_) => {}
            Err(e) => warn!("Failed to wait for {}: {}", program, e),
        }
    });
    Ok(())
}

/// Quote an argument for `sh -c`; plain identifiers pass through unchanged.
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.:@/+=".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
