//! Turns user intents into tool invocations
//!
//! Mutating tool commands request a status refresh once they succeed.
//! Identical commands already in flight are skipped.

use crate::runner::{shell_quote, CommandRunner, Launcher};
use crate::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Something the user asked for from the menu
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum Action {
    DisconnectAll,
    /// Opens an ssh session in a terminal
    Connect(String),
    Disconnect(String),
    /// Full URL including the scheme
    Open(String),
}

impl Action {
    /// Tool command for actions that go through the runner
    pub fn tool_command(&self) -> Option<String> {
        match self {
            Action::DisconnectAll => Some("disconnect --all".to_string()),
            Action::Disconnect(name) => Some(format!("disconnect {}", shell_quote(name))),
            Action::Connect(_) | Action::Open(_) => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::DisconnectAll => write!(f, "disconnect all"),
            Action::Connect(name) => write!(f, "connect {name}"),
            Action::Disconnect(name) => write!(f, "disconnect {name}"),
            Action::Open(url) => write!(f, "open {url}"),
        }
    }
}

/// What happened to a dispatched action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Tool command succeeded and a refresh was requested
    Refreshing,
    /// Launched; state changes show up on a later poll
    Launched,
    /// Same command was already running
    Skipped,
    /// Requested or finished after shutdown; ignored
    Discarded,
}

#[derive(Clone)]
pub struct Dispatcher {
    runner: Arc<dyn CommandRunner>,
    launcher: Arc<dyn Launcher>,
    refresh: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Removes a command from the in-flight set when dropped.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    command: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.command);
    }
}

impl Dispatcher {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        launcher: Arc<dyn Launcher>,
        refresh: Arc<Notify>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            runner,
            launcher,
            refresh,
            shutdown,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn claim(&self, command: &str) -> Option<InFlightGuard> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(command.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: self.in_flight.clone(),
            command: command.to_string(),
        })
    }

    /// Perform `action` and report what happened.
    pub async fn execute(&self, action: Action) -> Result<Outcome> {
        if self.is_shut_down() {
            debug!("Ignoring {} after shutdown", action);
            return Ok(Outcome::Discarded);
        }
        info!("Dispatching {}", action);

        match &action {
            Action::Connect(name) => {
                self.launcher.open_terminal(name)?;
                return Ok(Outcome::Launched);
            }
            Action::Open(url) => {
                self.launcher.open_url(url)?;
                return Ok(Outcome::Launched);
            }
            Action::DisconnectAll | Action::Disconnect(_) => {}
        }

        let Some(command) = action.tool_command() else {
            return Ok(Outcome::Launched);
        };
        let Some(_guard) = self.claim(&command) else {
            debug!("`{}` already in flight, skipping", command);
            return Ok(Outcome::Skipped);
        };

        self.runner.run(&command).await?;

        if self.is_shut_down() {
            debug!("`{}` finished after shutdown, ignoring", command);
            return Ok(Outcome::Discarded);
        }
        self.refresh.notify_one();
        Ok(Outcome::Refreshing)
    }

    /// Run `action` in the background, logging failures.
    pub fn dispatch(&self, action: Action) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.execute(action.clone()).await {
                warn!("{} failed: {}", action, e);
            }
        })
    }
}
