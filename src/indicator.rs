//! Indicator lifecycle and the poll-parse-publish loop
//!
//! The host creates an [`Indicator`], calls [`Indicator::start`] when it is
//! enabled and [`Indicator::stop`] when it is torn down. Menu updates are
//! observed through [`Indicator::subscribe`] and built with
//! [`Indicator::render`].

use crate::dispatcher::{Action, Dispatcher};
use crate::menu::{self, Menu};
use crate::model::ResourceModel;
use crate::runner::{CommandRunner, Launcher, ShellRunner, SystemLauncher};
use crate::status::{self, StatusParser};
use crate::store::ModelStore;
use crate::{IndicatorConfig, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const STATUS_COMMAND: &str = "status";

pub struct Indicator {
    config: IndicatorConfig,
    runner: Arc<dyn CommandRunner>,
    store: ModelStore,
    refresh: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    dispatcher: Dispatcher,
    task: Option<JoinHandle<()>>,
}

impl Indicator {
    /// Indicator talking to the real tool and desktop
    pub fn new(config: IndicatorConfig) -> Result<Self> {
        let runner = Arc::new(ShellRunner::new(&config));
        let launcher = Arc::new(SystemLauncher::new(&config));
        Self::with_backends(config, runner, launcher)
    }

    /// Fails with [`IndicatorError::Config`](crate::IndicatorError::Config)
    /// when `config` does not validate.
    pub fn with_backends(
        config: IndicatorConfig,
        runner: Arc<dyn CommandRunner>,
        launcher: Arc<dyn Launcher>,
    ) -> Result<Self> {
        config.validate()?;
        let refresh = Arc::new(Notify::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(runner.clone(), launcher, refresh.clone(), shutdown_rx);

        Ok(Self {
            config,
            runner,
            store: ModelStore::new(),
            refresh,
            shutdown,
            dispatcher,
            task: None,
        })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Spawn the poll loop. The first poll happens immediately.
    ///
    /// Must be called from within a tokio runtime. An indicator that was
    /// stopped cannot be started again.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        if *self.shutdown.borrow() {
            warn!("Indicator already stopped, not restarting");
            return;
        }

        info!(
            "Starting indicator for `{}`, polling every {}s",
            self.config.tool,
            self.config.poll_interval.as_secs_f32()
        );
        let poll_loop = PollLoop {
            runner: self.runner.clone(),
            parser: StatusParser::new(),
            store: self.store.clone(),
            refresh: self.refresh.clone(),
            shutdown: self.shutdown.subscribe(),
            interval: self.config.poll_interval,
        };
        self.task = Some(tokio::spawn(poll_loop.run()));
    }

    /// Stop polling. A poll already running is left to finish but its
    /// result is dropped.
    pub fn stop(&mut self) {
        self.shutdown.send_replace(true);
        if self.task.take().is_some() {
            info!("Indicator stopped");
        }
    }

    /// Poll again now instead of waiting for the next tick.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run a menu action in the background.
    pub fn dispatch(&self, action: Action) -> JoinHandle<()> {
        self.dispatcher.dispatch(action)
    }

    pub fn model(&self) -> Arc<ResourceModel> {
        self.store.current()
    }

    /// Changes whenever a poll produced a different model.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ResourceModel>> {
        self.store.subscribe()
    }

    pub fn render(&self) -> Menu {
        menu::render(&self.model())
    }
}

impl Drop for Indicator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run `<tool> status` once and parse it without any change tracking.
pub async fn fetch_status(runner: &dyn CommandRunner) -> Result<ResourceModel> {
    let raw = runner.run(STATUS_COMMAND).await?;
    let parsed = status::parse_status(&status::normalize_status(&raw));
    for issue in &parsed.issues {
        warn!("Malformed status line skipped: {}", issue);
    }
    Ok(parsed.model)
}

/// Owned by the spawned task; polls never overlap because they run
/// sequentially here.
struct PollLoop {
    runner: Arc<dyn CommandRunner>,
    parser: StatusParser,
    store: ModelStore,
    refresh: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
    interval: Duration,
}

impl PollLoop {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {}
                _ = self.refresh.notified() => {
                    debug!("Refresh requested");
                    ticker.reset();
                }
            }
            if *self.shutdown.borrow() {
                break;
            }

            match self.poll().await {
                Ok(true) => debug!("Status changed, model replaced"),
                Ok(false) => {}
                // Next tick retries
                Err(e) => warn!("Status poll failed: {}", e),
            }
        }
        debug!("Poll loop exited");
    }

    async fn poll(&mut self) -> Result<bool> {
        let raw = self.runner.run(STATUS_COMMAND).await?;
        if *self.shutdown.borrow() {
            debug!("Status arrived after shutdown, ignoring");
            return Ok(false);
        }

        match self.parser.parse(&raw) {
            Some(model) => {
                self.store.publish(model);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
