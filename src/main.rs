//! sdm-indicator CLI
//!
//! Terminal host for the indicator: prints the menu and forwards actions.

use clap::{Parser, Subcommand};
use sdm_indicator::indicator::fetch_status;
use sdm_indicator::{menu, Action, Indicator, IndicatorConfig, Menu, MenuEntry, Outcome, ShellRunner};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Status indicator for the sdm access-management CLI
#[derive(Parser, Debug)]
#[command(name = "sdm-indicator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/sdm-indicator/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Access-management tool to invoke
    #[arg(long)]
    tool: Option<String>,

    /// Seconds between status polls
    #[arg(long)]
    interval: Option<u64>,

    /// Verbose output: debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll once and print the menu
    Status {
        /// Print the menu as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep polling, print the menu on every change and accept commands on stdin
    Watch {
        /// Print the menu as JSON
        #[arg(long)]
        json: bool,
    },
    /// Open an ssh session to a server in a terminal
    Connect { name: String },
    /// Disconnect one resource, or all of them
    Disconnect {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        name: Option<String>,

        #[arg(long)]
        all: bool,
    },
    /// Open a website in the default browser
    Open { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Command::Status { json } => run_status(config, json).await,
        Command::Watch { json } => run_watch(config, json).await,
        Command::Connect { name } => run_action(config, Action::Connect(name)).await,
        Command::Disconnect { name, all } => {
            let action = match name {
                Some(name) if !all => Action::Disconnect(name),
                _ => Action::DisconnectAll,
            };
            run_action(config, action).await
        }
        Command::Open { url } => run_action(config, Action::Open(url)).await,
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<IndicatorConfig> {
    let mut config = match &cli.config {
        Some(path) => IndicatorConfig::load(path)?,
        None => IndicatorConfig::load_default()?,
    };

    if let Some(tool) = &cli.tool {
        config = config.with_tool(tool.clone());
    }
    if let Some(secs) = cli.interval {
        config = config.with_poll_interval(Duration::from_secs(secs));
    }
    config.validate()?;
    Ok(config)
}

async fn run_status(config: IndicatorConfig, json: bool) -> anyhow::Result<()> {
    let runner = ShellRunner::new(&config);
    let model = fetch_status(&runner).await?;
    print_menu(&menu::render(&model), json, false)
}

async fn run_action(config: IndicatorConfig, action: Action) -> anyhow::Result<()> {
    let indicator = Indicator::new(config)?;
    let outcome = indicator.dispatcher().execute(action.clone()).await?;

    match outcome {
        Outcome::Refreshing => {
            info!("{} done", action);
            let runner = ShellRunner::new(indicator.config());
            let model = fetch_status(&runner).await?;
            print_menu(&menu::render(&model), false, false)?;
        }
        Outcome::Launched => info!("{} launched", action),
        Outcome::Skipped | Outcome::Discarded => {}
    }
    Ok(())
}

async fn run_watch(config: IndicatorConfig, json: bool) -> anyhow::Result<()> {
    let mut indicator = Indicator::new(config)?;
    let mut updates = WatchStream::from_changes(indicator.subscribe());
    indicator.start();

    // Read commands from stdin on a blocking thread
    let (input_tx, mut input_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if input_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            Some(model) = updates.next() => {
                print_menu(&menu::render(&model), json, true)?;
            }
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                match HostCommand::parse(&line) {
                    Ok(HostCommand::Quit) => break,
                    Ok(HostCommand::Empty) => {}
                    Ok(HostCommand::Refresh) => indicator.refresh(),
                    Ok(HostCommand::Show) => print_menu(&indicator.render(), json, true)?,
                    Ok(HostCommand::Toggle(name)) => match toggle_action(&indicator.render(), &name) {
                        Some(action) => {
                            indicator.dispatch(action);
                        }
                        None => error!("No menu entry named {}", name),
                    },
                    Ok(HostCommand::Run(action)) => {
                        indicator.dispatch(action);
                    }
                    Err(msg) => eprintln!("{}\n{}", msg, HostCommand::HELP),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    indicator.stop();
    Ok(())
}

/// Flip a switch entry, or activate a link entry.
fn toggle_action(menu: &Menu, name: &str) -> Option<Action> {
    let entry = menu.entry(name)?;
    let value = match entry {
        MenuEntry::Toggle { on, .. } => !on,
        MenuEntry::Link { .. } => true,
    };
    Some(entry.toggled(value))
}

fn print_menu(menu: &Menu, json: bool, timestamped: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(menu)?);
        return Ok(());
    }
    if timestamped {
        println!("── {} ──", chrono::Local::now().format("%H:%M:%S"));
    }
    print!("{}", menu);
    Ok(())
}

/// A line typed into `watch` mode
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostCommand {
    Empty,
    Quit,
    Refresh,
    Show,
    Toggle(String),
    Run(Action),
}

impl HostCommand {
    const HELP: &'static str = "commands: t <name> (toggle), c <name> (connect), d <name> (disconnect), \
                                da (disconnect all), o <url> (open), r (refresh), s (show), q (quit)";

    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        let needs_arg = |make: fn(String) -> HostCommand| {
            if arg.is_empty() {
                Err(format!("`{verb}` needs an argument"))
            } else {
                Ok(make(arg.to_string()))
            }
        };

        match verb {
            "" => Ok(HostCommand::Empty),
            "q" | "quit" | "exit" => Ok(HostCommand::Quit),
            "r" | "refresh" => Ok(HostCommand::Refresh),
            "s" | "show" => Ok(HostCommand::Show),
            "da" | "disconnect-all" => Ok(HostCommand::Run(Action::DisconnectAll)),
            "t" | "toggle" => needs_arg(HostCommand::Toggle),
            "c" | "connect" => needs_arg(|name| HostCommand::Run(Action::Connect(name))),
            "d" | "disconnect" => needs_arg(|name| HostCommand::Run(Action::Disconnect(name))),
            "o" | "open" => needs_arg(|url| HostCommand::Run(Action::Open(url))),
            other => Err(format!("unknown command `{other}`")),
        }
    }
}
