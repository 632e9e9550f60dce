use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keyloop::backend::{storage::ConfigStore, Command, DryRunInjector, InputInjector};
use keyloop::{Backends, Flow, KeyLoopApp, Settings};

#[derive(Parser)]
#[command(name = "keyloop", version, about = "Record keys and clicks, replay them in a loop")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved configs
    List,
    /// Print the events of a saved config
    Show { name: String },
    /// Delete a saved config
    Delete { name: String },
    /// Load a config and loop it until the stop hotkey (or Enter) is pressed
    Play {
        name: String,
        /// Log events instead of injecting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Interactive session (the default)
    Run {
        /// Config to load on startup
        #[arg(long)]
        config: Option<String>,
        /// Log events instead of injecting them
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load().context("Failed to load settings")?;
    let store = ConfigStore::new(settings.configs_dir()?);

    match cli.command.unwrap_or(Commands::Run {
        config: None,
        dry_run: false,
    }) {
        Commands::List => {
            for name in store.list().context("Failed to list configs")? {
                println!("{name}");
            }
        }
        Commands::Show { name } => {
            let sequence = store
                .load(&name)
                .with_context(|| format!("Failed to load config '{name}'"))?;
            for (i, event) in sequence.iter().enumerate() {
                println!("{i:>3}: {event}");
            }
        }
        Commands::Delete { name } => {
            store
                .delete(&name)
                .with_context(|| format!("Failed to delete config '{name}'"))?;
            println!("Deleted {name}");
        }
        Commands::Play { name, dry_run } => play(settings, store, &name, dry_run)?,
        Commands::Run { config, dry_run } => run(settings, store, config.as_deref(), dry_run)?,
    }

    Ok(())
}

fn build_app(
    settings: Settings,
    store: ConfigStore,
    dry_run: bool,
    tx: Sender<Command>,
) -> Result<KeyLoopApp> {
    let settings_path = Settings::settings_file_path()?;
    let app = KeyLoopApp::new(settings, store, platform_backends(tx, dry_run))
        .context("Failed to set up")?
        .with_settings_path(settings_path);
    Ok(app)
}

#[cfg(windows)]
fn platform_backends(tx: Sender<Command>, dry_run: bool) -> Backends {
    use keyloop::backend::win32::{HookCapture, SendInputInjector, Win32Hotkeys};

    let injector: Arc<dyn InputInjector> = if dry_run {
        Arc::new(DryRunInjector)
    } else {
        Arc::new(SendInputInjector)
    };
    Backends::new(
        injector,
        Box::new(HookCapture::default()),
        Box::new(Win32Hotkeys::new(tx)),
    )
}

#[cfg(not(windows))]
fn platform_backends(_tx: Sender<Command>, dry_run: bool) -> Backends {
    use keyloop::backend::{NoCapture, NoHotkeys};

    if !dry_run {
        warn!("no input backend for this platform, events will only be logged");
    }
    let injector: Arc<dyn InputInjector> = Arc::new(DryRunInjector);
    Backends::new(injector, Box::new(NoCapture), Box::new(NoHotkeys))
}

/// Forwards stdin lines into the command channel; end of input means exit.
/// Forwards stdin lines as commands. `on_eof` is sent once input ends.
fn spawn_stdin_reader(tx: Sender<Command>, to_command: fn(String) -> Command, on_eof: Option<Command>) {
    thread::spawn(move || forward_lines(std::io::stdin().lock(), &tx, to_command, on_eof));
}

fn forward_lines(
    input: impl BufRead,
    tx: &Sender<Command>,
    to_command: fn(String) -> Command,
    on_eof: Option<Command>,
) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if tx.send(to_command(line)).is_err() {
            return;
        }
    }
    debug!("stdin closed");
    if let Some(command) = on_eof {
        let _ = tx.send(command);
    }
}

fn play(settings: Settings, store: ConfigStore, name: &str, dry_run: bool) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Command>();
    let mut app = build_app(settings, store, dry_run, tx.clone())?;

    app.load_config(name)
        .with_context(|| format!("Failed to load config '{name}'"))?;
    if let Err(err) = app.bind_hotkeys() {
        warn!(error = %err, "hotkeys unavailable");
    }
    app.start_playback().context("Failed to start playback")?;

    let (_, stop) = app.hotkeys();
    println!("▶ Playing {name}. Press {stop} or Enter to stop.");
    // without a terminal only the stop hotkey ends playback
    spawn_stdin_reader(tx.clone(), |_| Command::StopPlayback, None);

    for command in rx.iter() {
        match command {
            Command::StopPlayback | Command::Exit => break,
            other => {
                app.handle(other);
            }
        }
    }

    app.shutdown();
    println!("🛑 Playback stopped");
    Ok(())
}

fn run(settings: Settings, store: ConfigStore, config: Option<&str>, dry_run: bool) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Command>();
    let mut app = build_app(settings, store, dry_run, tx.clone())?;

    if let Some(name) = config {
        let len = app
            .load_config(name)
            .with_context(|| format!("Failed to load config '{name}'"))?;
        println!("📂 Loaded {name} ({len} events)");
    }
    if let Err(err) = app.bind_hotkeys() {
        warn!(error = %err, "hotkeys unavailable");
    }

    let (start, stop) = app.hotkeys();
    println!("KeyLoop ready. Start: {start}, stop: {stop}. Type 'help' for commands.");
    info!(configs = %app.store().dir().display(), "session started");

    spawn_stdin_reader(tx, Command::Input, Some(Command::Exit));
    control_loop(&mut app, rx);

    app.shutdown();
    Ok(())
}

// consume hotkey and console commands on this thread only
fn control_loop(app: &mut KeyLoopApp, rx: Receiver<Command>) {
    for command in rx.iter() {
        let flow = app.handle(command);
        if !app.status().is_empty() {
            println!("{}", app.status());
        }
        if flow == Flow::Exit {
            break;
        }
    }
}
