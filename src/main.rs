//! waka-agent CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use waka_agent::{
    catalog::JsonAppCatalog, config::Settings, dispatch::HeartbeatDispatcher, hook::KeyHook,
    observer::platform_observer, status::StatusChannel, updater::{NullFeed, UpdateCoordinator},
    watcher::ActivityWatcher, AllowAllFilter, StatusEvent, VERSION,
};

#[derive(Parser)]
#[command(name = "waka-agent")]
#[command(version = VERSION)]
#[command(about = "Background activity agent for the WakaTime collector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start observing and reporting activity
    Start {
        /// Override the wakatime-cli binary path
        #[arg(long)]
        cli_path: Option<PathBuf>,
    },

    /// Show agent status
    Status,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { cli_path } => cmd_start(cli_path),
        Commands::Status => {
            cmd_status();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    }
}

fn cmd_start(cli_path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut settings = Settings::load().context("loading settings")?;
    if cli_path.is_some() {
        settings.cli_path = cli_path;
    }
    init_logging(&settings)?;

    tracing::info!(version = VERSION, "waka-agent starting");
    let cli = settings.resolve_cli_path();
    if !cli.exists() {
        tracing::warn!(
            cli = %cli.display(),
            "wakatime-cli not found; heartbeats will fail until it is installed"
        );
    }

    let catalog = Arc::new(JsonAppCatalog::load(
        &JsonAppCatalog::default_path(),
        settings.monitored_apps.clone(),
    ));

    let (status, status_rx) = StatusChannel::new();
    let dispatcher = HeartbeatDispatcher::new(settings.clone(), status);
    // The real update feed is wired in by the packaging layer; the
    // coordinator still owns all scheduling either way.
    let updater = UpdateCoordinator::new(Box::new(NullFeed), settings.auto_update_enabled);

    let mut watcher = ActivityWatcher::new(
        platform_observer(),
        KeyHook::new(),
        catalog,
        Arc::new(AllowAllFilter),
        settings,
        dispatcher,
        updater,
    );

    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        ctrlc::set_handler(move || {
            let _ = shutdown_tx.send(true);
        })
        .context("setting Ctrl+C handler")?;

        // Console renderer for the status side channel; a tray front
        // end would drain this receiver instead.
        tokio::task::spawn_blocking(move || {
            for event in status_rx.iter() {
                match event {
                    StatusEvent::Icon(state) => tracing::info!(?state, "status icon"),
                    StatusEvent::Text(text) if text.is_empty() => {
                        tracing::debug!("status text cleared")
                    }
                    StatusEvent::Text(text) => tracing::info!(%text, "today"),
                    StatusEvent::Alert { title, body } => {
                        tracing::warn!(%title, %body, "alert")
                    }
                }
            }
        });

        watcher.run(shutdown_rx).await;
        Ok::<(), anyhow::Error>(())
    })?;

    tracing::info!("waka-agent stopped");
    Ok(())
}

fn cmd_status() {
    let settings = Settings::load().unwrap_or_default();
    let cli = settings.resolve_cli_path();

    println!("waka-agent v{VERSION}");
    println!();
    println!(
        "wakatime-cli: {} ({})",
        cli.display(),
        if cli.exists() { "found" } else { "missing" }
    );
    println!(
        "Status bar: {}",
        if settings.status_bar_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "Auto-update: {}",
        if settings.auto_update_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("Browser entities: {:?}", settings.entity_preference);
    println!("Monitored app overrides: {}", settings.monitored_apps.len());
}

fn cmd_config() {
    let settings = Settings::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Settings file: {:?}", Settings::settings_path());
    println!("App catalog:   {:?}", JsonAppCatalog::default_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&settings).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up tracing. The debug flag lowers the filter; log_to_file
/// mirrors output into the config directory.
fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let default_filter = if settings.debug {
        "waka_agent=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    if settings.log_to_file {
        let path = Settings::log_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("creating log directory")?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
