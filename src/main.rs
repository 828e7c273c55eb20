//! ShowSwitcher - automated camera and overlay switching for Companion
//!
//! Rotates through configured button targets on randomized (or sequential)
//! timers and fires them against the Companion HTTP API, with optional MIDI
//! control and persisted statistics.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showswitcher::app::ShowSwitcher;
use showswitcher::config::AppConfig;
use showswitcher::midi::{MidiEngine, MidiInputRouter, MidirEngine};
use showswitcher::persistence::StatsSnapshot;

/// ShowSwitcher - automated camera/overlay switching for Companion
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI input ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.list_ports {
        list_ports_formatted();
        return Ok(());
    }

    info!("Starting ShowSwitcher...");
    info!("Configuration file: {}", args.config);

    let config = match AppConfig::load(&args.config).await {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            warn!("{} ({}), using defaults", e, args.config);
            AppConfig::default()
        }
    };

    // Frames from the MIDI hardware callback cross into the async world here
    let (frame_tx, mut frame_rx) = mpsc::channel(256);

    let midi = if config.midi.enabled {
        let mut router = MidiInputRouter::new(Box::new(MidirEngine), &config.midi, frame_tx);
        match router.refresh_ports() {
            Ok(()) => {
                if let Err(e) = router.auto_connect(&config.midi) {
                    warn!("MIDI connection failed: {} (continuing without MIDI)", e);
                }
            }
            Err(e) => warn!("MIDI discovery failed: {} (continuing without MIDI)", e),
        }
        Some(router)
    } else {
        None
    };

    let mut app = ShowSwitcher::new(config, None, midi);

    // Restore cumulative statistics from the previous run
    match StatsSnapshot::load_from_file(app.stats_path()).await {
        Ok(snapshot) => app.seed_from_snapshot(&snapshot),
        Err(_) => info!("No previous statistics found, starting fresh"),
    }

    let drain_handle = app.queue.spawn_drain_loop();

    info!(
        "Companion target: http://{}:{}",
        app.config.companion.host, app.config.companion.port
    );
    info!("Ready");

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let mut autosave =
        tokio::time::interval(Duration::from_secs(app.config.statistics.auto_save_minutes * 60));
    autosave.reset(); // skip the immediate first tick

    loop {
        tokio::select! {
            _ = tick.tick() => {
                app.on_tick();
            }

            Some(frame) = frame_rx.recv() => {
                app.handle_midi_frame(frame).await;
            }

            _ = autosave.tick() => {
                if let Err(e) = app.save_stats().await {
                    warn!("Auto-save failed: {}", e);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Shutting down...");
    drain_handle.abort();
    app.stop_system().await;
    if let Some(router) = app.midi.as_mut() {
        router.destroy();
    }
    // Flush the courtesy press queued by stop
    app.queue.drain_one().await;

    if let Err(e) = app.save_stats().await {
        warn!("Failed to save statistics on shutdown: {}", e);
    }

    info!("ShowSwitcher shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Input Ports ===".bold().cyan());

    match MidirEngine.input_ports() {
        Ok(names) if names.is_empty() => {
            println!("  {}", "No MIDI input ports found".yellow());
        }
        Ok(names) => {
            for (index, name) in names.iter().enumerate() {
                println!("  {} {}", format!("[{}]", index).green(), name);
            }
        }
        Err(e) => {
            println!("  {} {}", "Error:".red(), e);
        }
    }
    println!();
}
