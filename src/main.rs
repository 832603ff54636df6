//! # Thermostat Link
//!
//! Remote thermostat telemetry client over MQTT.
//!
//! Connects to the broker, keeps the temperature history and link counters
//! up to date, and accepts setpoint commands typed on stdin.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

use thermostat_link::config::Config;
use thermostat_link::engine::{EngineCommand, EngineSnapshot, TelemetryEngine};
use thermostat_link::logging;
use thermostat_link::transport::MqttTransport;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Depth of the transport event queue
const EVENT_QUEUE_DEPTH: usize = 64;

/// Depth of the console line queue
const CONSOLE_QUEUE_DEPTH: usize = 16;

const HELP: &str = "commands: connect | disconnect | set <degrees> | clear | reset | status | help | quit";

/// A line typed on the console
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Engine(EngineCommand),
    Status,
    Help,
    Quit,
}

/// Main entry point for Thermostat Link
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (argument, `config/default.toml`, or defaults)
///    - Set up logging
///    - Start the telemetry engine and connect to the broker
///
/// 2. **Main Loop**
///    - Read console commands and forward them to the engine
///    - Log display changes (temperature, setpoint, counters)
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Drop the engine handle, which disconnects from the broker
///    - Wait for the engine task to finish
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = logging::init(&config.logging);

    info!("Thermostat Link v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Broker {}:{}, publishing to {}, subscribed to {}",
        config.broker.host, config.broker.port, config.topics.publish, config.topics.subscribe
    );

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let transport = MqttTransport::new(&config.broker, events_tx);
    let (handle, engine_task) = TelemetryEngine::new(transport, &config).spawn(events_rx);

    handle.connect().await?;
    info!("{}", HELP);

    let mut snapshots = handle.subscribe();
    let mut last_summary = String::new();
    let mut lines = spawn_line_reader(BufReader::new(std::io::stdin()));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("Console closed, shutting down...");
                    break;
                };

                match parse_command(&line) {
                    Ok(ConsoleCommand::Engine(command)) => handle.send(command).await?,
                    Ok(ConsoleCommand::Status) => println!("{}", describe(&handle.snapshot())),
                    Ok(ConsoleCommand::Help) => println!("{}", HELP),
                    Ok(ConsoleCommand::Quit) => break,
                    Err(message) if message.is_empty() => {}
                    Err(message) => warn!("{}", message),
                }
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Telemetry engine stopped unexpectedly");
                    break;
                }

                let summary = summarize(&snapshots.borrow_and_update());
                if summary != last_summary {
                    info!("{}", summary);
                    last_summary = summary;
                }
            }

            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    drop(snapshots);
    drop(handle);
    engine_task.await.context("telemetry engine task failed")?;

    Ok(())
}

/// Load the configuration named on the command line, else the default file,
/// else built-in defaults
fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        return Config::load(&path).with_context(|| format!("failed to load {}", path));
    }

    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("failed to load {}", DEFAULT_CONFIG_PATH));
    }

    Ok(Config::default())
}

/// Read lines on a dedicated OS thread
///
/// Blocking console reads cannot be cancelled. The thread is not joined on
/// shutdown, so Ctrl+C exits without waiting for Enter.
fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (lines_tx, lines_rx) = mpsc::channel(CONSOLE_QUEUE_DEPTH);

    std::thread::spawn(move || {
        for line in reader.lines() {
            let Ok(line) = line else {
                break;
            };
            if lines_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    lines_rx
}

/// Parse one console line
///
/// An empty line yields `Err("")`, which the caller ignores.
fn parse_command(line: &str) -> std::result::Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(String::new());
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "connect" => ConsoleCommand::Engine(EngineCommand::Connect),
        "disconnect" => ConsoleCommand::Engine(EngineCommand::Disconnect),
        "clear" => ConsoleCommand::Engine(EngineCommand::ClearHistory),
        "reset" => ConsoleCommand::Engine(EngineCommand::ResetDiagnostics),
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "set" => {
            let value = words
                .next()
                .ok_or_else(|| "usage: set <degrees>".to_string())?
                .parse::<i32>()
                .map_err(|e| format!("invalid setpoint: {}", e))?;
            ConsoleCommand::Engine(EngineCommand::SetTemperature(value))
        }
        other => return Err(format!("unknown command '{}' ({})", other, HELP)),
    };

    if words.next().is_some() {
        return Err(format!("too many arguments for '{}'", verb));
    }

    Ok(command)
}

/// One-line summary of the displayed values
fn summarize(snapshot: &EngineSnapshot) -> String {
    format!(
        "{} temp={} setpoint={} lost_rx={} lost_tx={} checksum_errors={}",
        snapshot.status_text(),
        snapshot.current_temperature_display(),
        snapshot.setpoint_display(),
        snapshot.counters.lost_rx,
        snapshot.counters.lost_tx,
        snapshot.counters.checksum_errors,
    )
}

/// Full status report for the `status` command
fn describe(snapshot: &EngineSnapshot) -> String {
    let mut report = format!(
        "{}\n  current temperature: {}\n  setpoint: {}\n  last reading: {}\n  \
         lost RX: {}  lost TX: {}  checksum errors: {}  malformed: {}  unknown: {}\n  \
         history: {} samples",
        snapshot.status_text(),
        snapshot.current_temperature_display(),
        snapshot.setpoint_display(),
        snapshot.last_reading_display(),
        snapshot.counters.lost_rx,
        snapshot.counters.lost_tx,
        snapshot.counters.checksum_errors,
        snapshot.counters.malformed,
        snapshot.counters.unknown_types,
        snapshot.history.len(),
    );

    if let Some(point) = snapshot.series().last() {
        report.push_str(&format!(" (latest {} at {})", point.value, point.label));
    }

    report
}
