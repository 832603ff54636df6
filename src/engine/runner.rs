//! Engine task: the single serialized context that owns a [`TelemetryEngine`].
//!
//! UI commands, transport events and both watchdog timers are multiplexed with
//! `tokio::select!` so that every handler runs on this one task.

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{EngineSnapshot, TelemetryEngine};
use crate::error::{Result, ThermoLinkError};
use crate::transport::{Transport, TransportEvent};

/// Depth of the UI command queue
pub const COMMAND_QUEUE_DEPTH: usize = 32;

/// Commands the UI can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Connect,
    Disconnect,
    SetTemperature(i32),
    ClearHistory,
    ResetDiagnostics,
}

/// Cloneable UI-side handle to a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    snapshots: watch::Receiver<EngineSnapshot>,
}

impl EngineHandle {
    pub async fn connect(&self) -> Result<()> {
        self.send(EngineCommand::Connect).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.send(EngineCommand::Disconnect).await
    }

    pub async fn set_temperature(&self, value: i32) -> Result<()> {
        self.send(EngineCommand::SetTemperature(value)).await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.send(EngineCommand::ClearHistory).await
    }

    pub async fn reset_diagnostics(&self) -> Result<()> {
        self.send(EngineCommand::ResetDiagnostics).await
    }

    /// Queue a command for the engine task
    ///
    /// # Errors
    ///
    /// Returns `EngineStopped` if the engine task has exited
    pub async fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ThermoLinkError::EngineStopped)
    }

    /// Watch snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshots.borrow().clone()
    }
}

impl<T: Transport + 'static> TelemetryEngine<T> {
    /// Move the engine onto its own task
    ///
    /// # Arguments
    ///
    /// * `events` - Receiving end of the channel the transport reports into
    ///
    /// # Returns
    ///
    /// * `(EngineHandle, JoinHandle<()>)` - UI handle and the engine task. The
    ///   task ends once every handle has been dropped.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use thermostat_link::config::Config;
    /// use thermostat_link::engine::TelemetryEngine;
    /// use thermostat_link::transport::MqttTransport;
    /// use tokio::sync::mpsc;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let config = Config::default();
    ///     let (events_tx, events_rx) = mpsc::channel(64);
    ///     let transport = MqttTransport::new(&config.broker, events_tx);
    ///
    ///     let (handle, _task) = TelemetryEngine::new(transport, &config).spawn(events_rx);
    ///     handle.connect().await?;
    ///     handle.set_temperature(21).await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn spawn(self, events: mpsc::Receiver<TransportEvent>) -> (EngineHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let handle = EngineHandle {
            commands: commands_tx,
            snapshots: self.subscribe(),
        };

        let task = tokio::spawn(self.run(events, commands_rx));
        (handle, task)
    }

    /// Process commands, transport events and watchdog timers until the
    /// command channel closes
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        mut commands: mpsc::Receiver<EngineCommand>,
    ) {
        let period = self.liveness_period();
        let mut liveness = interval_at(Instant::now() + period, period);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut events_open = true;

        info!("Telemetry engine started");

        loop {
            let ack_wait = self
                .tx_deadline()
                .map(|deadline| (deadline - Utc::now()).to_std().unwrap_or_default());

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => {
                        debug!("All engine handles dropped");
                        break;
                    }
                },

                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        warn!("Transport event channel closed");
                        events_open = false;
                    }
                },

                _ = liveness.tick() => {
                    self.check_liveness_at(Utc::now());
                }

                _ = sleep(ack_wait.unwrap_or_default()), if ack_wait.is_some() => {
                    self.check_ack_timeout_at(Utc::now()).await;
                }
            }
        }

        if let Err(e) = self.disconnect().await {
            warn!("Error while shutting down: {}", e);
        }
        info!("Telemetry engine stopped");
    }

    async fn execute(&mut self, command: EngineCommand) {
        debug!("Executing {:?}", command);

        let result = match command {
            EngineCommand::Connect => self.connect().await,
            EngineCommand::Disconnect => self.disconnect().await,
            EngineCommand::SetTemperature(value) => self.set_temperature(value).await,
            EngineCommand::ClearHistory => {
                self.clear_history();
                Ok(())
            }
            EngineCommand::ResetDiagnostics => {
                self.reset_diagnostics();
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("{:?} failed: {}", command, e);
        }
    }
}
