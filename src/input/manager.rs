use std::error::Error;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::DaemonConfig;
use crate::input::deadzone::DeadzoneTarget;
use crate::input::registry::Registry;
use crate::input::session::Toggle;
use crate::sync::TimeoutReceiver;

const BUFFER_SIZE: usize = 64;
/// Poll tick used while no controller is attached
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Manager commands define all the different ways to interact with [Manager]
/// over a channel. These commands are processed in the manager's run loop
/// between poll ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan,
    SetToggle {
        toggle: Toggle,
        enabled: bool,
    },
    SetDeadzone {
        settings_key: String,
        target: DeadzoneTarget,
        value: i32,
    },
    Shutdown,
}

/// Manages controller discovery and polling. A discovery task periodically
/// scans for supported USB controllers while the run loop polls every
/// attached one at the configured rate.
pub struct Manager {
    registry: Registry,
    /// Transmit channel for sending commands to the manager
    tx: mpsc::Sender<Command>,
    /// Receive channel for listening for commands
    rx: mpsc::Receiver<Command>,
}

impl Manager {
    pub fn new(registry: Registry) -> Manager {
        let (tx, rx) = mpsc::channel(BUFFER_SIZE);
        Manager { registry, tx, rx }
    }

    /// Returns a channel that can be used to send commands to the manager
    pub fn transmitter(&self) -> mpsc::Sender<Command> {
        self.tx.clone()
    }

    /// Returns the registry of attached controllers
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs discovery and polling until a [Command::Shutdown] is received.
    /// All virtual pads are removed before this returns.
    pub async fn run(&mut self, config: &DaemonConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
        let discovery = self.watch_devices(config.scan_interval());
        let poll_interval = config.poll_interval();
        log::debug!(
            "Polling every {poll_interval:?}, scanning every {:?}",
            config.scan_interval()
        );

        let mut next_poll = Instant::now();
        loop {
            let timeout = next_poll.saturating_duration_since(Instant::now());
            // The manager holds a sender itself, so receiving only ever
            // yields a command or a timeout
            let Ok(cmd) = self.rx.recv_timeout(timeout).await else {
                self.poll().await?;
                next_poll = Instant::now()
                    + if self.registry.is_empty() {
                        IDLE_POLL_INTERVAL
                    } else {
                        poll_interval
                    };
                continue;
            };

            log::debug!("Received command: {cmd:?}");
            if cmd == Command::Shutdown {
                break;
            }
            self.handle_command(cmd).await?;
        }

        discovery.abort();
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || registry.shutdown()).await?;
        log::info!("All controllers released");

        Ok(())
    }

    async fn handle_command(&self, cmd: Command) -> Result<(), Box<dyn Error + Send + Sync>> {
        let registry = self.registry.clone();
        match cmd {
            Command::Scan => {
                // Opening devices is slow, so polling carries on meanwhile
                tokio::task::spawn_blocking(move || scan(&registry));
            }
            Command::SetToggle { toggle, enabled } => {
                log::info!("Setting {} to {enabled}", toggle.field());
                tokio::task::spawn_blocking(move || registry.set_toggle(toggle, enabled)).await?;
            }
            Command::SetDeadzone {
                settings_key,
                target,
                value,
            } => {
                log::info!("Setting {target} deadzone of '{settings_key}' to {value}");
                tokio::task::spawn_blocking(move || {
                    registry.set_deadzone(&settings_key, target, value)
                })
                .await?;
            }
            Command::Shutdown => (),
        }
        Ok(())
    }

    async fn poll(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.registry.is_empty() {
            return Ok(());
        }
        let registry = self.registry.clone();
        let removed = tokio::task::spawn_blocking(move || registry.poll_all()).await?;
        if removed > 0 {
            log::info!("Status: {}", self.registry.status_summary());
        }
        Ok(())
    }

    /// Starts a task that scans for new controllers on every tick, apart
    /// from the poll loop
    fn watch_devices(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let registry = registry.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || scan(&registry)).await {
                    log::error!("Device scan failed: {e}");
                }
            }
        })
    }
}

fn scan(registry: &Registry) {
    if registry.scan() > 0 {
        log::info!("Status: {}", registry.status_summary());
    }
}
