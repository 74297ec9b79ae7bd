use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use padbridge::config::path::{get_config_path, get_settings_path};
use padbridge::config::settings::YamlSettingsStore;
use padbridge::config::DaemonConfig;
use padbridge::input::manager::{Command, Manager};
use padbridge::input::notifier::LogNotifier;
use padbridge::input::registry::Registry;
use padbridge::input::target::xb360::UinputBus;
use padbridge::usb::libusb::LibUsbBus;

/// Bridge legacy USB Xbox controllers to virtual Xbox 360 gamepads
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the daemon config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Path to the per-device settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,
    /// Rate in Hz at which controllers are polled
    #[arg(short, long)]
    poll_rate: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let log_level = match env::var("LOG_LEVEL") {
        Ok(value) => value,
        Err(_) => "info".to_string(),
    };
    env::set_var("RUST_LOG", log_level);
    env_logger::init();
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    log::info!("Starting padbridge v{}", VERSION);

    let args = Args::parse();
    let mut config = DaemonConfig::load_or_default(args.config.unwrap_or_else(get_config_path));
    if let Some(poll_rate) = args.poll_rate {
        config.poll_rate = poll_rate;
    }
    if let Some(settings_path) = args.settings {
        config.settings_path = Some(settings_path);
    }

    let settings_path = config.settings_path.clone().unwrap_or_else(get_settings_path);
    let settings = match YamlSettingsStore::open(settings_path.clone()) {
        Ok(store) => store,
        Err(e) => {
            log::warn!("Unable to open settings {settings_path:?}: {e}. Settings will not be saved.");
            YamlSettingsStore::in_memory()
        }
    };

    // Without either bus there is nothing this daemon can do
    let usb = match LibUsbBus::new() {
        Ok(usb) => usb,
        Err(e) => {
            log::error!("Unable to initialize USB: {e}");
            return Err(e.into());
        }
    };
    let pads = UinputBus::new();
    if let Err(e) = pads.check_available() {
        log::error!("Unable to create virtual gamepads: {e}");
        return Err(e.into());
    }

    let registry = Registry::new(
        Arc::new(usb),
        Arc::new(pads),
        Arc::new(settings),
        Arc::new(LogNotifier),
    );
    let mut manager = Manager::new(registry);

    // Setup CTRL+C handler
    let tx = manager.transmitter();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Unable to listen for shutdown signal: {e}");
            return;
        }
        log::info!("Shutting down");
        if let Err(e) = tx.send(Command::Shutdown).await {
            log::error!("Unable to stop manager: {e}");
        }
    });

    if let Err(e) = manager.run(&config).await {
        log::error!("Error running the manager: {e}");
        return Err(e);
    }

    log::info!("padbridge stopped");

    Ok(())
}
