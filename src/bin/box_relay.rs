//! Box relay: waits for the counter's completion signal (OSC over UDP) and
//! writes the unlock byte to the box controller's serial device.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use jackbox::config::Config;
use jackbox::logging;
use jackbox::relay::BoxRelay;

#[derive(Parser, Debug)]
#[command(name = "box_relay", version = env!("GIT_VERSION"), about)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "jackbox.toml")]
    config: PathBuf,

    /// Serial device, overrides relay.device
    #[arg(long)]
    device: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init("box_relay", &cli.log_level)?;
    let mut config = Config::load_or_default(&cli.config);
    if let Some(device) = cli.device {
        config.relay.device = device;
    }

    let relay = BoxRelay::bind(&config.relay, &config.trigger.osc_address)?;
    info!(version = env!("GIT_VERSION"), "Box Relay");
    info!(listen = %relay.local_addr()?, address = %config.trigger.osc_address, "waiting for completion signal");
    info!(device = %config.relay.device, payload = %config.relay.payload, "actuator");

    relay.run()
}
