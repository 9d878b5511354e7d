//! ## mqttrace-cli
//! **Command-line front end for the MQTT instrumentation layer**
//!
//! Runs hex-encoded frames through an instrumented client, either against a
//! discarding transport (`inspect`) or a live broker (`send`), and writes
//! the resulting telemetry events to the configured output.

use anyhow::anyhow;
use clap::Parser;
use mqttrace_config::TelemetryConfig;
use mqttrace_telemetry::logging;

mod commands;
mod transport;

use commands::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let bootstrap = logging::bootstrap_subscriber(&TelemetryConfig::default().log_filter);
    let config = tracing::subscriber::with_default(bootstrap, || commands::load_config(&cli))?;
    logging::init(&config.telemetry.log_filter).map_err(|e| anyhow!(e))?;

    commands::run_command(cli, config)
}
