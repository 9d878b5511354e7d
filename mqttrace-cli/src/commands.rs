use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use mqttrace_config::{ConfigError, DetailLevel, EventOutput, MqttraceConfig};
use mqttrace_core::{InstrumentedClient, MqttTransport};
use mqttrace_protocols::{MessageProcessor, PacketDecoder};
use mqttrace_telemetry::{
    EventLogger, JsonLinesEventLogger, LocalTracingController, MetricsRecorder, TracingEventLogger,
};
use validator::Validate;

use crate::transport::{DiscardTransport, TcpTransport};

#[derive(Parser, Debug)]
#[command(name = "mqttrace", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Telemetry detail level: info, detailed or full
    #[arg(long, global = true)]
    pub level: Option<DetailLevel>,

    /// Broker host (overrides configuration)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Broker port (overrides configuration)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Configuration file to load instead of `config/mqttrace.yaml`
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr when done
    #[arg(long, global = true)]
    pub metrics: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify hex-encoded frames and print the telemetry they produce
    Inspect(InspectArgs),
    /// Send hex-encoded frames to the broker through the instrumented client
    Send(SendArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Frames as hex strings, e.g. `e000`
    #[arg(required = true)]
    pub frames: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    #[arg(required = true)]
    pub frames: Vec<String>,

    /// Wait for one response frame after the last write
    #[arg(long)]
    pub await_response: bool,
}

/// Loads configuration and applies command-line overrides.
pub fn load_config(cli: &Cli) -> anyhow::Result<MqttraceConfig> {
    let mut config = match &cli.config {
        Some(path) => MqttraceConfig::load_from_path(path)?,
        None => MqttraceConfig::load()?,
    };
    apply_overrides(cli, &mut config)?;
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut MqttraceConfig) -> Result<(), ConfigError> {
    if let Some(level) = cli.level {
        config.analytics.detail_level = level;
    }
    if let Some(host) = &cli.host {
        config.client.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.client.port = port;
    }
    config.validate()?;
    Ok(())
}

pub fn run_command(cli: Cli, config: MqttraceConfig) -> anyhow::Result<()> {
    let metrics = cli
        .metrics
        .then(MetricsRecorder::new)
        .transpose()
        .map_err(|e| anyhow!("failed to register metrics: {}", e))?;

    match cli.command {
        Commands::Inspect(args) => run_inspect(args, &config, metrics.clone())?,
        Commands::Send(args) => run_send(args, &config, metrics.clone())?,
    }

    if let Some(metrics) = metrics {
        let text = metrics
            .gather_metrics()
            .map_err(|e| anyhow!("failed to gather metrics: {}", e))?;
        eprint!("{}", text);
    }
    Ok(())
}

fn run_inspect(
    args: InspectArgs,
    config: &MqttraceConfig,
    metrics: Option<MetricsRecorder>,
) -> anyhow::Result<()> {
    let frames = parse_frames(&args.frames)?;
    let mut client = instrument(DiscardTransport::new(&config.client.host), config, metrics);

    for frame in &frames {
        client.on_outbound_write(frame, None)?;
    }
    Ok(())
}

fn run_send(
    args: SendArgs,
    config: &MqttraceConfig,
    metrics: Option<MetricsRecorder>,
) -> anyhow::Result<()> {
    let frames = parse_frames(&args.frames)?;
    let transport = TcpTransport::connect(&config.client.host, config.client.port).with_context(
        || format!("failed to connect to {}:{}", config.client.host, config.client.port),
    )?;
    let mut client = instrument(transport, config, metrics);

    for frame in &frames {
        client.on_outbound_write(frame, None)?;
    }

    if args.await_response {
        let frame = client
            .client_mut()
            .read_frame()
            .context("failed to read broker response")?;
        let message = MessageProcessor::new(config.client.protocol)
            .decode(&frame)
            .with_context(|| format!("undecodable broker response {}", hex::encode(&frame)))?;
        client.on_inbound_message(&message)?;
    }
    Ok(())
}

fn instrument<C: MqttTransport>(
    transport: C,
    config: &MqttraceConfig,
    metrics: Option<MetricsRecorder>,
) -> InstrumentedClient<C> {
    let events: Arc<dyn EventLogger> = match config.telemetry.event_output {
        EventOutput::Stdout => Arc::new(JsonLinesEventLogger::new(std::io::stdout())),
        EventOutput::Log => Arc::new(TracingEventLogger::new()),
    };
    let tracing = Arc::new(LocalTracingController::with_new_trace());

    let client = InstrumentedClient::new(
        transport,
        MessageProcessor::new(config.client.protocol),
        tracing,
        events,
    )
    .with_detail_level(config.analytics.detail_level);

    match metrics {
        Some(metrics) => client.with_metrics(metrics),
        None => client,
    }
}

fn parse_frames(frames: &[String]) -> anyhow::Result<Vec<Vec<u8>>> {
    frames
        .iter()
        .map(|frame| hex::decode(frame).with_context(|| format!("invalid hex frame '{}'", frame)))
        .collect()
}
