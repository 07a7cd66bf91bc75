//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Telemetry Gateway - MQTT and UDP sensor ingestion with HTTP forwarding
#[derive(Parser, Debug)]
#[command(
    name = "telemetry-gateway",
    author,
    version,
    about = "Telemetry ingestion gateway",
    long_about = "Accepts sensor readings over MQTT publishes and fragmented UDP \n\
                  accelerometer frames, normalizes them into notifications, and \n\
                  forwards each one to a time-series store with an HTTP PUT."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TELEMETRY_GATEWAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TELEMETRY_GATEWAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gateway
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "TELEMETRY_GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Destination URL for forwarded notifications (unset = forwarding disabled)
    #[arg(long, env = "EAGLE_OWL")]
    pub forward_url: Option<String>,

    /// Override MQTT listener port from configuration
    #[arg(long, env = "TELEMETRY_GATEWAY_MQTT_PORT")]
    pub mqtt_port: Option<u16>,

    /// Override UDP listener port from configuration
    #[arg(long, env = "TELEMETRY_GATEWAY_UDP_PORT")]
    pub udp_port: Option<u16>,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "TELEMETRY_GATEWAY_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without binding listeners
    #[arg(long)]
    pub dry_run: bool,

    /// Log notifications instead of forwarding them
    #[arg(long)]
    pub dry_sink: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "TELEMETRY_GATEWAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "gateway.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
