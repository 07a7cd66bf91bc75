//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, GatewayConfig};
use std::time::Duration;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args)?;
    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        mqtt = %config.mqtt.listen_addr(),
        udp = %config.udp.listen_addr(),
        quiescence_ms = config.collector.quiescence_ms,
        forwarding = config.forwarding.is_enabled(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        gateway: config,
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
        dry_sink: args.dry_sink,
    });

    info!("Starting gateway...");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Gateway execution failed")?;

    info!(
        notifications = stats.forwarding.total,
        duration_secs = stats.duration.as_secs_f64(),
        "Gateway stopped"
    );
    stats.print_summary();

    Ok(())
}

fn load_config(args: &RunArgs) -> Result<GatewayConfig> {
    match args.config {
        Some(ref path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(GatewayConfig::default())
        }
    }
}

/// Apply CLI and environment overrides on top of the file configuration
fn apply_overrides(config: &mut GatewayConfig, args: &RunArgs) {
    if let Some(ref url) = args.forward_url {
        if url.is_empty() {
            info!("Empty forwarding URL override, forwarding disabled");
            config.forwarding.url = None;
        } else {
            info!(url = %url, "Overriding forwarding URL from CLI/env");
            config.forwarding.url = Some(url.clone());
        }
    }
    if let Some(port) = args.mqtt_port {
        info!(port, "Overriding MQTT port from CLI");
        config.mqtt.port = port;
    }
    if let Some(port) = args.udp_port {
        info!(port, "Overriding UDP port from CLI");
        config.udp.port = port;
    }
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &GatewayConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Listeners:");
    println!("  MQTT: {}", config.mqtt.listen_addr());
    println!("  UDP:  {}", config.udp.listen_addr());
    println!("\nCollector:");
    println!("  Quiescence: {} ms", config.collector.quiescence_ms);
    println!("\nIngestion:");
    println!("  Channel capacity: {}", config.ingestion.channel_capacity);
    println!("\nForwarding:");
    match config.forwarding.url {
        Some(ref url) => {
            println!("  URL: {}", url);
            println!("  Timeout: {} ms", config.forwarding.timeout_ms);
        }
        None => println!("  Disabled (no destination URL)"),
    }
    println!();
}
