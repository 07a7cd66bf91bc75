//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::GatewayConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    mqtt_listen: String,
    udp_listen: String,
    quiescence_ms: u64,
    channel_capacity: usize,
    forwarding_url: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    mqtt_listen: config.mqtt.listen_addr(),
                    udp_listen: config.udp.listen_addr(),
                    quiescence_ms: config.collector.quiescence_ms,
                    channel_capacity: config.ingestion.channel_capacity,
                    forwarding_url: config.forwarding.url.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &GatewayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.forwarding.is_enabled() {
        warnings.push(
            "No forwarding URL configured - forwarding disabled unless EAGLE_OWL is set"
                .to_string(),
        );
    }

    if config.mqtt.port == config.udp.port && config.mqtt.bind == config.udp.bind {
        warnings.push(format!(
            "MQTT and UDP share port {} (allowed, TCP and UDP are separate)",
            config.mqtt.port
        ));
    }

    if config.collector.quiescence_ms < 50 {
        warnings.push(format!(
            "collector.quiescence_ms = {} is short - second fragments may arrive too late",
            config.collector.quiescence_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  MQTT: {}", summary.mqtt_listen);
            println!("  UDP: {}", summary.udp_listen);
            println!("  Quiescence: {} ms", summary.quiescence_ms);
            println!("  Channel capacity: {}", summary.channel_capacity);
            match summary.forwarding_url {
                Some(ref url) => println!("  Forwarding: {}", url),
                None => println!("  Forwarding: disabled"),
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
