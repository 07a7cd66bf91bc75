//! Config validation
//!
//! Rules:
//! - field rules declared on the contract types (ports > 0, window > 0, URL syntax)
//! - listener bind addresses are not empty
//! - forwarding URL uses http or https

use contracts::{ContractError, GatewayConfig};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a GatewayConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &GatewayConfig) -> Result<(), ContractError> {
    validate_field_rules(config)?;
    validate_bind_addresses(config)?;
    validate_forwarding_url(config)?;
    Ok(())
}

/// Run the derive-declared field rules
fn validate_field_rules(config: &GatewayConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let mut violations = Vec::new();
        collect_violations(&errors, "", &mut violations);
        violations.sort();
        let (field, message) = violations
            .into_iter()
            .next()
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// Flatten nested validation errors into `(dotted.path, message)` pairs
fn collect_violations(errors: &ValidationErrors, prefix: &str, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push((path.clone(), error.to_string()));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_violations(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect_violations(inner, &format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}

/// Bind addresses must not be empty
fn validate_bind_addresses(config: &GatewayConfig) -> Result<(), ContractError> {
    if config.mqtt.bind.trim().is_empty() {
        return Err(ContractError::config_validation(
            "mqtt.bind",
            "bind address cannot be empty",
        ));
    }
    if config.udp.bind.trim().is_empty() {
        return Err(ContractError::config_validation(
            "udp.bind",
            "bind address cannot be empty",
        ));
    }
    Ok(())
}

/// Forwarding uses HTTP PUT, so only http/https destinations make sense
fn validate_forwarding_url(config: &GatewayConfig) -> Result<(), ContractError> {
    let Some(url) = config.forwarding.url.as_deref() else {
        return Ok(());
    };

    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(ContractError::config_validation(
            "forwarding.url",
            format!("unsupported scheme in '{url}', expected http or https"),
        ));
    }
    Ok(())
}
