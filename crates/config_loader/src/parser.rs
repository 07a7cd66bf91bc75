//! Config parsing
//!
//! Supports TOML (primary) and JSON formats.

use contracts::{ContractError, GatewayConfig};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML config
pub fn parse_toml(content: &str) -> Result<GatewayConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON config
pub fn parse_json(content: &str) -> Result<GatewayConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse config by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<GatewayConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[mqtt]
bind = "127.0.0.1"
port = 11883

[udp]
port = 19999

[collector]
quiescence_ms = 250

[ingestion]
channel_capacity = 64

[forwarding]
url = "https://store.example.com/notifications"
timeout_ms = 2000
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.mqtt.bind, "127.0.0.1");
        assert_eq!(config.mqtt.port, 11883);
        assert_eq!(config.udp.port, 19999);
        assert_eq!(config.collector.quiescence_ms, 250);
        assert_eq!(config.ingestion.channel_capacity, 64);
        assert_eq!(
            config.forwarding.url.as_deref(),
            Some("https://store.example.com/notifications")
        );
    }

    #[test]
    fn test_parse_toml_empty_is_defaults() {
        let config = parse_toml("").unwrap();
        assert_eq!(config.mqtt.port, 1883);
        assert!(config.forwarding.url.is_none());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "udp": { "port": 7000 },
            "forwarding": { "url": "http://localhost:8080/" }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert_eq!(result.unwrap().udp.port, 7000);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
