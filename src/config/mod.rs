// * Gateway & Agent Configuration
// * Explicit configuration values handed to every alerting call

pub mod constants;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use constants::API_KEY_ENV;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Who gets paged for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderKind {
    Team,
    User,
    Escalation,
    Schedule,
}

/// A responder attached to every created alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responder {
    #[serde(rename = "type")]
    pub kind: ResponderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Responder {
    pub fn team(name: impl Into<String>) -> Self {
        Self {
            kind: ResponderKind::Team,
            name: Some(name.into()),
            id: None,
        }
    }
}

/// Credentials and routing for the alerting service.
///
/// Resolve the environment override once with [`GatewayConfig::with_env_override`]
/// and pass the result to every gateway call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub responders: Vec<Responder>,
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>, responders: Vec<Responder>) -> Self {
        Self {
            api_key: api_key.into(),
            responders,
        }
    }

    /// Replaces the configured key with `OPSGENIE_API_KEY` when that variable is set
    pub fn with_env_override(self) -> Self {
        self.with_key_override(std::env::var(API_KEY_ENV).ok())
    }

    /// Applies an already-read key override
    pub fn with_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key {
            self.api_key = key;
        }
        self
    }

    // * Blank keys count as missing
    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (!key.is_empty()).then_some(key)
    }
}

/// On-disk agent configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default, rename = "opsGenieConfig")]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub heartbeat_service: Option<String>,
}

impl AgentConfig {
    pub fn from_json_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json_str(&raw, &display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_override_takes_precedence() {
        let config = GatewayConfig::new("from-file", vec![])
            .with_key_override(Some("from-env".to_string()));
        assert_eq!(config.api_key(), Some("from-env"));

        let config = GatewayConfig::new("from-file", vec![]).with_key_override(None);
        assert_eq!(config.api_key(), Some("from-file"));
    }

    #[test]
    fn test_blank_key_is_missing() {
        assert_eq!(GatewayConfig::new("   ", vec![]).api_key(), None);
        assert_eq!(GatewayConfig::default().api_key(), None);
    }

    #[test]
    fn test_parses_telemetry_config_section() {
        let raw = r#"{
            "opsGenieConfig": {
                "apiKey": "abc",
                "responders": [{ "type": "team", "name": "ops" }, { "type": "user", "id": "u-1" }]
            },
            "heartbeatService": "telemetry-collector",
            "unrelated": { "chains": [] }
        }"#;

        let config = AgentConfig::from_json_str(raw, "inline").unwrap();
        assert_eq!(config.gateway.api_key(), Some("abc"));
        assert_eq!(config.gateway.responders[0], Responder::team("ops"));
        assert_eq!(config.gateway.responders[1].kind, ResponderKind::User);
        assert_eq!(config.heartbeat_service.as_deref(), Some("telemetry-collector"));
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_responder_wire_format() {
        let json = serde_json::to_value(Responder::team("ops")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "team", "name": "ops" }));
    }

    #[test]
    fn test_parse_error_names_origin() {
        let err = AgentConfig::from_json_str("{", "broken.json").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AgentConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
