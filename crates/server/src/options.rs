//! Gateway configuration.

use ledgergate_registry::RegistryOptions;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Gateway configuration. Durations are written in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayOptions {
    /// When false every operation is refused.
    pub enabled: bool,
    /// Shared deadline for collecting the endorsements of one call.
    #[serde(rename = "endorsement_timeout_ms", with = "millis")]
    pub endorsement_timeout: Duration,
    /// Upper bound on establishing one peer or orderer connection.
    #[serde(rename = "dial_timeout_ms", with = "millis")]
    pub dial_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            endorsement_timeout: Duration::from_secs(30),
            dial_timeout: Duration::from_secs(120),
        }
    }
}

impl GatewayOptions {
    /// Parse options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            dial_timeout: self.dial_timeout,
        }
    }
}

mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
