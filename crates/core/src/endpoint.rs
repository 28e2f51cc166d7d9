//! Network endpoint identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reachable peer or orderer and the organization (MSP) that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// `host:port` network address.
    pub address: String,
    pub msp_id: String,
}

impl EndpointConfig {
    pub fn new(address: impl Into<String>, msp_id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            msp_id: msp_id.into(),
        }
    }

    /// Describe a failure that happened at this endpoint.
    pub fn error(&self, message: impl Into<String>) -> EndpointError {
        EndpointError {
            address: self.address.clone(),
            msp_id: self.msp_id.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.msp_id)
    }
}

/// Structured per-endpoint detail attached to a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointError {
    pub address: String,
    pub msp_id: String,
    pub message: String,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.address, self.msp_id, self.message)
    }
}
