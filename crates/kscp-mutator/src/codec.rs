//! Agent configuration encoding
//!
//! The agent receives its whole configuration as one command-line argument:
//! the resolved secret map as compact JSON, base64 (standard alphabet) encoded.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use kscp_common::{Error, Result};

use crate::resolver::SecretConfig;

const AGENT_CONFIG_KIND: &str = "agent-config";

/// Encode the resolved secret map into the agent's `--config` value
pub fn encode_agent_config(secrets: &BTreeMap<String, SecretConfig>) -> Result<String> {
    let json = serde_json::to_vec(secrets).map_err(|e| {
        Error::serialization_of(AGENT_CONFIG_KIND, format!("marshalling secrets: {e}"))
    })?;
    Ok(STANDARD.encode(json))
}

/// Decode a `--config` value back into the secret map
pub fn decode_agent_config(encoded: &str) -> Result<BTreeMap<String, SecretConfig>> {
    let json = STANDARD.decode(encoded.trim())?;
    let secrets = serde_json::from_slice(&json)?;
    Ok(secrets)
}
