//! Provisioning parameter fingerprints.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of the parameters' canonical JSON.
///
/// `serde_json::Map` keeps keys sorted, so equal parameter sets hash equally
/// regardless of the order the platform sent them in.
pub fn params_hash(parameters: &Map<String, Value>) -> String {
    let canonical = Value::Object(parameters.clone()).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}
