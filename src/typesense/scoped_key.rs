//! Scoped search keys
//!
//! Generated locally: Typesense verifies them by recomputing the HMAC of the
//! embedded parameters with the parent search key.

use crate::error::{NodeError, NodeResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Number of leading key characters Typesense uses to find the parent key
const KEY_PREFIX_LEN: usize = 4;

/// Derive a scoped key embedding `parameters` (filter_by, expires_at, ...)
pub fn generate_scoped_search_key(
    search_key: &str,
    parameters: &Map<String, Value>,
) -> NodeResult<String> {
    if search_key.chars().count() < KEY_PREFIX_LEN {
        return Err(NodeError::validation(
            "Search key must be at least 4 characters long",
        ));
    }

    let params_json = serde_json::to_string(parameters)
        .map_err(|e| NodeError::validation(format!("Invalid embedded parameters: {}", e)))?;

    let mut mac = HmacSha256::new_from_slice(search_key.as_bytes())
        .map_err(|e| NodeError::validation(format!("Invalid search key: {}", e)))?;
    mac.update(params_json.as_bytes());
    let digest = BASE64.encode(mac.finalize().into_bytes());

    let prefix: String = search_key.chars().take(KEY_PREFIX_LEN).collect();
    Ok(BASE64.encode(format!("{}{}{}", digest, prefix, params_json)))
}
