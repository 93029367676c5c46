//! Key slugging and generated identifiers

use crate::error::{CatalogError, Result};
use bech32::Bech32m;
use uuid7::uuid7;

/// Base issuer key from a human-readable name: lowercase, whitespace runs
/// collapsed to a single underscore. Collision handling lives in the service.
pub fn slug_key(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Fresh scheme/slab identifier: uuid7 encoded as bech32 under the given
/// human-readable prefix.
pub fn new_bech32_id(hrp: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| CatalogError::IdGeneration(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| CatalogError::IdGeneration(e.to_string()))?;
    Ok(encode)
}
