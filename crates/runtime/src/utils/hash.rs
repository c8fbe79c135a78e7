//! Hashing utilities for world snapshots.
//!
//! Two runs fed the same data and intents must produce the same digest;
//! determinism tests and replay tooling compare these strings.

use battle_core::WorldSnapshot;
use sha2::{Digest, Sha256};

use crate::api::{Result, RuntimeError};

/// SHA-256 over the bincode encoding of `snapshot`, hex encoded.
pub fn snapshot_digest(snapshot: &WorldSnapshot) -> Result<String> {
    let bytes = bincode::serialize(snapshot).map_err(RuntimeError::Encode)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
