//! Stable cache key for model handles.

use sha2::{Digest, Sha256};

use crate::types::GenerationConfig;

/// Derive a deterministic fingerprint from generation parameters and the
/// full system-instruction text. Floats are rendered with fixed precision
/// so equal configs always hash equal.
pub fn fingerprint(config: &GenerationConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.model.as_bytes());
    hasher.update(b"\0");
    hasher.update(format!("{:.4}", config.temperature).as_bytes());
    hasher.update(b"\0");
    hasher.update(config.top_k.to_le_bytes());
    hasher.update(format!("{:.4}", config.top_p).as_bytes());
    hasher.update(config.max_output_tokens.to_le_bytes());
    hasher.update(b"\0");
    hasher.update(config.system_instruction.as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
