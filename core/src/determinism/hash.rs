use crate::determinism::json_canonical::to_canonical_bytes;
use crate::error::CoreResult;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const ZERO_HASH_64: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Identity of a structured artifact: SHA-256 over its canonical JSON bytes.
pub fn canonical_sha256<T: Serialize>(value: &T) -> CoreResult<String> {
    let bytes = to_canonical_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

pub fn is_hex64(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}
