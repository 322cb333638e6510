//! Canonical serialization for deterministic run fingerprints.
//!
//! Atlas fingerprints, configuration hashes and run ids are all computed by
//! serializing a value to JSON and hashing the bytes with xxh64.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable Vec order: vectors serialize in index order
//! - No HashMap in hashed data: use BTreeMap
//! - Floats are quantized with [`quantize`] before they enter a hash

use serde::Serialize;
use xxhash_rust::xxh64::{xxh64, Xxh64};

use crate::types::Bundle;

/// Quantization factor for float normalization.
///
/// Floats are multiplied by this value and rounded to i64 before hashing.
pub const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Quantize a float to an i64 for deterministic hashing.
pub fn quantize(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Only used on plain data structs; serialization of those cannot fail.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Content hash of a bundle, as hex.
///
/// Streams fiber point counts and quantized coordinates straight into xxh64.
/// Fiber order and orientation are part of the hash.
pub fn bundle_hash(bundle: &Bundle) -> String {
    let mut hasher = Xxh64::new(0);
    hasher.update(&(bundle.len() as u64).to_le_bytes());
    for fiber in bundle {
        hasher.update(&(fiber.len() as u64).to_le_bytes());
        for p in fiber.points() {
            for c in p.to_array() {
                hasher.update(&quantize(f64::from(c)).to_le_bytes());
            }
        }
    }
    format!("{:016x}", hasher.digest())
}
