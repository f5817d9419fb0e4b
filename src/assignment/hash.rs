//! Stable bucketing hash
//!
//! FNV-1a over the raw UTF-8 bytes of `user_id` followed by `experiment_id`
//! (no separator), 32-bit, wrapping multiply. Every port must produce the
//! same bucket for the same pair, so the constants below are part of the
//! contract.

/// FNV-1a 32-bit offset basis.
pub const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit prime.
pub const FNV_PRIME: u32 = 0x0100_0193;

/// Number of buckets the hash is reduced to before normalizing.
pub const BUCKETS: u32 = 10_000;

/// FNV-1a 32-bit hash of a byte sequence.
#[must_use]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    fnv1a_32_extend(FNV_OFFSET_BASIS, bytes)
}

fn fnv1a_32_extend(mut hash: u32, bytes: &[u8]) -> u32 {
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hash of the concatenation `user_id || experiment_id`.
#[must_use]
pub fn assignment_hash(user_id: &str, experiment_id: &str) -> u32 {
    let hash = fnv1a_32_extend(FNV_OFFSET_BASIS, user_id.as_bytes());
    fnv1a_32_extend(hash, experiment_id.as_bytes())
}

/// Normalized bucket position `h = (hash mod 10000) / 10000`, in `[0, 1)`.
#[must_use]
pub fn bucket(user_id: &str, experiment_id: &str) -> f64 {
    f64::from(assignment_hash(user_id, experiment_id) % BUCKETS) / f64::from(BUCKETS)
}

/// Index of the variant owning position `h`.
///
/// Walks `weights` (percentages) in order accumulating `weight / 100` and
/// returns the first index with `h <= cumulative`. When rounding leaves `h`
/// past the final cumulative weight, the last index is returned.
/// Returns `None` only for an empty slice.
#[must_use]
pub fn select_index(h: f64, weights: &[f64]) -> Option<usize> {
    let mut cumulative = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight / 100.0;
        if h <= cumulative {
            return Some(i);
        }
    }
    weights.len().checked_sub(1)
}
