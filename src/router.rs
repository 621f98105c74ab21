//! Stable symbol -> partition routing (spec §4.6, §9).

use crate::util::fnv1a;

/// Computes the partition index for `symbol` out of `partition_count`
/// partitions: `(fnv1a(symbol) & 0x7FFFFFFF) % partition_count`.
///
/// The top bit is cleared before the modulo to avoid signed-modulo
/// pitfalls (spec §9), even though Rust's `%` on unsigned integers has no
/// such pitfall — kept for parity with the spec's documented
/// implementation note and to guarantee the same result regardless of how
/// the hash's high bit happens to be set.
pub fn partition_index(symbol: &str, partition_count: usize) -> usize {
    debug_assert!(partition_count > 0);
    let hash = fnv1a(symbol.as_bytes()) & 0x7FFF_FFFF;
    (hash % partition_count as u64) as usize
}
