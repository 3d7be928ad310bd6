use crate::PacketStore;
use std::collections::BTreeSet;

/// Sequences inside the store's observed range that have not been received,
/// in ascending order. Empty for an empty store.
///
/// The result is a snapshot and must be recomputed after further insertions.
pub fn compute_gaps(store: &PacketStore) -> BTreeSet<i32> {
    compute_gaps_within(store, i32::MIN, i32::MAX)
}

/// Gaps of the observed range that also lie in `[lower, upper]`. Only the
/// intersection is scanned, so a stray far-off sequence costs nothing.
pub fn compute_gaps_within(store: &PacketStore, lower: i32, upper: i32) -> BTreeSet<i32> {
    match store.range() {
        Some((min, max)) => (min.max(lower)..=max.min(upper))
            .filter(|seq| !store.contains(*seq))
            .collect(),
        None => BTreeSet::new(),
    }
}

/// Sequences in `[1, known_total]` that have not been received.
pub fn missing_from_total(store: &PacketStore, known_total: i32) -> Vec<i32> {
    (1..=known_total).filter(|seq| !store.contains(*seq)).collect()
}
