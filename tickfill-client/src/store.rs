use log::*;
use std::collections::BTreeMap;
use tickfill_shared::Packet;

/// Deduplicating collection of received packets keyed by sequence number.
///
/// The observed range is widened on every insertion, so it may cover
/// sequences that have not been received yet.
#[derive(Debug)]
pub struct PacketStore {
    packets: BTreeMap<i32, Packet>,

    /// Smallest sequence ever inserted, `i32::MAX` while empty
    min_observed: i32,

    /// Largest sequence ever inserted, 0 while empty
    max_observed: i32,
}

impl PacketStore {
    pub fn new() -> Self {
        Self {
            packets: BTreeMap::new(),
            min_observed: i32::MAX,
            max_observed: 0,
        }
    }

    /// Inserts the packet unless its sequence is already present.
    /// Returns whether the packet was new.
    pub fn insert(&mut self, packet: Packet) -> bool {
        let sequence = packet.sequence;

        self.min_observed = self.min_observed.min(sequence);
        self.max_observed = self.max_observed.max(sequence);

        if self.packets.contains_key(&sequence) {
            debug!("ignoring duplicate packet {}", sequence);
            return false;
        }

        self.packets.insert(sequence, packet);
        true
    }

    pub fn contains(&self, sequence: i32) -> bool {
        self.packets.contains_key(&sequence)
    }

    /// The observed `(min, max)` range, or `None` before the first insertion.
    pub fn range(&self) -> Option<(i32, i32)> {
        if self.packets.is_empty() {
            return None;
        }

        Some((self.min_observed, self.max_observed))
    }

    pub fn min_observed(&self) -> i32 {
        self.min_observed
    }

    pub fn max_observed(&self) -> i32 {
        self.max_observed
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn sequences(&self) -> impl Iterator<Item = i32> + '_ {
        self.packets.keys().copied()
    }

    pub fn sorted_packets(&self) -> Vec<Packet> {
        self.packets.values().cloned().collect()
    }

    pub fn into_sorted_packets(self) -> Vec<Packet> {
        self.packets.into_values().collect()
    }
}

impl Default for PacketStore {
    fn default() -> Self {
        Self::new()
    }
}
