use crate::{compute_gaps_within, missing_from_total, Config, PacketStore, RequestError, Transport};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use log::*;
use std::collections::BTreeSet;
use std::time::Duration;
use tickfill_shared::{Packet, Request, MAX_REQUEST_SEQUENCE};

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum RecoveryState {
    BulkFetch,
    GapFill,
    ExtendLow,
    ExtendHigh,
    Done,
}

/// Result of a completed recovery run.
#[derive(Debug)]
pub struct RecoveryReport {
    /// Every recovered packet in ascending sequence order
    pub packets: Vec<Packet>,
    pub known_total: i32,
    /// Number of gap fill passes performed
    pub passes: u32,
    /// Sequences in `[1, known_total]` that could not be recovered
    pub missing: Vec<i32>,
}

impl RecoveryReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Drives the recovery protocol: a bulk fetch, followed by repeated passes
/// re-requesting gaps, followed by probing past both ends of the observed range.
pub struct RecoveryController<T: Transport> {
    config: Config,
    transport: T,
    store: PacketStore,
}

impl<T: Transport> RecoveryController<T> {
    pub fn new(config: Config, transport: T) -> Self {
        Self {
            config,
            transport,
            store: PacketStore::new(),
        }
    }

    pub fn store(&self) -> &PacketStore {
        &self.store
    }

    pub async fn run(mut self) -> Result<RecoveryReport> {
        let mut state = RecoveryState::BulkFetch;
        let mut passes = 0;

        loop {
            debug!("recovery state: {:?}", state);

            state = match state {
                RecoveryState::BulkFetch => {
                    self.bulk_fetch().await?;
                    RecoveryState::GapFill
                }
                RecoveryState::GapFill => {
                    passes = self.fill_gaps().await;
                    RecoveryState::ExtendLow
                }
                RecoveryState::ExtendLow => {
                    self.extend_low().await;
                    RecoveryState::ExtendHigh
                }
                RecoveryState::ExtendHigh => {
                    self.extend_high().await;
                    RecoveryState::Done
                }
                RecoveryState::Done => break,
            };
        }

        Ok(self.into_report(passes))
    }

    /// Requests every packet from the server. Failing to reach the server
    /// here is fatal to the run.
    pub async fn bulk_fetch(&mut self) -> Result<usize> {
        let packets = self
            .transport
            .send_and_await_all(Request::SendAll)
            .await
            .context("failed to fetch packets from server")?;

        let received = packets.len();

        for packet in packets {
            self.store.insert(packet);
        }

        info!("Received sequences: {}", join(self.store.sequences()));
        info!("Total unique sequences received: {}", self.store.len());

        Ok(received)
    }

    /// Re-requests the gaps in the observed range, recomputing them after each
    /// pass. Returns the number of passes performed.
    ///
    /// Gaps that no resend request can address are never scanned or requested.
    pub async fn fill_gaps(&mut self) -> u32 {
        let known_total = self.config.known_total() as usize;
        let max_attempts = self.config.max_attempts();
        let concurrency = self.config.gap_fill_concurrency();
        let timeout = self.config.request_timeout();

        if let Some((min, max)) = self.store.range() {
            if min < 0 || max > MAX_REQUEST_SEQUENCE {
                warn!(
                    "observed range [{}, {}] exceeds requestable sequences [0, {}], \
                     gaps outside it are left unresolved",
                    min, max, MAX_REQUEST_SEQUENCE
                );
            }
        }

        let mut gaps = requestable_gaps(&self.store);
        info!("Potentially missed sequences: {}", join(gaps.iter().copied()));

        let mut attempts = 0;

        while self.store.len() < known_total && attempts < max_attempts {
            if gaps.is_empty() {
                debug!("no gaps inside the observed range");
                break;
            }

            {
                let transport = &self.transport;
                let store = &mut self.store;

                let mut responses = stream::iter(gaps.iter().copied())
                    .map(move |sequence| async move {
                        (sequence, request_one(transport, sequence, timeout).await)
                    })
                    .buffer_unordered(concurrency);

                while let Some((sequence, result)) = responses.next().await {
                    match result {
                        Ok(packet) => {
                            info!("Received missing sequence: {}", packet.sequence);
                            store.insert(packet);
                        }
                        Err(err) => warn!("Failed to retrieve sequence {}: {}", sequence, err),
                    }
                }
            }

            gaps = requestable_gaps(&self.store);
            attempts += 1;

            info!(
                "Attempt {}: Missing sequences: {}",
                attempts,
                join(gaps.iter().copied())
            );
        }

        attempts
    }

    /// Probes downwards from the lowest observed sequence until sequence 1 is
    /// reached or a request fails.
    pub async fn extend_low(&mut self) {
        let mut lowest = match self.store.range() {
            Some((min, _)) => min,
            None => {
                debug!("store is empty, nothing to extend downwards from");
                return;
            }
        };

        while lowest > 1 {
            let sequence = lowest - 1;

            match request_one(&self.transport, sequence, self.config.request_timeout()).await {
                Ok(packet) => {
                    self.store.insert(packet);

                    if !self.store.contains(sequence) {
                        warn!("response for sequence {} did not extend the range", sequence);
                        break;
                    }

                    info!("Successfully retrieved previous sequence: {}", sequence);
                    lowest = sequence;
                }
                Err(err) => {
                    info!("sequence {} is not found: {}", sequence, err);
                    break;
                }
            }
        }

        info!("No more previous sequences found.");
    }

    /// Probes upwards from the highest observed sequence until the known total
    /// is reached or a request fails. An empty store is probed from sequence 1.
    pub async fn extend_high(&mut self) {
        let known_total = self.config.known_total();
        let mut next = match self.store.range() {
            Some((_, max)) if max >= known_total => {
                debug!("highest observed sequence {} already reaches the known total", max);
                return;
            }
            Some((_, max)) => max + 1,
            None => 1,
        };

        while next <= known_total {
            match request_one(&self.transport, next, self.config.request_timeout()).await {
                Ok(packet) => {
                    self.store.insert(packet);

                    if !self.store.contains(next) {
                        warn!("response for sequence {} did not extend the range", next);
                        break;
                    }

                    info!("Successfully retrieved next sequence: {}", next);
                    next += 1;
                }
                Err(err) => {
                    info!("sequence {} is not found: {}", next, err);
                    break;
                }
            }
        }

        info!("No more sequences found.");
    }

    fn into_report(self, passes: u32) -> RecoveryReport {
        let known_total = self.config.known_total();
        let missing = missing_from_total(&self.store, known_total);
        let packets = self.store.into_sorted_packets();

        info!("Total sequences received: {} of {}", packets.len(), known_total);

        if !missing.is_empty() {
            warn!("Unresolved sequences: {}", join(missing.iter().copied()));
        }

        RecoveryReport {
            packets,
            known_total,
            passes,
            missing,
        }
    }
}

async fn request_one<T: Transport>(
    transport: &T,
    sequence: i32,
    timeout: Duration,
) -> Result<Packet, RequestError> {
    let request =
        Request::send_one(sequence).map_err(|_| RequestError::Unencodable(sequence))?;

    info!("Requesting packet with sequence {}", sequence);
    let packet = transport.send_and_await_one(request, timeout).await?;

    if packet.sequence != sequence {
        warn!(
            "requested sequence {} but received sequence {}",
            sequence, packet.sequence
        );
    }

    Ok(packet)
}

fn requestable_gaps(store: &PacketStore) -> BTreeSet<i32> {
    compute_gaps_within(store, 0, MAX_REQUEST_SEQUENCE)
}

fn join(sequences: impl Iterator<Item = i32>) -> String {
    sequences
        .map(|seq| seq.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
