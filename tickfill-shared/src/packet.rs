use byteorder::{BigEndian, ByteOrder};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size in bytes of a single packet frame on the wire
pub const FRAME_SIZE: usize = 4 + 1 + 4 + 4 + 4;

const SYMBOL_LEN: usize = 4;
const SIDE_OFFSET: usize = 4;
const QUANTITY_OFFSET: usize = 5;
const PRICE_OFFSET: usize = 9;
const SEQUENCE_OFFSET: usize = 13;

/// A single market data record as sent by the exchange server.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Packet {
    /// Ticker symbol, always 4 characters
    pub symbol: String,

    /// Buy/sell indicator ('B' or 'S')
    #[serde(rename = "buySellIndicator")]
    pub side: char,

    pub quantity: i32,

    /// Price in the exchange's fixed-point units
    pub price: i32,

    /// Unique key of the packet within a session
    pub sequence: i32,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: need {} bytes, got {0}", FRAME_SIZE)]
    TooShort(usize),
    #[error("stream ended with {0} bytes of an incomplete frame")]
    Truncated(usize),
    #[error("sequence {0} cannot be encoded in a single byte request")]
    SequenceOutOfRange(i32),
}

impl Packet {
    pub fn new(symbol: &str, side: char, quantity: i32, price: i32, sequence: i32) -> Self {
        Self {
            symbol: symbol.to_owned(),
            side,
            quantity,
            price,
            sequence,
        }
    }

    /// Decodes the first frame of `data`. Any bytes after the frame are ignored.
    pub fn parse(data: &[u8]) -> Result<Packet, FrameError> {
        if data.len() < FRAME_SIZE {
            return Err(FrameError::TooShort(data.len()));
        }

        let symbol = data[..SYMBOL_LEN].iter().map(|b| *b as char).collect();
        let side = data[SIDE_OFFSET] as char;
        let quantity = BigEndian::read_i32(&data[QUANTITY_OFFSET..PRICE_OFFSET]);
        let price = BigEndian::read_i32(&data[PRICE_OFFSET..SEQUENCE_OFFSET]);
        let sequence = BigEndian::read_i32(&data[SEQUENCE_OFFSET..FRAME_SIZE]);

        Ok(Packet {
            symbol,
            side,
            quantity,
            price,
            sequence,
        })
    }

    /// Encodes the packet into a wire frame.
    ///
    /// Symbols shorter than 4 characters are space padded, longer ones are cut.
    /// Characters outside the single byte range are replaced with '?'.
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut frame = [b' '; FRAME_SIZE];

        for (slot, c) in frame[..SYMBOL_LEN].iter_mut().zip(self.symbol.chars()) {
            *slot = to_byte(c);
        }

        frame[SIDE_OFFSET] = to_byte(self.side);
        BigEndian::write_i32(&mut frame[QUANTITY_OFFSET..PRICE_OFFSET], self.quantity);
        BigEndian::write_i32(&mut frame[PRICE_OFFSET..SEQUENCE_OFFSET], self.price);
        BigEndian::write_i32(&mut frame[SEQUENCE_OFFSET..FRAME_SIZE], self.sequence);

        frame
    }
}

fn to_byte(c: char) -> u8 {
    u8::try_from(c).unwrap_or(b'?')
}

/// Incrementally decodes frames from a byte stream whose read boundaries
/// do not necessarily line up with frame boundaries.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buffer: vec![] }
    }

    /// Appends `data` and returns every frame completed by it.
    pub fn push(&mut self, data: &[u8]) -> Vec<Packet> {
        self.buffer.extend_from_slice(data);

        let complete = self.buffer.len() - self.buffer.len() % FRAME_SIZE;
        let packets = self.buffer[..complete]
            .chunks_exact(FRAME_SIZE)
            .filter_map(|frame| Packet::parse(frame).ok())
            .collect::<Vec<_>>();

        self.buffer.drain(..complete);

        if !packets.is_empty() {
            debug!(
                "decoded {} frames, {} bytes buffered",
                packets.len(),
                self.buffer.len()
            );
        }

        packets
    }

    /// Number of bytes belonging to a frame that has not fully arrived yet.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Signals the end of the stream, failing if a partial frame is left over.
    pub fn finish(self) -> Result<(), FrameError> {
        match self.buffer.len() {
            0 => Ok(()),
            remaining => Err(FrameError::Truncated(remaining)),
        }
    }
}
