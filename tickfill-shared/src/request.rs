use crate::FrameError;

/// Size in bytes of every request sent to the server
pub const REQUEST_SIZE: usize = 2;

/// Largest sequence number a resend request can carry
pub const MAX_REQUEST_SEQUENCE: i32 = u8::MAX as i32;

/// A request understood by the exchange server.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Request {
    /// Stream every available packet, then close the connection
    SendAll,
    /// Resend the single packet with the given sequence number
    SendOne(u8),
}

impl Request {
    /// Builds a resend request, rejecting sequence numbers that do not fit
    /// in the single byte the wire format reserves for them.
    pub fn send_one(sequence: i32) -> Result<Self, FrameError> {
        u8::try_from(sequence)
            .map(Self::SendOne)
            .map_err(|_| FrameError::SequenceOutOfRange(sequence))
    }

    pub fn kind(&self) -> u8 {
        match self {
            Self::SendAll => 1,
            Self::SendOne(_) => 2,
        }
    }

    pub fn to_bytes(&self) -> [u8; REQUEST_SIZE] {
        match self {
            Self::SendAll => [self.kind(), 0],
            Self::SendOne(sequence) => [self.kind(), *sequence],
        }
    }

    pub fn parse(data: &[u8]) -> Option<Self> {
        match data {
            [1, _] => Some(Self::SendAll),
            [2, sequence] => Some(Self::SendOne(*sequence)),
            _ => None,
        }
    }
}
