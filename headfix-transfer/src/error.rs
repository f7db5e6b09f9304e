use std::time::Duration;

use thiserror::Error;

use crate::protocol::TransferState;

/// A value could not be represented in its wire field.
#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("{field} = {value} does not fit in {width} byte(s)")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        width: usize,
    },

    #[error("array of {len} elements exceeds the {max}-element packet limit")]
    ArrayTooLong { len: usize, max: usize },
}

/// Bytes received from the device do not form a valid frame or payload.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("truncated: got {received} bytes, expected {expected}")]
    Truncated { received: usize, expected: usize },

    #[error("checksum mismatch: frame carries 0x{received:02X}, computed 0x{computed:02X}")]
    ChecksumMismatch { received: u8, computed: u8 },

    #[error("declared payload length {declared} disagrees with {actual} payload bytes")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("array count {count} disagrees with {bytes} payload bytes")]
    CountMismatch { count: u16, bytes: usize },

    #[error("{field} flag byte is 0x{value:02X}")]
    InvalidFlag { field: &'static str, value: u8 },
}

/// Serial link faults.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("serial link unavailable on {port}: {reason}")]
    Unavailable { port: String, reason: String },

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum TransferError {
    /// The device echoed something other than what was sent.
    #[error("echo of packet {packet_id} does not match: {detail}")]
    VerificationMismatch { packet_id: u8, detail: String },

    #[error("no complete echo for packet {packet_id} after {waited:?}")]
    LinkTimeout { packet_id: u8, waited: Duration },

    #[error("transfer cancelled before packet {packet_id}")]
    Cancelled { packet_id: u8 },

    #[error("transfer cannot start from state {state:?}")]
    InvalidState { state: TransferState },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl TransferError {
    /// Link faults may clear on a fresh attempt; a mismatched echo will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::LinkTimeout { .. } | TransferError::Link(_))
    }
}
