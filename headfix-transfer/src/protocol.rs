use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use headfix_core::ArrayKind;
use headfix_timing::{Deadline, LatencyStats, Timer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::SerialChannel;
use crate::error::{EncodeError, TransferError};
use crate::metadata::Metadata;
use crate::packet::{FramedPacket, STATUS_COMPLETE, decode_array, encode_array};

/// How packet ids advance across array packets.
///
/// Id 0 is always the metadata packet and arrays start at 1. The two
/// firmware generations disagree on split arrays, so this is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketIdPolicy {
    /// One id per array; both halves of a split array share it.
    #[default]
    PerArray,
    /// One id per packet; each half of a split array takes its own.
    PerPacket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions {
    /// Arrays longer than this are sent as two halves.
    pub split_threshold: usize,
    pub id_policy: PacketIdPolicy,
    pub echo_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            split_threshold: 60,
            id_policy: PacketIdPolicy::PerArray,
            echo_timeout_ms: 5000,
            poll_interval_ms: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    MetadataSent,
    MetadataAcked,
    ArraySent(usize),
    ArrayAcked(usize),
    StatusSent,
    StatusAcked,
    Closed,
    Aborted,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferState::Closed | TransferState::Aborted)
    }
}

/// Shared flag checked between packets.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    pub packets_sent: usize,
    pub bytes_sent: usize,
    /// Id carried by the final status packet.
    pub status_packet_id: u8,
    pub echo_latency: LatencyStats,
}

/// Sends metadata, arrays and a completion status, verifying every echo.
///
/// Owns the channel for the session and closes it on every exit path,
/// including drop.
pub struct TransferProtocol<C: SerialChannel, T: Timer> {
    channel: C,
    timer: T,
    options: TransferOptions,
    state: TransferState,
    cancel: CancelToken,
    latencies: Vec<Duration>,
    packets_sent: usize,
    bytes_sent: usize,
}

impl<C: SerialChannel, T: Timer> TransferProtocol<C, T> {
    pub fn new(channel: C, timer: T, options: TransferOptions) -> Self {
        Self {
            channel,
            timer,
            options,
            state: TransferState::Idle,
            cancel: CancelToken::new(),
            latencies: Vec::new(),
            packets_sent: 0,
            bytes_sent: 0,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Runs the whole upload. The channel is closed when this returns,
    /// whatever the outcome.
    pub fn run(
        &mut self,
        metadata: &Metadata,
        arrays: &[(ArrayKind, Vec<i32>)],
    ) -> Result<TransferReport, TransferError> {
        if self.state != TransferState::Idle {
            return Err(TransferError::InvalidState { state: self.state });
        }

        let result = self.transfer(metadata, arrays);
        self.channel.close();
        match &result {
            Ok(report) => {
                self.state = TransferState::Closed;
                info!(
                    packets = report.packets_sent,
                    bytes = report.bytes_sent,
                    mean_echo_ms = report.echo_latency.mean_ns / 1_000_000.0,
                    "session upload verified"
                );
            }
            Err(e) => {
                warn!(state = ?self.state, error = %e, "session upload aborted");
                self.state = TransferState::Aborted;
            }
        }
        result
    }

    fn transfer(
        &mut self,
        metadata: &Metadata,
        arrays: &[(ArrayKind, Vec<i32>)],
    ) -> Result<TransferReport, TransferError> {
        self.check_cancel(0)?;
        let packet = FramedPacket::new(0, metadata.to_bytes().to_vec());
        self.send(&packet)?;
        self.state = TransferState::MetadataSent;
        let echo = self.await_echo(&packet)?;
        let echoed = Metadata::from_bytes(&echo.payload)
            .map_err(|e| mismatch(packet.id, e.to_string()))?;
        let diffs = metadata.mismatches(&echoed);
        if !diffs.is_empty() {
            return Err(mismatch(packet.id, diffs.join("; ")));
        }
        self.state = TransferState::MetadataAcked;

        let mut next_id: u8 = 1;
        for (index, (kind, values)) in arrays.iter().enumerate() {
            let chunks = self.split(values);
            let parts = chunks.len();
            for (part, chunk) in chunks.into_iter().enumerate() {
                self.check_cancel(next_id)?;
                let packet = FramedPacket::new(next_id, encode_array(chunk)?);
                self.send(&packet)?;
                self.state = TransferState::ArraySent(index);
                let echo = self.await_echo(&packet)?;
                verify_array(packet.id, chunk, &echo.payload)?;
                debug!(array = %kind, part = part + 1, of = parts, id = packet.id, len = chunk.len(), "array packet acknowledged");

                if self.options.id_policy == PacketIdPolicy::PerPacket {
                    next_id = bump(next_id)?;
                }
            }
            if self.options.id_policy == PacketIdPolicy::PerArray {
                next_id = bump(next_id)?;
            }
            self.state = TransferState::ArrayAcked(index);
        }

        self.check_cancel(next_id)?;
        let packet = FramedPacket::new(next_id, vec![STATUS_COMPLETE]);
        self.send(&packet)?;
        self.state = TransferState::StatusSent;
        let echo = self.await_echo(&packet)?;
        if echo.payload != packet.payload {
            return Err(mismatch(
                packet.id,
                format!("status sent {:?}, echoed {:?}", packet.payload, echo.payload),
            ));
        }
        self.state = TransferState::StatusAcked;

        Ok(TransferReport {
            packets_sent: self.packets_sent,
            bytes_sent: self.bytes_sent,
            status_packet_id: packet.id,
            echo_latency: LatencyStats::from_samples(&self.latencies),
        })
    }

    fn split<'v>(&self, values: &'v [i32]) -> Vec<&'v [i32]> {
        if values.len() > self.options.split_threshold {
            let (first, second) = values.split_at(values.len() / 2);
            vec![first, second]
        } else {
            vec![values]
        }
    }

    fn send(&mut self, packet: &FramedPacket) -> Result<(), TransferError> {
        let bytes = packet.to_bytes();
        self.channel.send(&bytes)?;
        self.packets_sent += 1;
        self.bytes_sent += bytes.len();
        Ok(())
    }

    /// Polls until the full echo frame is buffered or the echo timeout passes.
    fn await_echo(&mut self, packet: &FramedPacket) -> Result<FramedPacket, TransferError> {
        let expected = packet.frame_len();
        let started = self.timer.now();
        let deadline = Deadline::after(&self.timer, Duration::from_millis(self.options.echo_timeout_ms));
        let poll = Duration::from_millis(self.options.poll_interval_ms);

        while !(self.channel.poll_available()? && self.channel.bytes_available()? >= expected) {
            if deadline.expired(&self.timer) {
                let buffered = self.channel.bytes_available()?;
                if buffered > 0 {
                    // The device answered, but not with the frame it was sent.
                    return Err(mismatch(
                        packet.id,
                        format!("echo truncated: {buffered} of {expected} bytes"),
                    ));
                }
                return Err(TransferError::LinkTimeout {
                    packet_id: packet.id,
                    waited: deadline.waited(&self.timer),
                });
            }
            self.timer.sleep(poll);
        }

        let bytes = self.channel.receive(expected)?;
        self.latencies.push(self.timer.elapsed(started));
        let echo = FramedPacket::from_bytes(&bytes).map_err(|e| mismatch(packet.id, e.to_string()))?;
        if echo.id != packet.id {
            return Err(mismatch(
                packet.id,
                format!("echo carries packet id {}", echo.id),
            ));
        }
        Ok(echo)
    }

    fn check_cancel(&self, packet_id: u8) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled { packet_id });
        }
        Ok(())
    }
}

impl<C: SerialChannel, T: Timer> Drop for TransferProtocol<C, T> {
    fn drop(&mut self) {
        if self.channel.is_open() {
            self.channel.close();
        }
    }
}

fn verify_array(packet_id: u8, sent: &[i32], echo_payload: &[u8]) -> Result<(), TransferError> {
    let echoed = decode_array(echo_payload).map_err(|e| mismatch(packet_id, e.to_string()))?;
    if echoed.len() != sent.len() {
        return Err(mismatch(
            packet_id,
            format!("sent {} elements, echoed {}", sent.len(), echoed.len()),
        ));
    }
    if let Some((i, (s, e))) = sent.iter().zip(&echoed).enumerate().find(|(_, (s, e))| s != e) {
        return Err(mismatch(
            packet_id,
            format!("element {i}: sent {s}, echoed {e}"),
        ));
    }
    Ok(())
}

fn bump(id: u8) -> Result<u8, TransferError> {
    id.checked_add(1).ok_or_else(|| {
        TransferError::Encode(EncodeError::FieldOverflow {
            field: "packet_id",
            value: u64::from(id) + 1,
            width: 1,
        })
    })
}

fn mismatch(packet_id: u8, detail: String) -> TransferError {
    TransferError::VerificationMismatch { packet_id, detail }
}
