//! Byte links to the task microcontroller.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use headfix_timing::Timer;
use tracing::{debug, info};

use crate::error::LinkError;
use crate::retry::RetryPolicy;

/// Exclusive, synchronous byte link.
pub trait SerialChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Bytes ready to be received without blocking.
    fn bytes_available(&mut self) -> Result<usize, LinkError>;

    fn poll_available(&mut self) -> Result<bool, LinkError> {
        Ok(self.bytes_available()? > 0)
    }

    /// Receive exactly `n` bytes.
    fn receive(&mut self, n: usize) -> Result<Vec<u8>, LinkError>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}

// ============================================================================
// Hardware serial port
// ============================================================================

/// USB serial connection to the task controller.
pub struct SerialPortChannel {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
}

impl SerialPortChannel {
    /// Open a serial connection.
    ///
    /// # Arguments
    ///
    /// * `port_name` - Serial port name (e.g., "/dev/ttyACM0" or "COM3")
    /// * `baud_rate` - Baud rate the firmware was built for
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Unavailable`] if the port cannot be opened.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, LinkError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| LinkError::Unavailable {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;
        info!(port = port_name, baud_rate, "serial port opened");

        Ok(Self {
            port: Some(port),
            name: port_name.to_string(),
        })
    }

    /// Open with retries, sleeping `policy.backoff_ms` between attempts.
    pub fn open_with_retry<T: Timer>(
        port_name: &str,
        baud_rate: u32,
        policy: &RetryPolicy,
        timer: &T,
    ) -> Result<Self, LinkError> {
        policy.run(
            timer,
            |e| matches!(e, LinkError::Unavailable { .. }),
            |_| Self::open(port_name, baud_rate),
        )
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, LinkError> {
        self.port.as_mut().ok_or(LinkError::Closed)
    }
}

impl SerialChannel for SerialPortChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn receive(&mut self, n: usize) -> Result<Vec<u8>, LinkError> {
        let mut buf = vec![0u8; n];
        self.port()?.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.name, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

/// List available serial ports.
#[must_use]
pub fn list_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

// ============================================================================
// Simulated device
// ============================================================================

/// Misbehaviour injected into the simulated device's echo of one
/// transmission (0 = metadata packet).
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Flip one bit of the echoed frame.
    FlipBit {
        transmission: usize,
        byte: usize,
        bit: u8,
    },
    /// Flip one payload bit and recompute the checksum, so only the
    /// content comparison can catch it.
    CorruptPayload {
        transmission: usize,
        offset: usize,
        bit: u8,
    },
    /// Echo only the first `keep` bytes.
    Truncate { transmission: usize, keep: usize },
    /// Never answer.
    Silent { transmission: usize },
}

impl Fault {
    fn transmission(&self) -> usize {
        match self {
            Fault::FlipBit { transmission, .. }
            | Fault::CorruptPayload { transmission, .. }
            | Fault::Truncate { transmission, .. }
            | Fault::Silent { transmission } => *transmission,
        }
    }
}

/// In-memory device that echoes every transmission back byte-for-byte.
#[derive(Debug, Default)]
pub struct LoopbackChannel {
    inbox: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    faults: Vec<Fault>,
    closed: bool,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Every frame sent so far, in order.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    fn echo_of(&self, transmission: usize, bytes: &[u8]) -> Option<Vec<u8>> {
        let mut echo = bytes.to_vec();
        for fault in self.faults.iter().filter(|f| f.transmission() == transmission) {
            match fault {
                Fault::FlipBit { byte, bit, .. } => {
                    if let Some(b) = echo.get_mut(*byte) {
                        *b ^= 1u8 << *bit;
                    }
                }
                Fault::CorruptPayload { offset, bit, .. } => {
                    let header = crate::packet::FramedPacket::HEADER_SIZE;
                    let Some(last) = echo.len().checked_sub(1) else {
                        continue;
                    };
                    if let Some(b) = echo.get_mut(header + offset) {
                        *b ^= 1u8 << *bit;
                    }
                    echo[last] = crate::packet::xor_checksum(&echo[..last]);
                }
                Fault::Truncate { keep, .. } => echo.truncate(*keep),
                Fault::Silent { .. } => return None,
            }
        }
        Some(echo)
    }
}

impl SerialChannel for LoopbackChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        let transmission = self.sent.len();
        if let Some(echo) = self.echo_of(transmission, bytes) {
            self.inbox.extend(echo);
        }
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        Ok(self.inbox.len())
    }

    fn receive(&mut self, n: usize) -> Result<Vec<u8>, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        if self.inbox.len() < n {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{} of {n} bytes available", self.inbox.len()),
            )));
        }
        Ok(self.inbox.drain(..n).collect())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FramedPacket;

    #[test]
    fn test_loopback_echoes() {
        let mut channel = LoopbackChannel::new();
        assert!(!channel.poll_available().unwrap());
        channel.send(&[1, 2, 3]).unwrap();
        assert!(channel.poll_available().unwrap());
        assert_eq!(channel.receive(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(channel.sent(), &[vec![1, 2, 3]]);
    }

    #[test]
    fn test_loopback_flip_bit() {
        let mut channel = LoopbackChannel::new().with_fault(Fault::FlipBit {
            transmission: 1,
            byte: 0,
            bit: 0,
        });
        channel.send(&[4]).unwrap();
        channel.send(&[4]).unwrap();
        assert_eq!(channel.receive(2).unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_corrupt_payload_keeps_frame_valid() {
        let frame = FramedPacket::new(2, vec![0, 0, 0]).to_bytes();
        let mut channel = LoopbackChannel::new().with_fault(Fault::CorruptPayload {
            transmission: 0,
            offset: 1,
            bit: 3,
        });
        channel.send(&frame).unwrap();
        let echo = channel.receive(frame.len()).unwrap();
        let parsed = FramedPacket::from_bytes(&echo).unwrap();
        assert_eq!(parsed.payload, vec![0, 8, 0]);
    }

    #[test]
    fn test_truncated_echo() {
        let mut channel = LoopbackChannel::new().with_fault(Fault::Truncate {
            transmission: 0,
            keep: 2,
        });
        channel.send(&[1, 2, 3, 4]).unwrap();
        assert_eq!(channel.bytes_available().unwrap(), 2);
    }

    #[test]
    fn test_silent_and_closed() {
        let mut channel = LoopbackChannel::new().with_fault(Fault::Silent { transmission: 0 });
        channel.send(&[9]).unwrap();
        assert_eq!(channel.bytes_available().unwrap(), 0);
        assert!(matches!(channel.receive(1), Err(LinkError::Io(_))));
        channel.close();
        assert!(!channel.is_open());
        assert!(matches!(channel.send(&[1]), Err(LinkError::Closed)));
    }
}
