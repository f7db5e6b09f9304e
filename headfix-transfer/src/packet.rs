//! Packet framing and array payloads.
//!
//! Frame layout (all multi-byte fields little-endian):
//! - 1 byte packet id
//! - 4 bytes payload length
//! - payload
//! - 1 byte checksum (XOR of every preceding byte)

use crate::error::{DecodeError, EncodeError};

/// Status payload telling the firmware the upload is complete.
pub const STATUS_COMPLETE: u8 = 0x01;

// ============================================================================
// Framed Packet
// ============================================================================

/// One unit of wire transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedPacket {
    pub id: u8,
    pub payload: Vec<u8>,
    /// Payload length in bytes.
    pub length: u32,
}

impl FramedPacket {
    /// Id byte plus length field.
    pub const HEADER_SIZE: usize = 5;
    pub const CHECKSUM_SIZE: usize = 1;

    pub fn new(id: u8, payload: Vec<u8>) -> Self {
        let length = payload.len() as u32;
        Self { id, payload, length }
    }

    /// Total size of the frame on the wire.
    pub fn frame_len(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + Self::CHECKSUM_SIZE
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.frame_len());
        bytes.push(self.id);
        bytes.extend_from_slice(&self.length.to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes.push(xor_checksum(&bytes));
        bytes
    }

    /// Parse a frame.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is short, the declared length disagrees
    /// with the buffer, or the checksum does not match.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let min = Self::HEADER_SIZE + Self::CHECKSUM_SIZE;
        if bytes.len() < min {
            return Err(DecodeError::Truncated {
                received: bytes.len(),
                expected: min,
            });
        }

        let (body, trailer) = bytes.split_at(bytes.len() - Self::CHECKSUM_SIZE);
        let computed = xor_checksum(body);
        if trailer[0] != computed {
            return Err(DecodeError::ChecksumMismatch {
                received: trailer[0],
                computed,
            });
        }

        let id = body[0];
        let length = u32::from_le_bytes([body[1], body[2], body[3], body[4]]);
        let payload = &body[Self::HEADER_SIZE..];
        if length as usize != payload.len() {
            return Err(DecodeError::LengthMismatch {
                declared: length,
                actual: payload.len(),
            });
        }

        Ok(Self {
            id,
            payload: payload.to_vec(),
            length,
        })
    }
}

/// XOR of all bytes.
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

// ============================================================================
// Array Payloads
// ============================================================================

/// Encode `values` as a u16 element count followed by i32 elements.
pub fn encode_array(values: &[i32]) -> Result<Vec<u8>, EncodeError> {
    let count = u16::try_from(values.len()).map_err(|_| EncodeError::ArrayTooLong {
        len: values.len(),
        max: u16::MAX as usize,
    })?;
    let mut payload = Vec::with_capacity(2 + values.len() * 4);
    payload.extend_from_slice(&count.to_le_bytes());
    for v in values {
        payload.extend_from_slice(&v.to_le_bytes());
    }
    Ok(payload)
}

pub fn decode_array(payload: &[u8]) -> Result<Vec<i32>, DecodeError> {
    if payload.len() < 2 {
        return Err(DecodeError::Truncated {
            received: payload.len(),
            expected: 2,
        });
    }
    let count = u16::from_le_bytes([payload[0], payload[1]]);
    let body = &payload[2..];
    if body.len() != count as usize * 4 {
        return Err(DecodeError::CountMismatch {
            count,
            bytes: body.len(),
        });
    }
    Ok(body
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let packet = FramedPacket::new(3, vec![0xAA, 0x01]);
        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), packet.frame_len());
        assert_eq!(&bytes[..5], &[3, 2, 0, 0, 0]);
        assert_eq!(&bytes[5..7], &[0xAA, 0x01]);
        assert_eq!(bytes[7], 3 ^ 2 ^ 0xAA ^ 0x01);
        assert_eq!(FramedPacket::from_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_frame_checksum_catches_bit_flip() {
        let mut bytes = FramedPacket::new(1, vec![1, 2, 3, 4]).to_bytes();
        bytes[6] ^= 0x10;
        assert!(matches!(
            FramedPacket::from_bytes(&bytes),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_frame_length_mismatch() {
        let mut bytes = vec![1, 9, 0, 0, 0, 0xFF];
        let sum = xor_checksum(&bytes);
        bytes.push(sum);
        assert_eq!(
            FramedPacket::from_bytes(&bytes),
            Err(DecodeError::LengthMismatch {
                declared: 9,
                actual: 1
            })
        );
        assert!(matches!(
            FramedPacket::from_bytes(&[1, 0]),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_array_roundtrip() {
        let values = vec![0, 1, -1, i32::MAX, i32::MIN, 30000];
        let payload = encode_array(&values).unwrap();
        assert_eq!(payload.len(), 2 + 6 * 4);
        assert_eq!(&payload[..2], &[6, 0]);
        assert_eq!(decode_array(&payload).unwrap(), values);
        assert_eq!(decode_array(&encode_array(&[]).unwrap()).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn test_array_count_mismatch() {
        let mut payload = encode_array(&[1, 2, 3]).unwrap();
        payload.truncate(payload.len() - 1);
        assert_eq!(
            decode_array(&payload),
            Err(DecodeError::CountMismatch { count: 3, bytes: 11 })
        );
    }
}
