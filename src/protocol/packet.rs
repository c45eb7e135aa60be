//! Command packet framing and checksum.
//!
//! Every command sent to a light is a single frame:
//!
//! ```text
//! Header(1) + Command(1) + Sequence(1) + Length(1) + Payload(N) + Checksum(1)
//! ```
//!
//! The header is always `0x55`, the sequence byte is always `0xFF` and the
//! length byte counts the whole frame (`5 + N`). The checksum is the one's
//! complement of the folded byte sum of everything before it.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// First byte of every packet.
pub const PACKET_HEADER: u8 = 0x55;

/// Sequence byte. The lights never check it.
pub const PACKET_SEQUENCE: u8 = 0xFF;

/// Framing overhead in bytes (header, command, sequence, length, checksum).
pub const FRAME_OVERHEAD: usize = 5;

/// Largest payload whose frame length still fits the length byte.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - FRAME_OVERHEAD;

/// Calculate the packet checksum over `data`.
///
/// Sums all bytes, folds any carry above `0xFF` back into the low byte
/// (`(v >> 8) + (v & 0xFF)`) until the value fits one byte, then inverts.
///
/// # Example
///
/// ```
/// use mergbw_light_ble::protocol::calculate_checksum;
///
/// let checksum = calculate_checksum(&[0x55, 0x10, 0xFF, 0x07, 0xAA, 0xBB]);
/// assert_eq!(checksum, 0x2D);
/// ```
pub fn calculate_checksum(data: &[u8]) -> u8 {
    let mut total: u32 = data.iter().map(|&b| b as u32).sum();

    while total > 0xFF {
        total = (total >> 8) + (total & 0xFF);
    }

    !(total as u8)
}

/// Verify that a complete frame ends with the correct checksum.
///
/// Returns `false` for buffers too short to hold a frame.
pub fn verify_checksum(data: &[u8]) -> bool {
    if data.len() < FRAME_OVERHEAD {
        return false;
    }

    let body_len = data.len() - 1;
    calculate_checksum(&data[..body_len]) == data[body_len]
}

/// A single checksummed command frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    bytes: Bytes,
}

impl Packet {
    /// Build a packet for `command` carrying `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the payload is longer than
    /// [`MAX_PAYLOAD_LEN`].
    pub fn new(command: u8, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::InvalidParameter {
                name: "payload_len".to_string(),
                value: payload.len().to_string(),
            });
        }

        Ok(Self::frame(command, payload))
    }

    /// Frame a payload the caller knows to be short.
    pub(crate) fn frame(command: u8, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);

        let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
        buf.put_u8(PACKET_HEADER);
        buf.put_u8(command);
        buf.put_u8(PACKET_SEQUENCE);
        buf.put_u8((payload.len() + FRAME_OVERHEAD) as u8);
        buf.put_slice(payload);

        let checksum = calculate_checksum(&buf);
        buf.put_u8(checksum);

        Self {
            bytes: buf.freeze(),
        }
    }

    /// Parse and validate a frame received or captured from the wire.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FRAME_OVERHEAD {
            return Err(Error::InvalidData {
                context: format!("Packet too short: {} bytes", data.len()),
            });
        }

        if data[0] != PACKET_HEADER {
            return Err(Error::InvalidData {
                context: format!("Invalid header byte: {:#04x}", data[0]),
            });
        }

        if data[3] as usize != data.len() {
            return Err(Error::InvalidData {
                context: format!(
                    "Length byte {} does not match packet size {}",
                    data[3],
                    data.len()
                ),
            });
        }

        if !verify_checksum(data) {
            return Err(Error::InvalidData {
                context: format!(
                    "Checksum mismatch: expected {:#04x}, got {:#04x}",
                    calculate_checksum(&data[..data.len() - 1]),
                    data[data.len() - 1]
                ),
            });
        }

        Ok(Self {
            bytes: Bytes::copy_from_slice(data),
        })
    }

    /// Command code.
    pub fn command(&self) -> u8 {
        self.bytes[1]
    }

    /// Total frame length as encoded in the length byte.
    pub fn length(&self) -> u8 {
        self.bytes[3]
    }

    /// Payload bytes between the length byte and the checksum.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[4..self.bytes.len() - 1]
    }

    /// Trailing checksum byte.
    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// The complete frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the packet, returning the frame buffer.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
