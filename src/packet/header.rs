//! The 16-byte QAP1 packet header.

use bytes::BytesMut;

use crate::wire;

/// Size of the fixed packet header on the wire.
pub const HEADER_LEN: usize = 16;

/// Packet header: command, then the entry-byte count split into low and
/// high 32-bit halves around a data offset (written as zero).
///
/// On responses the command word doubles as a status word: bit 0 is the
/// success bit, bit 1 the error bit, bits 24..30 a 7-bit status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QapHeader {
    pub command: u32,
    pub length: u64,
    pub offset: u32,
}

impl QapHeader {
    pub fn new(command: u32, length: u64) -> Self {
        Self {
            command,
            length,
            offset: 0,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        wire::put_u32(buf, self.command);
        wire::put_u32(buf, (self.length & 0xFFFF_FFFF) as u32);
        wire::put_u32(buf, self.offset);
        wire::put_u32(buf, (self.length >> 32) as u32);
    }

    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        let word = |i: usize| {
            u32::from_le_bytes([
                bytes[4 * i],
                bytes[4 * i + 1],
                bytes[4 * i + 2],
                bytes[4 * i + 3],
            ])
        };
        Self {
            command: word(0),
            length: (u64::from(word(3)) << 32) | u64::from(word(1)),
            offset: word(2),
        }
    }

    /// Success bit of a response command word.
    pub fn is_ok(&self) -> bool {
        self.command & 0x1 != 0
    }

    /// Error bit of a response command word.
    pub fn is_error(&self) -> bool {
        self.command & 0x2 != 0
    }

    /// The 7-bit status code in bits 24..30.
    pub fn status(&self) -> u32 {
        (self.command >> 24) & 0x7F
    }
}
