//! Tagged byte containers inside a packet's data section.

use bytes::{BufMut, BytesMut};

use crate::error::QapError;
use crate::sexp;
use crate::types::Rexp;
use crate::wire;

/// Entry kind codes. The byte on the wire is `kind | flags`.
pub mod dt {
    pub const INT: u8 = 1;
    pub const CHAR: u8 = 2;
    pub const DOUBLE: u8 = 3;
    /// NUL-terminated string, 0x01-padded to a 4-byte multiple.
    pub const STRING: u8 = 4;
    /// Opaque bytes; may contain NUL.
    pub const BYTESTREAM: u8 = 5;
    /// One serialized X-value.
    pub const SEXP: u8 = 10;
    /// int32 count followed by that many entries.
    pub const ARRAY: u8 = 11;

    /// Mask recovering the kind from a wire header byte.
    pub const TYPE_MASK: u8 = 0x3F;
    /// Flag: 8-byte header with a 56-bit length.
    pub const LARGE: u8 = 0x40;
}

/// One entry: a kind plus its payload bytes. The 4- or 8-byte header form
/// is chosen at encode time from the payload length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketEntry {
    kind: u8,
    payload: Vec<u8>,
}

impl PacketEntry {
    /// A STRING entry: NUL-terminated, 0x01-padded to a 4-byte multiple.
    pub fn string(s: &str) -> Result<Self, QapError> {
        if s.as_bytes().contains(&0) {
            return Err(QapError::Decode(
                "string entry contains an interior NUL byte".into(),
            ));
        }
        let c_len = s.len() as u64 + 1;
        let padded = wire::quad_align(c_len);
        let mut payload = Vec::with_capacity(padded as usize);
        payload.extend_from_slice(s.as_bytes());
        payload.push(0);
        payload.resize(padded as usize, 0x01);
        Ok(Self {
            kind: dt::STRING,
            payload,
        })
    }

    /// An SEXP entry: exactly one serialized X-value, headers included.
    pub fn sexp(value: &Rexp) -> Result<Self, QapError> {
        Ok(Self {
            kind: dt::SEXP,
            payload: sexp::encode_to_vec(value)?,
        })
    }

    /// An entry received off the wire.
    pub(crate) fn from_parts(kind: u8, payload: Vec<u8>) -> Self {
        Self {
            kind: kind & dt::TYPE_MASK,
            payload,
        }
    }

    /// The entry kind, without flags.
    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_large(&self) -> bool {
        self.payload.len() as u64 > 0x7F_FFFF
    }

    pub fn header_len(&self) -> usize {
        if self.is_large() {
            8
        } else {
            4
        }
    }

    /// Bytes this entry occupies on the wire, header included.
    pub fn wire_len(&self) -> u64 {
        self.header_len() as u64 + self.payload.len() as u64
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        if self.is_large() {
            buf.put_u8(self.kind | dt::LARGE);
            wire::put_len56(buf, self.payload.len() as u64);
        } else {
            buf.put_u8(self.kind);
            wire::put_len24(buf, self.payload.len() as u32);
        }
        buf.put_slice(&self.payload);
    }

    /// The payload as a string, for STRING entries whose payload is
    /// NUL-terminated.
    pub fn as_string(&self) -> Option<String> {
        if self.kind != dt::STRING {
            return None;
        }
        let nul = self.payload.iter().position(|&b| b == 0)?;
        Some(String::from_utf8_lossy(&self.payload[..nul]).into_owned())
    }

    /// The payload as an X-value; Null when this is not an SEXP entry.
    pub fn as_rexp(&self) -> Rexp {
        if self.kind != dt::SEXP {
            return Rexp::null();
        }
        sexp::decode_value(&self.payload, 0).0
    }
}
