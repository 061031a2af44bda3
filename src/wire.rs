//! Little-endian primitive codec.
//!
//! QAP1 is little-endian exclusively. Everything that knows about byte
//! order lives here: writers append to a `BytesMut`, readers take a slice
//! and an in-out cursor and return `None` when the slice runs out. The
//! 24-bit and 56-bit forms carry the short and large header lengths.

use bytes::{BufMut, BytesMut};

/// Maximum value a 24-bit (short header) length field can hold.
pub const MAX_LEN24: u64 = 0x00FF_FFFF;

/// Maximum value a 56-bit (large header) length field can hold.
pub const MAX_LEN56: u64 = 0x00FF_FFFF_FFFF_FFFF;

pub fn put_u16(buf: &mut BytesMut, v: u16) {
    buf.put_u16_le(v);
}

pub fn put_u32(buf: &mut BytesMut, v: u32) {
    buf.put_u32_le(v);
}

pub fn put_u64(buf: &mut BytesMut, v: u64) {
    buf.put_u64_le(v);
}

pub fn put_i32(buf: &mut BytesMut, v: i32) {
    buf.put_i32_le(v);
}

/// Doubles travel as their little-endian IEEE-754 bit pattern; NaN
/// payloads (the NA sentinel in particular) must survive untouched.
pub fn put_f64(buf: &mut BytesMut, v: f64) {
    buf.put_u64_le(v.to_bits());
}

/// Writes the low 24 bits of `v`, little-endian.
pub fn put_len24(buf: &mut BytesMut, v: u32) {
    buf.put_slice(&v.to_le_bytes()[..3]);
}

/// Writes the low 56 bits of `v`, little-endian.
pub fn put_len56(buf: &mut BytesMut, v: u64) {
    buf.put_slice(&v.to_le_bytes()[..7]);
}

pub fn read_u8(buf: &[u8], pos: &mut usize) -> Option<u8> {
    let b = *buf.get(*pos)?;
    *pos += 1;
    Some(b)
}

pub fn read_u16(buf: &[u8], pos: &mut usize) -> Option<u16> {
    let bytes = buf.get(*pos..*pos + 2)?;
    *pos += 2;
    Some(u16::from_le_bytes(bytes.try_into().unwrap()))
}

pub fn read_u32(buf: &[u8], pos: &mut usize) -> Option<u32> {
    let bytes = buf.get(*pos..*pos + 4)?;
    *pos += 4;
    Some(u32::from_le_bytes(bytes.try_into().unwrap()))
}

pub fn read_u64(buf: &[u8], pos: &mut usize) -> Option<u64> {
    let bytes = buf.get(*pos..*pos + 8)?;
    *pos += 8;
    Some(u64::from_le_bytes(bytes.try_into().unwrap()))
}

pub fn read_i32(buf: &[u8], pos: &mut usize) -> Option<i32> {
    read_u32(buf, pos).map(|v| v as i32)
}

pub fn read_f64(buf: &[u8], pos: &mut usize) -> Option<f64> {
    read_u64(buf, pos).map(f64::from_bits)
}

/// Reads a 24-bit little-endian length.
pub fn read_len24(buf: &[u8], pos: &mut usize) -> Option<u64> {
    let bytes = buf.get(*pos..*pos + 3)?;
    *pos += 3;
    let mut out = [0u8; 8];
    out[..3].copy_from_slice(bytes);
    Some(u64::from_le_bytes(out))
}

/// Reads a 56-bit little-endian length.
pub fn read_len56(buf: &[u8], pos: &mut usize) -> Option<u64> {
    let bytes = buf.get(*pos..*pos + 7)?;
    *pos += 7;
    let mut out = [0u8; 8];
    out[..7].copy_from_slice(bytes);
    Some(u64::from_le_bytes(out))
}

/// Rounds `len` up to the next multiple of four.
pub fn quad_align(len: u64) -> u64 {
    (len + 3) & !3
}
