//! X-value serialization: `Rexp` → bytes.

use bytes::{BufMut, BytesMut};

use crate::error::QapError;
use crate::types::{xt, Rexp, RexpKind};
use crate::wire;

use super::LARGE_THRESHOLD;

/// Serializes one X-value, header first, then the attribute pair-list when
/// present, then the payload. The large flag is chosen per node from the
/// payload size including the attribute sub-tree.
pub fn encode_value(buf: &mut BytesMut, value: &Rexp) -> Result<(), QapError> {
    let declared = value.declared_length();
    if declared > wire::MAX_LEN56 {
        return Err(QapError::Decode(format!(
            "X-value payload of {declared} bytes exceeds the 56-bit length field"
        )));
    }

    let tag = value.type_tag();
    buf.put_u8(tag as u8);
    if tag & xt::LARGE != 0 {
        wire::put_len56(buf, declared);
    } else {
        wire::put_len24(buf, declared as u32);
    }

    if let Some(attrs) = value.attributes() {
        encode_value(buf, attrs)?;
    }

    match value.kind() {
        RexpKind::List(_, items) => {
            for item in items {
                encode_value(buf, item)?;
            }
            Ok(())
        }
        RexpKind::Pairs(_, pairs) => {
            for (value, tag) in pairs {
                encode_value(buf, value)?;
                encode_tag_symbol(buf, tag)?;
            }
            Ok(())
        }
        RexpKind::Closure(formals, body) => {
            encode_value(buf, formals)?;
            encode_value(buf, body)
        }
        _ => scalar_payload(buf, value),
    }
}

/// Serializes one X-value into a fresh buffer.
pub fn encode_to_vec(value: &Rexp) -> Result<Vec<u8>, QapError> {
    let mut buf = BytesMut::with_capacity(value.serialized_length() as usize);
    encode_value(&mut buf, value)?;
    Ok(buf.to_vec())
}

/// Flat network payload of a scalar-shaped X-value, without its header.
///
/// Composite kinds (lists, pair lists, closures) serialize recursively
/// through [`encode_value`]; asking them for a flat payload is a caller
/// error.
pub fn payload_bytes(value: &Rexp) -> Result<Vec<u8>, QapError> {
    match value.kind() {
        RexpKind::List(_, _) | RexpKind::Pairs(_, _) | RexpKind::Closure(_, _) => {
            Err(QapError::Logic(
                "composite X-value has no flat scalar payload; serialize it whole".into(),
            ))
        }
        _ => {
            let mut buf = BytesMut::with_capacity(value.payload_byte_length() as usize);
            scalar_payload(&mut buf, value)?;
            Ok(buf.to_vec())
        }
    }
}

/// The payload of every non-composite kind.
fn scalar_payload(buf: &mut BytesMut, value: &Rexp) -> Result<(), QapError> {
    match value.kind() {
        RexpKind::Null | RexpKind::S4 => Ok(()),
        RexpKind::Int(v) => {
            wire::put_i32(buf, *v);
            Ok(())
        }
        RexpKind::Double(v) => {
            wire::put_f64(buf, *v);
            Ok(())
        }
        RexpKind::Bool(v) => {
            buf.put_u8(bool_byte(*v));
            Ok(())
        }
        RexpKind::Str(s) => put_strings(buf, std::slice::from_ref(s)),
        RexpKind::Ints(vals) => {
            for v in vals {
                wire::put_i32(buf, *v);
            }
            Ok(())
        }
        RexpKind::Doubles(vals) => {
            for v in vals {
                wire::put_f64(buf, *v);
            }
            Ok(())
        }
        RexpKind::Complexes(vals) => {
            for (re, im) in vals {
                wire::put_f64(buf, *re);
                wire::put_f64(buf, *im);
            }
            Ok(())
        }
        RexpKind::Strings(vals) => put_strings(buf, vals),
        RexpKind::Bools(vals) => {
            wire::put_i32(buf, vals.len() as i32);
            for v in vals {
                buf.put_u8(bool_byte(*v));
            }
            let pad = wire::quad_align(vals.len() as u64) - vals.len() as u64;
            buf.put_bytes(0x00, pad as usize);
            Ok(())
        }
        RexpKind::Raw(bytes) => {
            wire::put_i32(buf, bytes.len() as i32);
            buf.put_slice(bytes);
            Ok(())
        }
        RexpKind::Symbol(name) => put_symbol_name(buf, name),
        RexpKind::Unknown(sexp_type) => {
            wire::put_i32(buf, *sexp_type);
            Ok(())
        }
        RexpKind::List(_, _) | RexpKind::Pairs(_, _) | RexpKind::Closure(_, _) => {
            Err(QapError::Logic(
                "composite X-value has no flat scalar payload; serialize it whole".into(),
            ))
        }
    }
}

/// A pair tag: a SYMNAME node with the NUL-terminated name 0x00-padded to
/// a 4-byte multiple.
fn encode_tag_symbol(buf: &mut BytesMut, name: &str) -> Result<(), QapError> {
    let padded = wire::quad_align(name.len() as u64 + 1);
    let mut tag = xt::SYMNAME;
    if padded > LARGE_THRESHOLD {
        tag |= xt::LARGE;
    }
    buf.put_u8(tag as u8);
    if tag & xt::LARGE != 0 {
        wire::put_len56(buf, padded);
    } else {
        wire::put_len24(buf, padded as u32);
    }
    put_symbol_name(buf, name)
}

fn put_symbol_name(buf: &mut BytesMut, name: &str) -> Result<(), QapError> {
    if name.as_bytes().contains(&0) {
        return Err(QapError::Decode(
            "symbol name contains an interior NUL byte".into(),
        ));
    }
    buf.put_slice(name.as_bytes());
    buf.put_u8(0);
    let written = name.len() as u64 + 1;
    let pad = wire::quad_align(written) - written;
    buf.put_bytes(0x00, pad as usize);
    Ok(())
}

/// Concatenated NUL-terminated strings, 0x01-padded to a 4-byte multiple.
/// NA elements become the single `0xFF` byte before the terminator.
fn put_strings(buf: &mut BytesMut, vals: &[Option<String>]) -> Result<(), QapError> {
    let mut written: u64 = 0;
    for val in vals {
        match val {
            Some(s) => {
                if s.as_bytes().contains(&0) {
                    return Err(QapError::Decode(
                        "string element contains an interior NUL byte".into(),
                    ));
                }
                buf.put_slice(s.as_bytes());
                buf.put_u8(0);
                written += s.len() as u64 + 1;
            }
            None => {
                buf.put_u8(crate::types::na::STRING_NA_BYTE);
                buf.put_u8(0);
                written += 2;
            }
        }
    }
    let pad = wire::quad_align(written) - written;
    buf.put_bytes(0x01, pad as usize);
    Ok(())
}

fn bool_byte(v: Option<bool>) -> u8 {
    match v {
        Some(true) => 1,
        Some(false) => 0,
        None => 2,
    }
}
