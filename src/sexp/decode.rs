//! X-value parsing: bytes → `Rexp`.
//!
//! The parser is deliberately forgiving: a malformed value payload becomes
//! the Null node and the cursor still advances by the declared length, so
//! one bad node never desynchronizes the surrounding stream. Only framing
//! (handled a layer up) can fail hard.

use std::sync::Arc;

use crate::types::{xt, ListKind, PairKind, Rexp, RexpKind};
use crate::wire;

/// Decodes one X-value starting at `start`.
///
/// Returns the value and the position just past it. On a truncated header
/// the remainder of the buffer is consumed and Null is returned.
pub fn decode_value(buf: &[u8], start: usize) -> (Rexp, usize) {
    let mut pos = start;

    let Some(type_byte) = wire::read_u8(buf, &mut pos) else {
        return (Rexp::null(), buf.len());
    };
    let type_tag = u32::from(type_byte);
    let base = type_tag & xt::TYPE_MASK;

    let declared = if type_tag & xt::LARGE != 0 {
        wire::read_len56(buf, &mut pos)
    } else {
        wire::read_len24(buf, &mut pos)
    };
    let Some(declared) = declared else {
        return (Rexp::null(), buf.len());
    };

    let header_end = pos;
    let end = match header_end.checked_add(declared as usize) {
        Some(end) if end <= buf.len() => end,
        _ => return (Rexp::null(), buf.len()),
    };

    // The attribute pair-list, when flagged, sits between the header and
    // the payload. If it fails to parse as a tagged pair list the value is
    // kept and the attribute region is skipped.
    let mut attrs = None;
    let mut payload_start = header_end;
    if type_tag & xt::HAS_ATTR != 0 {
        let (attr, attr_end) = decode_value(&buf[..end], header_end);
        if attr_end <= header_end || attr_end > end {
            return (Rexp::null(), end);
        }
        if attr.base_tag() == xt::LIST_TAG {
            attrs = Some(Arc::new(attr));
        }
        payload_start = attr_end;
    }

    let mut value = decode_payload(&buf[..end], payload_start, base);
    value.set_attrs(attrs);
    (value, end)
}

/// Parses the payload region `[pos, buf.len())` for the given base tag.
fn decode_payload(buf: &[u8], mut pos: usize, base: u32) -> Rexp {
    let end = buf.len();
    match base {
        xt::NULL => Rexp::null(),
        xt::S4 => Rexp::s4(),

        xt::INT => match wire::read_i32(buf, &mut pos) {
            Some(v) => RexpKind::Int(v).into(),
            None => Rexp::null(),
        },
        xt::DOUBLE => match wire::read_f64(buf, &mut pos) {
            Some(v) => RexpKind::Double(v).into(),
            None => Rexp::null(),
        },
        xt::BOOL => match wire::read_u8(buf, &mut pos) {
            Some(b) => RexpKind::Bool(decode_bool_byte(b)).into(),
            None => Rexp::null(),
        },
        xt::STR => match decode_string_block(&buf[pos..end]) {
            Some(mut strings) if !strings.is_empty() => {
                RexpKind::Str(strings.swap_remove(0)).into()
            }
            _ => Rexp::null(),
        },

        xt::ARRAY_INT => {
            let mut vals = Vec::with_capacity((end - pos) / 4);
            while let Some(v) = wire::read_i32(buf, &mut pos) {
                vals.push(v);
            }
            Rexp::ints(vals)
        }
        xt::ARRAY_DOUBLE => {
            let mut vals = Vec::with_capacity((end - pos) / 8);
            while let Some(v) = wire::read_f64(buf, &mut pos) {
                vals.push(v);
            }
            Rexp::doubles(vals)
        }
        xt::ARRAY_CPLX => {
            let mut vals = Vec::with_capacity((end - pos) / 16);
            while pos + 16 <= end {
                let re = wire::read_f64(buf, &mut pos).unwrap_or_default();
                let im = wire::read_f64(buf, &mut pos).unwrap_or_default();
                vals.push((re, im));
            }
            Rexp::complexes(vals)
        }
        xt::ARRAY_STR => match decode_string_block(&buf[pos..end]) {
            Some(strings) => RexpKind::Strings(strings).into(),
            None => Rexp::null(),
        },
        xt::ARRAY_BOOL => {
            let Some(count) = wire::read_i32(buf, &mut pos) else {
                return Rexp::null();
            };
            let count = count.max(0) as usize;
            if pos + count > end {
                return Rexp::null();
            }
            let vals = buf[pos..pos + count]
                .iter()
                .map(|&b| decode_bool_byte(b))
                .collect();
            Rexp::bools(vals)
        }
        xt::RAW => {
            let Some(count) = wire::read_i32(buf, &mut pos) else {
                return Rexp::null();
            };
            let count = count.max(0) as usize;
            if pos + count > end {
                return Rexp::null();
            }
            Rexp::raw(buf[pos..pos + count].to_vec())
        }

        xt::VECTOR | xt::LIST_NOTAG | xt::LANG_NOTAG | xt::VECTOR_EXP => {
            let kind = match base {
                xt::VECTOR => ListKind::Generic,
                xt::LIST_NOTAG => ListKind::Untagged,
                xt::LANG_NOTAG => ListKind::Language,
                _ => ListKind::Expression,
            };
            let mut items = Vec::new();
            while pos < end {
                let (item, next) = decode_value(buf, pos);
                if next <= pos {
                    break;
                }
                items.push(item);
                pos = next;
            }
            Rexp::list_of(kind, items)
        }
        xt::LIST_TAG | xt::LANG_TAG => {
            let kind = if base == xt::LIST_TAG {
                PairKind::Tagged
            } else {
                PairKind::Language
            };
            let mut pairs = Vec::new();
            while pos < end {
                // Value first, then the SYMNAME tag.
                let (value, value_end) = decode_value(buf, pos);
                if value_end <= pos || value_end >= end {
                    return Rexp::null();
                }
                if u32::from(buf[value_end]) & xt::TYPE_MASK != xt::SYMNAME {
                    return Rexp::null();
                }
                let (tag, tag_end) = decode_value(buf, value_end);
                let Some(name) = tag.as_symbol() else {
                    return Rexp::null();
                };
                pairs.push((value, name.to_string()));
                pos = tag_end;
            }
            Rexp::pairs_of(kind, pairs)
        }
        xt::SYMNAME => match c_string_prefix(&buf[pos..end]) {
            Some(name) => Rexp::symbol(name),
            None => Rexp::null(),
        },
        xt::CLOS => {
            let (formals, formals_end) = decode_value(buf, pos);
            if formals_end <= pos || formals_end > end {
                return Rexp::null();
            }
            let (body, _) = decode_value(buf, formals_end);
            Rexp::closure(formals, body)
        }
        xt::UNKNOWN => match wire::read_i32(buf, &mut pos) {
            Some(t) => Rexp::unknown(t),
            None => Rexp::null(),
        },

        _ => Rexp::null(),
    }
}

/// Walks a concatenated-string payload: NUL terminates an element, 0x01
/// bytes are alignment padding, a lone `0xFF` element is NA. Returns
/// `None` when the region cannot safely be read as strings (its final
/// byte is neither a terminator nor padding).
fn decode_string_block(region: &[u8]) -> Option<Vec<Option<String>>> {
    if let Some(&last) = region.last() {
        if last > 0x01 {
            return None;
        }
    }

    let mut strings = Vec::new();
    let mut pos = 0;
    while pos < region.len() {
        if region[pos] == 0x01 {
            pos += 1;
            continue;
        }
        let rest = &region[pos..];
        let nul = rest.iter().position(|&b| b == 0)?;
        let bytes = &rest[..nul];
        if bytes == [crate::types::na::STRING_NA_BYTE] {
            strings.push(None);
        } else {
            strings.push(Some(String::from_utf8_lossy(bytes).into_owned()));
        }
        pos += nul + 1;
    }
    Some(strings)
}

/// The NUL-terminated prefix of a symbol-name payload.
fn c_string_prefix(region: &[u8]) -> Option<String> {
    let nul = region.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&region[..nul]).into_owned())
}

fn decode_bool_byte(b: u8) -> Option<bool> {
    match b {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::encode::encode_to_vec;
    use crate::types::na;

    fn round_trip(value: &Rexp) -> Rexp {
        let bytes = encode_to_vec(value).expect("encode failed");
        let (back, consumed) = decode_value(&bytes, 0);
        assert_eq!(consumed, bytes.len(), "cursor must land on the end");
        back
    }

    #[test]
    fn round_trip_null() {
        assert_eq!(round_trip(&Rexp::null()), Rexp::null());
    }

    #[test]
    fn round_trip_int_vector_with_na() {
        let v = Rexp::ints_with_na(vec![2, 10, 77, -5555, 300], -5555);
        let back = round_trip(&v);
        assert_eq!(back, v);
        assert_eq!(back.as_ints().unwrap()[3], i32::MIN);
    }

    #[test]
    fn round_trip_double_vector_with_na() {
        let v = Rexp::doubles_with_na(vec![0.0, 10.5, 77.0, -5.5, -1e20], -1e20);
        let back = round_trip(&v);
        assert_eq!(back, v);
        assert!(na::is_wire_double_na(back.as_doubles().unwrap()[4]));
    }

    #[test]
    fn round_trip_string_vector() {
        let v = Rexp::strings_with_na(
            ["Hello World", "Test", "RClient", "", "Goodbye World"],
            "",
        );
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn round_trip_heterogeneous_list() {
        let v = Rexp::list(vec![
            Rexp::doubles(vec![1.5, 2.5]),
            Rexp::strings(["x"]),
            Rexp::ints(vec![42]),
        ]);
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn round_trip_tagged_pair_list() {
        let v = Rexp::tagged_list(vec![
            (Rexp::doubles(vec![0.5]), "REXP Double".into()),
            (Rexp::ints(vec![1, 2]), "REXP Integer".into()),
            (Rexp::strings(["s"]), "REXP String".into()),
        ]);
        let back = round_trip(&v);
        assert_eq!(back, v);
        assert_eq!(
            back.member("REXP Double").and_then(Rexp::as_doubles),
            Some(&[0.5][..])
        );
    }

    #[test]
    fn round_trip_attributes() {
        let v = Rexp::doubles(vec![1.0]).with_attributes(vec![(
            Rexp::strings(["Attribute", "Information"]),
            "ATTR".into(),
        )]);
        let back = round_trip(&v);
        assert_eq!(back, v);
        let attr = back.attribute("ATTR").unwrap();
        assert_eq!(attr.as_strings().unwrap().len(), 2);
    }

    #[test]
    fn round_trip_closure_and_symbol() {
        let v = Rexp::closure(
            Rexp::tagged_list(vec![(Rexp::null(), "x".into())]),
            Rexp::list_of(
                ListKind::Language,
                vec![Rexp::symbol("+"), Rexp::symbol("x"), Rexp::doubles(vec![1.0])],
            ),
        );
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn round_trip_legacy_scalars() {
        for v in [
            Rexp::from(RexpKind::Int(-7)),
            Rexp::from(RexpKind::Double(2.25)),
            Rexp::from(RexpKind::Str(Some("legacy".into()))),
            Rexp::from(RexpKind::Str(None)),
            Rexp::from(RexpKind::Bool(Some(true))),
            Rexp::from(RexpKind::Bool(None)),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn round_trip_bool_raw_complex_unknown() {
        for v in [
            Rexp::bools(vec![Some(true), None, Some(false), Some(true), None]),
            Rexp::raw(vec![1, 2, 3, 4, 5]),
            Rexp::complexes(vec![(1.0, -1.0), (0.0, 0.5)]),
            Rexp::unknown(99),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn empty_composites_decode_to_empty_collections() {
        for v in [
            Rexp::list(vec![]),
            Rexp::tagged_list(vec![]),
            Rexp::ints(vec![]),
            Rexp::strings(Vec::<String>::new()),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn malformed_string_block_becomes_null() {
        // Declared as ARRAY_STR but the last byte is neither NUL nor 0x01.
        let bytes = [34u8, 4, 0, 0, b'a', b'b', b'c', b'd'];
        let (value, consumed) = decode_value(&bytes, 0);
        assert!(value.is_null());
        assert_eq!(consumed, 8);
    }

    #[test]
    fn non_symname_pair_tag_becomes_null() {
        // A pair list whose tag slot holds an int vector, not a SYMNAME.
        let mut bytes = vec![21u8, 16, 0, 0];
        bytes.extend_from_slice(&[32, 4, 0, 0, 7, 0, 0, 0]); // value
        bytes.extend_from_slice(&[32, 4, 0, 0, 1, 0, 0, 0]); // bogus tag
        let (value, consumed) = decode_value(&bytes, 0);
        assert!(value.is_null());
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn failed_attribute_parse_keeps_base_value() {
        // HAS_ATTR set, but the attribute region holds an int vector
        // rather than a tagged pair list.
        let mut bytes = vec![32u8 | 0x80, 12, 0, 0];
        bytes.extend_from_slice(&[32, 4, 0, 0, 5, 0, 0, 0]); // "attribute"
        bytes.extend_from_slice(&[9, 0, 0, 0]); // actual int payload
        let (value, consumed) = decode_value(&bytes, 0);
        assert_eq!(consumed, bytes.len());
        assert_eq!(value.as_ints(), Some(&[9][..]));
        assert!(value.attributes().is_none());
    }

    #[test]
    fn truncated_header_consumes_rest() {
        let bytes = [32u8, 9];
        let (value, consumed) = decode_value(&bytes, 0);
        assert!(value.is_null());
        assert_eq!(consumed, 2);
    }

    #[test]
    fn declared_length_beyond_buffer_is_null() {
        let bytes = [32u8, 200, 0, 0, 1, 2, 3];
        let (value, consumed) = decode_value(&bytes, 0);
        assert!(value.is_null());
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn unrecognized_base_tag_decodes_to_null_but_advances() {
        // Base tag 47 is not defined; the node reads as Null and the
        // cursor still skips its declared payload.
        let bytes = [47u8, 4, 0, 0, 1, 2, 3, 4, 32, 4, 0, 0, 6, 0, 0, 0];
        let (value, consumed) = decode_value(&bytes, 0);
        assert!(value.is_null());
        assert_eq!(consumed, 8);

        let (next, rest) = decode_value(&bytes, consumed);
        assert_eq!(next.as_ints(), Some(&[6][..]));
        assert_eq!(rest, bytes.len());
    }

    #[test]
    fn trailing_zero_after_last_string_is_tolerated() {
        // "ab\0" then a stray 0x00 instead of 0x01 padding: parses, with
        // the stray terminator reading as one empty string.
        let bytes = [34u8, 4, 0, 0, b'a', b'b', 0, 0];
        let (value, _) = decode_value(&bytes, 0);
        let strings = value.as_strings().unwrap();
        assert_eq!(strings[0].as_deref(), Some("ab"));
    }
}
