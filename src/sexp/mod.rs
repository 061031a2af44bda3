//! X-value wire codec.
//!
//! Serialization walks the value tree emitting per-node headers (short or
//! large form), attribute pair-lists, and payloads; parsing reconstructs
//! the tree and degrades malformed value payloads to the Null node rather
//! than failing, as long as the framing is intact.

pub mod decode;
pub mod encode;

pub use decode::decode_value;
pub use encode::{encode_to_vec, encode_value};

pub(crate) use crate::types::LARGE_THRESHOLD;

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use crate::types::{na, ListKind, PairKind, Rexp};

    use super::{decode_value, encode_to_vec};

    fn leaf_value() -> impl Strategy<Value = Rexp> {
        prop_oneof![
            Just(Rexp::null()),
            Just(Rexp::s4()),
            proptest::collection::vec(any::<i32>(), 0..8).prop_map(Rexp::ints),
            proptest::collection::vec(any::<f64>(), 0..8).prop_map(Rexp::doubles),
            proptest::collection::vec(
                proptest::option::of("[a-zA-Z0-9 ]{0,12}"),
                0..6
            )
            .prop_map(|v| Rexp::from(crate::types::RexpKind::Strings(v))),
            proptest::collection::vec(proptest::option::of(any::<bool>()), 0..9)
                .prop_map(Rexp::bools),
            proptest::collection::vec((any::<f64>(), any::<f64>()), 0..4)
                .prop_map(Rexp::complexes),
            proptest::collection::vec(any::<u8>(), 0..16).prop_map(Rexp::raw),
            "[a-zA-Z.][a-zA-Z0-9._]{0,10}".prop_map(Rexp::symbol),
            any::<i32>().prop_map(Rexp::unknown),
        ]
    }

    fn any_value() -> impl Strategy<Value = Rexp> {
        leaf_value().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                (
                    prop_oneof![
                        Just(ListKind::Generic),
                        Just(ListKind::Untagged),
                        Just(ListKind::Language),
                        Just(ListKind::Expression),
                    ],
                    proptest::collection::vec(inner.clone(), 0..4)
                )
                    .prop_map(|(kind, items)| Rexp::list_of(kind, items)),
                (
                    prop_oneof![Just(PairKind::Tagged), Just(PairKind::Language)],
                    proptest::collection::vec(
                        (inner.clone(), "[a-zA-Z][a-zA-Z0-9._]{0,8}"),
                        0..4
                    )
                )
                    .prop_map(|(kind, pairs)| Rexp::pairs_of(kind, pairs)),
                (inner.clone(), inner.clone())
                    .prop_map(|(formals, body)| Rexp::closure(formals, body)),
                (
                    inner.clone(),
                    proptest::collection::vec(
                        (inner, "[a-zA-Z][a-zA-Z0-9._]{0,8}"),
                        1..3
                    )
                )
                    .prop_map(|(value, attrs)| value.with_attributes(attrs)),
            ]
        })
    }

    proptest! {
        #[test]
        fn value_round_trip(value in any_value()) {
            let bytes = encode_to_vec(&value).expect("encode failed");
            prop_assert_eq!(bytes.len() as u64, value.serialized_length());

            let (back, consumed) = decode_value(&bytes, 0);
            prop_assert_eq!(consumed, bytes.len());
            prop_assert_eq!(&back, &value);
            prop_assert_eq!(back.base_tag(), value.base_tag());
        }

        #[test]
        fn int_na_symmetry(
            vals in proptest::collection::vec(any::<i32>(), 0..16),
            caller_na in any::<i32>(),
        ) {
            // The caller NA occupies the wire sentinel slot, so a vector
            // that happens to contain the raw sentinel maps onto it too.
            let cleaned: Vec<i32> = vals
                .into_iter()
                .map(|v| if v == na::INT_NA { caller_na } else { v })
                .collect();
            let value = Rexp::ints_with_na(cleaned.clone(), caller_na);
            let bytes = encode_to_vec(&value).expect("encode failed");
            let (back, _) = decode_value(&bytes, 0);
            prop_assert_eq!(back.ints_with_na_value(caller_na).unwrap(), cleaned);
        }

        #[test]
        fn double_na_symmetry(
            vals in proptest::collection::vec(any::<f64>(), 0..16),
            caller_na in any::<f64>(),
        ) {
            let cleaned: Vec<f64> = vals
                .into_iter()
                .map(|v| if na::is_wire_double_na(v) { caller_na } else { v })
                .collect();
            let value = Rexp::doubles_with_na(cleaned.clone(), caller_na);
            let bytes = encode_to_vec(&value).expect("encode failed");
            let (back, _) = decode_value(&bytes, 0);
            let got = back.doubles_with_na_value(caller_na).unwrap();
            prop_assert_eq!(got.len(), cleaned.len());
            for (g, c) in got.iter().zip(&cleaned) {
                prop_assert!(na::same_double_bits(*g, *c), "{} != {}", g, c);
            }
        }

        #[test]
        fn string_payloads_stay_quad_aligned(
            vals in proptest::collection::vec(
                proptest::option::of("[a-zA-Z0-9 ]{0,20}"),
                0..8
            )
        ) {
            let value: Rexp = crate::types::RexpKind::Strings(vals).into();
            prop_assert_eq!(value.payload_byte_length() % 4, 0);
            let bytes = encode_to_vec(&value).expect("encode failed");
            prop_assert_eq!((bytes.len() as u64 - 4) % 4, 0);
        }
    }
}
