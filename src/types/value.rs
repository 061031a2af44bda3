//! The recursive X-value tree.

use std::fmt;
use std::sync::Arc;

use super::{na, xt};
use crate::error::QapError;
use crate::wire;

/// Header threshold: payloads above this need the 8-byte header form.
pub(crate) const LARGE_THRESHOLD: u64 = 0x7F_FFFF;

/// Which untagged composite form a [`RexpKind::List`] serializes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// Generic vector of values (`XT_VECTOR`).
    Generic,
    /// Dotted pair list without tags (`XT_LIST_NOTAG`).
    Untagged,
    /// Language list without tags (`XT_LANG_NOTAG`).
    Language,
    /// Expression vector (`XT_VECTOR_EXP`).
    Expression,
}

impl ListKind {
    pub fn base_tag(self) -> u32 {
        match self {
            Self::Generic => xt::VECTOR,
            Self::Untagged => xt::LIST_NOTAG,
            Self::Language => xt::LANG_NOTAG,
            Self::Expression => xt::VECTOR_EXP,
        }
    }
}

/// Which tagged pair-list form a [`RexpKind::Pairs`] serializes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairKind {
    /// Dotted pair list with tags (`XT_LIST_TAG`).
    Tagged,
    /// Language list with tags (`XT_LANG_TAG`).
    Language,
}

impl PairKind {
    pub fn base_tag(self) -> u32 {
        match self {
            Self::Tagged => xt::LIST_TAG,
            Self::Language => xt::LANG_TAG,
        }
    }
}

/// Payload of an X-value, one variant per base tag.
///
/// String and boolean elements use `Option`: `None` is the materialized NA
/// (`0xFF` before the terminator, byte 2 respectively). Integer vectors
/// hold `i32::MIN` for NA and double vectors hold the NA bit pattern;
/// the `*_with_na` constructors and accessors translate both directions.
#[derive(Debug, Clone)]
pub enum RexpKind {
    Null,
    S4,
    /// Legacy scalar int.
    Int(i32),
    /// Legacy scalar double.
    Double(f64),
    /// Legacy scalar string.
    Str(Option<String>),
    /// Legacy one-byte boolean.
    Bool(Option<bool>),
    Ints(Vec<i32>),
    Doubles(Vec<f64>),
    Strings(Vec<Option<String>>),
    Bools(Vec<Option<bool>>),
    /// Complex numbers as (re, im).
    Complexes(Vec<(f64, f64)>),
    Raw(Vec<u8>),
    /// Untagged composite: children serialized back to back.
    List(ListKind, Vec<Rexp>),
    /// Tagged pair list: (value, tag) per element, value-then-tag on the
    /// wire, tag always a symbol name.
    Pairs(PairKind, Vec<(Rexp, String)>),
    /// Symbol name (`XT_SYMNAME`).
    Symbol(String),
    /// Closure: formals then body.
    Closure(Box<Rexp>, Box<Rexp>),
    /// Server-side type this client makes no assumptions about; payload is
    /// the server's SEXP type code.
    Unknown(i32),
}

/// An X-value: a typed payload plus an optional attribute pair-list.
///
/// The attribute node is shared immutable state (several values may carry
/// the same attribute list); its base tag is always `XT_LIST_TAG`.
#[derive(Debug, Clone)]
pub struct Rexp {
    kind: RexpKind,
    attrs: Option<Arc<Rexp>>,
}

impl Rexp {
    // -- Constructors --

    pub fn null() -> Self {
        RexpKind::Null.into()
    }

    pub fn s4() -> Self {
        RexpKind::S4.into()
    }

    /// Integer vector, values stored as given.
    pub fn ints(vals: Vec<i32>) -> Self {
        RexpKind::Ints(vals).into()
    }

    /// Integer vector; elements equal to `caller_na` become the wire NA.
    pub fn ints_with_na(vals: Vec<i32>, caller_na: i32) -> Self {
        let data = vals
            .into_iter()
            .map(|v| na::int_to_wire(v, caller_na))
            .collect();
        RexpKind::Ints(data).into()
    }

    /// Double vector, values stored as given.
    pub fn doubles(vals: Vec<f64>) -> Self {
        RexpKind::Doubles(vals).into()
    }

    /// Double vector; elements bit-equal to `caller_na` become the wire NA.
    pub fn doubles_with_na(vals: Vec<f64>, caller_na: f64) -> Self {
        let data = vals
            .into_iter()
            .map(|v| na::double_to_wire(v, caller_na))
            .collect();
        RexpKind::Doubles(data).into()
    }

    /// String vector with no NA elements.
    pub fn strings<I, S>(vals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data = vals.into_iter().map(|s| Some(s.into())).collect();
        RexpKind::Strings(data).into()
    }

    /// String vector; elements equal to `caller_na` become NA.
    pub fn strings_with_na<I, S>(vals: I, caller_na: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data = vals
            .into_iter()
            .map(|s| {
                let s = s.into();
                if s == caller_na {
                    None
                } else {
                    Some(s)
                }
            })
            .collect();
        RexpKind::Strings(data).into()
    }

    /// Boolean vector; `None` elements are NA.
    pub fn bools(vals: Vec<Option<bool>>) -> Self {
        RexpKind::Bools(vals).into()
    }

    pub fn complexes(vals: Vec<(f64, f64)>) -> Self {
        RexpKind::Complexes(vals).into()
    }

    pub fn raw(bytes: Vec<u8>) -> Self {
        RexpKind::Raw(bytes).into()
    }

    /// Generic vector of heterogeneous values (`XT_VECTOR`).
    pub fn list(items: Vec<Rexp>) -> Self {
        RexpKind::List(ListKind::Generic, items).into()
    }

    pub fn list_of(kind: ListKind, items: Vec<Rexp>) -> Self {
        RexpKind::List(kind, items).into()
    }

    /// Tagged pair list (`XT_LIST_TAG`); each element is (value, tag).
    pub fn tagged_list(pairs: Vec<(Rexp, String)>) -> Self {
        RexpKind::Pairs(PairKind::Tagged, pairs).into()
    }

    pub fn pairs_of(kind: PairKind, pairs: Vec<(Rexp, String)>) -> Self {
        RexpKind::Pairs(kind, pairs).into()
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        RexpKind::Symbol(name.into()).into()
    }

    pub fn closure(formals: Rexp, body: Rexp) -> Self {
        RexpKind::Closure(Box::new(formals), Box::new(body)).into()
    }

    pub fn unknown(sexp_type: i32) -> Self {
        RexpKind::Unknown(sexp_type).into()
    }

    /// Attaches an attribute pair-list built from (value, tag) pairs.
    pub fn with_attributes(mut self, pairs: Vec<(Rexp, String)>) -> Self {
        self.attrs = Some(Arc::new(Rexp::tagged_list(pairs)));
        self
    }

    /// Attaches a shared attribute node. The node must be a tagged pair
    /// list; anything else is a caller error.
    pub fn with_shared_attributes(mut self, attrs: Arc<Rexp>) -> Result<Self, QapError> {
        if attrs.base_tag() != xt::LIST_TAG {
            return Err(QapError::Logic(format!(
                "attributes must be a tagged pair list, got base tag {}",
                attrs.base_tag()
            )));
        }
        self.attrs = Some(attrs);
        Ok(self)
    }

    pub(crate) fn set_attrs(&mut self, attrs: Option<Arc<Rexp>>) {
        self.attrs = attrs;
    }

    // -- Inspection --

    pub fn kind(&self) -> &RexpKind {
        &self.kind
    }

    /// Base type tag, without flags.
    pub fn base_tag(&self) -> u32 {
        match &self.kind {
            RexpKind::Null => xt::NULL,
            RexpKind::S4 => xt::S4,
            RexpKind::Int(_) => xt::INT,
            RexpKind::Double(_) => xt::DOUBLE,
            RexpKind::Str(_) => xt::STR,
            RexpKind::Bool(_) => xt::BOOL,
            RexpKind::Ints(_) => xt::ARRAY_INT,
            RexpKind::Doubles(_) => xt::ARRAY_DOUBLE,
            RexpKind::Strings(_) => xt::ARRAY_STR,
            RexpKind::Bools(_) => xt::ARRAY_BOOL,
            RexpKind::Complexes(_) => xt::ARRAY_CPLX,
            RexpKind::Raw(_) => xt::RAW,
            RexpKind::List(kind, _) => kind.base_tag(),
            RexpKind::Pairs(kind, _) => kind.base_tag(),
            RexpKind::Symbol(_) => xt::SYMNAME,
            RexpKind::Closure(_, _) => xt::CLOS,
            RexpKind::Unknown(_) => xt::UNKNOWN,
        }
    }

    /// Effective wire type byte: `base | flags`. The large flag is derived
    /// from the serialized payload size including the attribute sub-tree;
    /// the attribute flag from attribute presence.
    pub fn type_tag(&self) -> u32 {
        let mut tag = self.base_tag();
        if self.declared_length() > LARGE_THRESHOLD {
            tag |= xt::LARGE;
        }
        if self.attrs.is_some() {
            tag |= xt::HAS_ATTR;
        }
        tag
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, RexpKind::Null)
    }

    pub fn attributes(&self) -> Option<&Rexp> {
        self.attrs.as_deref()
    }

    /// Looks up one attribute by tag name.
    pub fn attribute(&self, name: &str) -> Option<&Rexp> {
        self.attrs.as_deref().and_then(|a| a.member(name))
    }

    // -- Sizes --

    /// Serialized payload size in bytes, not counting this node's header
    /// or its attribute sub-tree. Children of composite forms contribute
    /// header + payload + their own attribute sub-trees.
    pub fn payload_byte_length(&self) -> u64 {
        match &self.kind {
            RexpKind::Null | RexpKind::S4 => 0,
            RexpKind::Int(_) | RexpKind::Unknown(_) => 4,
            RexpKind::Double(_) => 8,
            RexpKind::Bool(_) => 1,
            RexpKind::Str(s) => wire::quad_align(c_string_len(s.as_deref())),
            RexpKind::Ints(v) => 4 * v.len() as u64,
            RexpKind::Doubles(v) => 8 * v.len() as u64,
            RexpKind::Complexes(v) => 16 * v.len() as u64,
            RexpKind::Strings(v) => {
                let total: u64 = v.iter().map(|s| c_string_len(s.as_deref())).sum();
                wire::quad_align(total)
            }
            RexpKind::Bools(v) => 4 + wire::quad_align(v.len() as u64),
            RexpKind::Raw(b) => 4 + b.len() as u64,
            RexpKind::List(_, items) => items.iter().map(Rexp::serialized_length).sum(),
            RexpKind::Pairs(_, pairs) => pairs
                .iter()
                .map(|(value, tag)| value.serialized_length() + symbol_node_length(tag))
                .sum(),
            RexpKind::Symbol(name) => wire::quad_align(name.len() as u64 + 1),
            RexpKind::Closure(formals, body) => {
                formals.serialized_length() + body.serialized_length()
            }
        }
    }

    /// The value of this node's wire length field: payload plus the full
    /// attribute sub-tree (header and payload).
    pub(crate) fn declared_length(&self) -> u64 {
        self.payload_byte_length() + self.attr_serialized_length()
    }

    /// Full serialized size of this node: header + length field contents.
    pub(crate) fn serialized_length(&self) -> u64 {
        let declared = self.declared_length();
        let header = if declared > LARGE_THRESHOLD { 8 } else { 4 };
        header + declared
    }

    pub(crate) fn attr_serialized_length(&self) -> u64 {
        self.attrs.as_deref().map_or(0, Rexp::serialized_length)
    }

    // -- Typed access --

    pub fn as_ints(&self) -> Option<&[i32]> {
        match &self.kind {
            RexpKind::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match &self.kind {
            RexpKind::Doubles(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[Option<String>]> {
        match &self.kind {
            RexpKind::Strings(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bools(&self) -> Option<&[Option<bool>]> {
        match &self.kind {
            RexpKind::Bools(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match &self.kind {
            RexpKind::Raw(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Rexp]> {
        match &self.kind {
            RexpKind::List(_, items) => Some(items),
            _ => None,
        }
    }

    pub fn as_pairs(&self) -> Option<&[(Rexp, String)]> {
        match &self.kind {
            RexpKind::Pairs(_, pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            RexpKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Integer vector with wire NA replaced by `caller_na`.
    pub fn ints_with_na_value(&self, caller_na: i32) -> Option<Vec<i32>> {
        self.as_ints()
            .map(|v| v.iter().map(|&x| na::int_from_wire(x, caller_na)).collect())
    }

    /// Double vector with wire NA replaced by `caller_na`.
    pub fn doubles_with_na_value(&self, caller_na: f64) -> Option<Vec<f64>> {
        self.as_doubles().map(|v| {
            v.iter()
                .map(|&x| na::double_from_wire(x, caller_na))
                .collect()
        })
    }

    /// String vector with NA elements replaced by `caller_na`.
    pub fn strings_with_na_value(&self, caller_na: &str) -> Option<Vec<String>> {
        self.as_strings().map(|v| {
            v.iter()
                .map(|s| s.clone().unwrap_or_else(|| caller_na.to_string()))
                .collect()
        })
    }

    /// Flat network payload of a scalar-shaped value, via the scalar path.
    ///
    /// Composite kinds serialize their members individually and return a
    /// logic error here.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, QapError> {
        crate::sexp::encode::payload_bytes(self)
    }

    /// First value paired with `name` in a tagged pair list.
    pub fn member(&self, name: &str) -> Option<&Rexp> {
        self.as_pairs()?
            .iter()
            .find(|(_, tag)| tag == name)
            .map(|(value, _)| value)
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.member(name).is_some()
    }
}

impl From<RexpKind> for Rexp {
    fn from(kind: RexpKind) -> Self {
        Self { kind, attrs: None }
    }
}

/// NUL-terminated byte length of one string element; NA is the single
/// `0xFF` byte before the terminator.
fn c_string_len(s: Option<&str>) -> u64 {
    match s {
        Some(s) => s.len() as u64 + 1,
        None => 2,
    }
}

/// Serialized size of a pair tag: symbol header plus the 0x00-padded name.
fn symbol_node_length(name: &str) -> u64 {
    let padded = wire::quad_align(name.len() as u64 + 1);
    let header = if padded > LARGE_THRESHOLD { 8 } else { 4 };
    header + padded
}

// Equality is structural with doubles compared by bit pattern, so NA and
// other NaN payloads compare equal to themselves across a round-trip.
impl PartialEq for Rexp {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && match (&self.attrs, &other.attrs) {
                (None, None) => true,
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
    }
}

impl Eq for Rexp {}

impl PartialEq for RexpKind {
    fn eq(&self, other: &Self) -> bool {
        use RexpKind::*;
        match (self, other) {
            (Null, Null) | (S4, S4) => true,
            (Int(a), Int(b)) => a == b,
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Str(a), Str(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Ints(a), Ints(b)) => a == b,
            (Doubles(a), Doubles(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Strings(a), Strings(b)) => a == b,
            (Bools(a), Bools(b)) => a == b,
            (Complexes(a), Complexes(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|((ar, ai), (br, bi))| {
                        ar.to_bits() == br.to_bits() && ai.to_bits() == bi.to_bits()
                    })
            }
            (Raw(a), Raw(b)) => a == b,
            (List(ka, a), List(kb, b)) => ka == kb && a == b,
            (Pairs(ka, a), Pairs(kb, b)) => ka == kb && a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Closure(fa, ba), Closure(fb, bb)) => fa == fb && ba == bb,
            (Unknown(a), Unknown(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for RexpKind {}

impl From<i32> for Rexp {
    fn from(v: i32) -> Self {
        Rexp::ints(vec![v])
    }
}

impl From<f64> for Rexp {
    fn from(v: f64) -> Self {
        Rexp::doubles(vec![v])
    }
}

impl From<&str> for Rexp {
    fn from(s: &str) -> Self {
        Rexp::strings([s])
    }
}

impl From<String> for Rexp {
    fn from(s: String) -> Self {
        Rexp::strings([s])
    }
}

impl From<Vec<i32>> for Rexp {
    fn from(v: Vec<i32>) -> Self {
        Rexp::ints(v)
    }
}

impl From<Vec<f64>> for Rexp {
    fn from(v: Vec<f64>) -> Self {
        Rexp::doubles(v)
    }
}

impl From<Vec<String>> for Rexp {
    fn from(v: Vec<String>) -> Self {
        Rexp::strings(v)
    }
}

impl From<Vec<Rexp>> for Rexp {
    fn from(v: Vec<Rexp>) -> Self {
        Rexp::list(v)
    }
}

impl fmt::Display for Rexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RexpKind::Null => write!(f, "NULL"),
            RexpKind::S4 => write!(f, "<S4>"),
            RexpKind::Int(v) => write!(f, "{v}"),
            RexpKind::Double(v) => write!(f, "{v}"),
            RexpKind::Str(Some(s)) => write!(f, "\"{s}\""),
            RexpKind::Str(None) => write!(f, "NA"),
            RexpKind::Bool(Some(b)) => write!(f, "{b}"),
            RexpKind::Bool(None) => write!(f, "NA"),
            RexpKind::Ints(v) => write_seq(f, v.iter(), |f, x| write!(f, "{x}")),
            RexpKind::Doubles(v) => write_seq(f, v.iter(), |f, x| {
                if na::is_wire_double_na(**x) {
                    write!(f, "NA")
                } else {
                    write!(f, "{x}")
                }
            }),
            RexpKind::Strings(v) => write_seq(f, v.iter(), |f, x| match x {
                Some(s) => write!(f, "\"{s}\""),
                None => write!(f, "NA"),
            }),
            RexpKind::Bools(v) => write_seq(f, v.iter(), |f, x| match x {
                Some(b) => write!(f, "{b}"),
                None => write!(f, "NA"),
            }),
            RexpKind::Complexes(v) => {
                write_seq(f, v.iter(), |f, c| write!(f, "{}+{}i", c.0, c.1))
            }
            RexpKind::Raw(b) => write!(f, "<{} bytes>", b.len()),
            RexpKind::List(_, items) => write_seq(f, items.iter(), |f, x| write!(f, "{x}")),
            RexpKind::Pairs(_, pairs) => {
                write!(f, "[")?;
                for (i, (value, tag)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{tag}: {value}")?;
                }
                write!(f, "]")
            }
            RexpKind::Symbol(name) => write!(f, "`{name}`"),
            RexpKind::Closure(formals, body) => write!(f, "function({formals}) {body}"),
            RexpKind::Unknown(t) => write!(f, "<unknown SEXP type {t}>"),
        }
    }
}

fn write_seq<T>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
    mut each: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        each(f, &item)?;
    }
    write!(f, "]")
}
