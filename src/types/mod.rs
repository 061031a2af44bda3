//! X-value types carried inside SEXP packet entries.

pub mod na;
mod value;

pub use value::{ListKind, PairKind, Rexp, RexpKind};

pub(crate) use value::LARGE_THRESHOLD;

/// Wire type tags for serialized X-values.
///
/// The byte on the wire is `base | flags`; `TYPE_MASK` recovers the base.
pub mod xt {
    pub const NULL: u32 = 0;
    /// Legacy scalar int (pre-0103 servers still emit it).
    pub const INT: u32 = 1;
    /// Legacy scalar double.
    pub const DOUBLE: u32 = 2;
    /// Legacy scalar string.
    pub const STR: u32 = 3;
    /// Legacy one-byte boolean (1 = true, 0 = false, 2 = NA).
    pub const BOOL: u32 = 6;
    pub const S4: u32 = 7;

    pub const VECTOR: u32 = 16;
    pub const CLOS: u32 = 18;
    pub const SYMNAME: u32 = 19;
    pub const LIST_NOTAG: u32 = 20;
    pub const LIST_TAG: u32 = 21;
    pub const LANG_NOTAG: u32 = 22;
    pub const LANG_TAG: u32 = 23;
    pub const VECTOR_EXP: u32 = 26;

    pub const ARRAY_INT: u32 = 32;
    pub const ARRAY_DOUBLE: u32 = 33;
    pub const ARRAY_STR: u32 = 34;
    pub const ARRAY_BOOL: u32 = 36;
    pub const RAW: u32 = 37;
    pub const ARRAY_CPLX: u32 = 38;
    pub const UNKNOWN: u32 = 48;

    /// Mask recovering the base tag from a wire type byte.
    pub const TYPE_MASK: u32 = 63;
    /// Flag: this node uses the 8-byte header with a 56-bit length.
    pub const LARGE: u32 = 64;
    /// Flag: an attribute pair-list precedes this node's payload.
    pub const HAS_ATTR: u32 = 128;
}
