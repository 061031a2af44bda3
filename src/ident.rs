//! The 32-byte server identification blob.
//!
//! A compatible server announces itself unsolicited on accept: `Rsrv`, a
//! four-digit protocol version, `QAP1`, then up to five 4-byte attribute
//! tokens. Recognized tokens are `AR<scheme>` (authentication required,
//! scheme `pt` plaintext or `uc` crypt) and `K<salt>` (authentication
//! key, default `rs`).

/// Length of the identification blob.
pub const IDENT_LEN: usize = 32;

/// The protocol version this client targets.
pub const PROTOCOL_VERSION: &[u8; 4] = b"0103";

/// Offset where the optional 4-byte attribute tokens begin.
const ATTR_OFFSET: usize = 12;

/// Parsed view over the identification bytes sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerIdent {
    bytes: [u8; IDENT_LEN],
}

impl ServerIdent {
    pub fn new(bytes: [u8; IDENT_LEN]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; IDENT_LEN] {
        &self.bytes
    }

    /// The blob as text, for display.
    pub fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// The four-digit protocol version field.
    pub fn version(&self) -> &[u8] {
        &self.bytes[4..8]
    }

    /// Checks the signature fields: `Rsrv` at 0..4, `QAP1` at 8..12, and
    /// (unless any version is allowed) `0103` at 4..8.
    pub fn is_compatible(&self, allow_any_version: bool) -> bool {
        if &self.bytes[0..4] != b"Rsrv" {
            return false;
        }
        if !allow_any_version && &self.bytes[4..8] != PROTOCOL_VERSION {
            return false;
        }
        &self.bytes[8..12] == b"QAP1"
    }

    /// The optional attribute region as 4-byte tokens.
    fn attr_tokens(&self) -> impl Iterator<Item = &[u8]> {
        self.bytes[ATTR_OFFSET..].chunks_exact(4)
    }

    /// Whether any `AR..` token announces that authentication is required.
    pub fn auth_required(&self) -> bool {
        self.attr_tokens().any(|t| &t[0..2] == b"AR")
    }

    /// Whether an `AR..` token offers the given 2-character scheme
    /// (`"pt"` plaintext, `"uc"` crypt).
    pub fn auth_has_scheme(&self, scheme: &str) -> bool {
        self.attr_tokens()
            .any(|t| &t[0..2] == b"AR" && &t[2..4] == scheme.as_bytes())
    }

    /// The authentication key/salt from a `K...` token, `"rs"` if absent.
    pub fn auth_key(&self) -> String {
        for token in self.attr_tokens() {
            if token[0] == b'K' {
                return String::from_utf8_lossy(&token[1..3]).into_owned();
            }
        }
        "rs".to_string()
    }
}
