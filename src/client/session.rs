//! High-level Rserve client: lazy connect, commands, response inspection.

use tracing::debug;

use crate::error::QapError;
use crate::ident::ServerIdent;
use crate::packet::{cmd, dt, stat, Packet, PacketEntry};
use crate::types::Rexp;

use super::connection::QapConnection;

/// The port Rserve listens on by default.
pub const DEFAULT_PORT: u16 = 6311;

/// How `login` presents the credential.
///
/// The scheme must match what the server offered in its identification
/// attributes: `pt` accepts the password as typed; `uc` expects the crypt
/// hash of the password, computed by the caller with [`RserveClient::auth_key`]
/// as the salt. Hashing itself is outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Plain,
    Crypt,
}

impl AuthScheme {
    /// The two-character scheme token used in the identification blob.
    pub fn token(self) -> &'static str {
        match self {
            Self::Plain => "pt",
            Self::Crypt => "uc",
        }
    }
}

/// One client bound to one endpoint, owning at most one stream.
///
/// Construction performs no I/O; the connection is established on the
/// first command or metadata query. Any network failure closes the stream
/// before the error is returned, and the next call connects afresh — the
/// failed request is never retried automatically. Requests take `&mut
/// self`, so one session cannot run two commands at once.
pub struct RserveClient {
    host: String,
    port: u16,
    allow_any_version: bool,
    conn: Option<QapConnection>,
    last_response: Option<Packet>,
}

impl RserveClient {
    /// A client for `host:port`. With `allow_any_version` unset, only
    /// protocol `0103` servers are accepted at connect time.
    pub fn new(host: impl Into<String>, port: u16, allow_any_version: bool) -> Self {
        Self {
            host: host.into(),
            port,
            allow_any_version,
            conn: None,
            last_response: None,
        }
    }

    // -- Commands --

    /// Evaluates `expr` remotely and returns the resulting X-value.
    ///
    /// Null is returned when the response has no entries or its first
    /// entry is not an SEXP.
    pub async fn eval(&mut self, expr: &str) -> Result<Rexp, QapError> {
        let entry = PacketEntry::string(&format!("{expr}\n"))?;
        self.submit(Packet::request(cmd::EVAL, vec![entry])).await?;
        Ok(self.last_response_value(0).unwrap_or_else(Rexp::null))
    }

    /// Evaluates `expr` remotely, discarding the result. Returns the
    /// response success bit.
    pub async fn void_eval(&mut self, expr: &str) -> Result<bool, QapError> {
        let entry = PacketEntry::string(&format!("{expr}\n"))?;
        self.submit(Packet::request(cmd::VOID_EVAL, vec![entry]))
            .await?;
        Ok(self.last_response_ok())
    }

    /// Assigns `value` to the remote symbol `sym`. Returns the response
    /// success bit.
    pub async fn assign(
        &mut self,
        sym: &str,
        value: impl Into<Rexp>,
    ) -> Result<bool, QapError> {
        let value = value.into();
        let entries = vec![PacketEntry::string(sym)?, PacketEntry::sexp(&value)?];
        self.submit(Packet::request(cmd::SET_SEXP, entries)).await?;
        Ok(self.last_response_ok())
    }

    /// Authenticates with the plaintext scheme.
    pub async fn login(&mut self, user: &str, password: &str) -> Result<bool, QapError> {
        self.login_with(user, password, AuthScheme::Plain).await
    }

    /// Authenticates with an explicit scheme. For [`AuthScheme::Crypt`],
    /// `secret` is the crypt hash of the password, salted with
    /// [`auth_key`](Self::auth_key); for [`AuthScheme::Plain`] it is the
    /// password itself. Either way the entry layout is `user\nsecret`.
    pub async fn login_with(
        &mut self,
        user: &str,
        secret: &str,
        scheme: AuthScheme,
    ) -> Result<bool, QapError> {
        debug!(user, scheme = scheme.token(), "logging in");
        let entry = PacketEntry::string(&format!("{user}\n{secret}"))?;
        self.submit(Packet::request(cmd::LOGIN, vec![entry])).await?;
        Ok(self.last_response_ok())
    }

    /// Asks the server to shut down. `key` may be empty.
    pub async fn shutdown(&mut self, key: &str) -> Result<bool, QapError> {
        let entry = PacketEntry::string(key)?;
        self.submit(Packet::request(cmd::SHUTDOWN, vec![entry]))
            .await?;
        Ok(self.last_response_ok())
    }

    // -- Server metadata (connects lazily, like any command) --

    /// The 32-byte identification blob, as text.
    pub async fn server_identification(&mut self) -> Result<String, QapError> {
        Ok(self.ident().await?.as_str())
    }

    /// The four-digit protocol version field of the identification.
    pub async fn protocol_version(&mut self) -> Result<String, QapError> {
        let ident = self.ident().await?;
        Ok(String::from_utf8_lossy(ident.version()).into_owned())
    }

    /// Whether the server requires authentication before commands.
    pub async fn auth_required(&mut self) -> Result<bool, QapError> {
        Ok(self.ident().await?.auth_required())
    }

    /// Whether the server offers the given authentication scheme.
    pub async fn auth_has_scheme(&mut self, scheme: AuthScheme) -> Result<bool, QapError> {
        Ok(self.ident().await?.auth_has_scheme(scheme.token()))
    }

    /// The key/salt for crypt authentication (`"rs"` when the server does
    /// not announce one).
    pub async fn auth_key(&mut self) -> Result<String, QapError> {
        Ok(self.ident().await?.auth_key())
    }

    // -- Connection lifecycle --

    /// Closes the stream if one is open. Calling this twice is a no-op
    /// the second time.
    pub fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            debug!(host = %self.host, port = self.port, "disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    // -- Last-response inspection --

    /// Success bit of the most recent response; false before any command.
    pub fn last_response_ok(&self) -> bool {
        self.last_response.as_ref().is_some_and(Packet::is_ok)
    }

    /// The 7-bit status code of the most recent response.
    pub fn last_response_status(&self) -> u32 {
        self.last_response.as_ref().map_or(0, Packet::status)
    }

    /// Human-readable form of [`last_response_status`](Self::last_response_status).
    pub fn last_response_status_message(&self) -> &'static str {
        stat::message(self.last_response_status())
    }

    pub fn last_response_entry_count(&self) -> usize {
        self.last_response
            .as_ref()
            .map_or(0, |p| p.entries().len())
    }

    /// Entry kind at `index`, flags stripped.
    pub fn last_response_entry_kind(&self, index: usize) -> Option<u8> {
        self.entry(index).map(PacketEntry::kind)
    }

    /// String payload at `index`; only for STRING entries whose payload
    /// is NUL-terminated.
    pub fn last_response_string(&self, index: usize) -> Option<String> {
        self.entry(index).and_then(PacketEntry::as_string)
    }

    /// X-value at `index`; only for SEXP entries.
    pub fn last_response_value(&self, index: usize) -> Option<Rexp> {
        let entry = self.entry(index)?;
        if entry.kind() != dt::SEXP {
            return None;
        }
        Some(entry.as_rexp())
    }

    fn entry(&self, index: usize) -> Option<&PacketEntry> {
        self.last_response.as_ref()?.entries().get(index)
    }

    // -- Internals --

    async fn ensure_connected(&mut self) -> Result<(), QapError> {
        if self.conn.is_none() {
            let conn =
                QapConnection::connect(&self.host, self.port, self.allow_any_version).await?;
            self.conn = Some(conn);
        }
        Ok(())
    }

    async fn ident(&mut self) -> Result<ServerIdent, QapError> {
        self.ensure_connected().await?;
        match &self.conn {
            Some(conn) => Ok(*conn.ident()),
            None => Err(QapError::protocol("not connected")),
        }
    }

    /// Sends one packet and stores the matched response. Any failure
    /// closes the stream before it propagates.
    async fn submit(&mut self, packet: Packet) -> Result<(), QapError> {
        self.ensure_connected().await?;
        let result = match self.conn.as_mut() {
            Some(conn) => conn.submit(&packet).await,
            None => Err(QapError::protocol("not connected")),
        };
        match result {
            Ok(response) => {
                self.last_response = Some(response);
                Ok(())
            }
            Err(err) => {
                self.disconnect();
                Err(err)
            }
        }
    }
}
