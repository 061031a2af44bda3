//! Low-level QAP1 connection: TCP connect, identification read, packet I/O.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, trace};

use crate::error::QapError;
use crate::ident::{ServerIdent, IDENT_LEN};
use crate::packet::{dt, Packet, PacketEntry, QapHeader, HEADER_LEN};
use crate::wire;

/// A connected QAP1 transport: owns the stream and the identification
/// blob the server sent on accept. Dropping the connection closes the
/// stream.
pub struct QapConnection {
    stream: TcpStream,
    ident: ServerIdent,
}

impl QapConnection {
    /// Opens a stream to `host:port`, trying every resolved address until
    /// one accepts, then reads and validates the 32-byte identification.
    /// On a signature or version mismatch the stream is closed and a
    /// network error returned.
    pub async fn connect(
        host: &str,
        port: u16,
        allow_any_version: bool,
    ) -> Result<Self, QapError> {
        let addrs = lookup_host((host, port))
            .await
            .map_err(|e| QapError::network(format!("failed to resolve {host}:{port}"), &e))?;

        let mut stream = None;
        let mut last_err: Option<io::Error> = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let mut stream = match (stream, last_err) {
            (Some(s), _) => s,
            (None, Some(e)) => {
                return Err(QapError::network(
                    format!("failed to connect to {host}:{port}"),
                    &e,
                ))
            }
            (None, None) => {
                return Err(QapError::protocol(format!(
                    "{host}:{port} did not resolve to any address"
                )))
            }
        };

        let mut id = [0u8; IDENT_LEN];
        stream
            .read_exact(&mut id)
            .await
            .map_err(|e| QapError::network("reading server identification", &e))?;
        let ident = ServerIdent::new(id);

        if !ident.is_compatible(allow_any_version) {
            // Dropping the stream here closes it before the error is seen.
            return Err(QapError::protocol(format!(
                "incompatible server identification: {:?}",
                ident.as_str()
            )));
        }

        debug!(host, port, ident = %ident.as_str(), "connected");
        Ok(Self { stream, ident })
    }

    /// The identification blob read during connect.
    pub fn ident(&self) -> &ServerIdent {
        &self.ident
    }

    /// Sends one request packet and reads exactly one matched response.
    pub async fn submit(&mut self, packet: &Packet) -> Result<Packet, QapError> {
        trace!(
            command = packet.command(),
            entries = packet.entries().len(),
            "submitting request"
        );
        write_packet(&mut self.stream, packet).await?;
        let response = read_packet(&mut self.stream).await?;
        trace!(
            command = response.command(),
            status = response.status(),
            "received response"
        );
        Ok(response)
    }
}

/// Writes the 16-byte header and every entry's raw bytes.
pub(crate) async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), QapError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    packet.header().encode(&mut buf);
    for entry in packet.entries() {
        entry.encode(&mut buf);
    }
    writer
        .write_all(&buf)
        .await
        .map_err(|e| QapError::network("sending request packet", &e))?;
    writer
        .flush()
        .await
        .map_err(|e| QapError::network("flushing request packet", &e))
}

/// Reads one packet: the 16-byte header, then entries until the declared
/// byte count is consumed. A declared count that the entry headers do not
/// add up to is broken framing.
pub(crate) async fn read_packet<R>(reader: &mut R) -> Result<Packet, QapError>
where
    R: AsyncRead + Unpin,
{
    let mut header_bytes = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header_bytes)
        .await
        .map_err(|e| QapError::network("reading response header", &e))?;
    let header = QapHeader::decode(&header_bytes);

    // Data starts at header_end + offset; in practice offset is zero.
    let mut skip = u64::from(header.offset);
    while skip > 0 {
        let chunk = skip.min(4096) as usize;
        let mut scratch = vec![0u8; chunk];
        reader
            .read_exact(&mut scratch)
            .await
            .map_err(|e| QapError::network("skipping response data offset", &e))?;
        skip -= chunk as u64;
    }

    let mut entries = Vec::new();
    let mut consumed: u64 = 0;
    while consumed < header.length {
        let (entry, entry_len) = read_entry(reader, header.length - consumed).await?;
        entries.push(entry);
        consumed += entry_len;
    }

    Ok(Packet::response(header, entries))
}

/// Reads one entry header (4 bytes, or 8 when the large flag is set) and
/// its payload. `remaining` is how many declared packet bytes are left.
async fn read_entry<R>(reader: &mut R, remaining: u64) -> Result<(PacketEntry, u64), QapError>
where
    R: AsyncRead + Unpin,
{
    let mut short = [0u8; 4];
    reader
        .read_exact(&mut short)
        .await
        .map_err(|e| QapError::network("reading response entry header", &e))?;
    let kind = short[0];

    let (payload_len, header_len) = if kind & dt::LARGE != 0 {
        let mut rest = [0u8; 4];
        reader
            .read_exact(&mut rest)
            .await
            .map_err(|e| QapError::network("reading large response entry header", &e))?;
        let mut bytes = [0u8; 7];
        bytes[..3].copy_from_slice(&short[1..4]);
        bytes[3..].copy_from_slice(&rest);
        let mut pos = 0;
        (wire::read_len56(&bytes, &mut pos).unwrap_or(0), 8u64)
    } else {
        let mut pos = 0;
        (wire::read_len24(&short[1..4], &mut pos).unwrap_or(0), 4u64)
    };

    let total = header_len + payload_len;
    if total > remaining {
        return Err(QapError::protocol(format!(
            "response entry of {total} bytes overruns the {remaining} bytes the packet declared"
        )));
    }

    let mut payload = vec![0u8; payload_len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| QapError::network("reading response entry data", &e))?;

    Ok((PacketEntry::from_parts(kind, payload), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::cmd;
    use crate::types::Rexp;

    async fn packet_bytes(packet: &Packet) -> Vec<u8> {
        let mut out = Vec::new();
        write_packet(&mut out, packet).await.unwrap();
        out
    }

    #[tokio::test]
    async fn packet_write_read_round_trip() {
        let packet = Packet::request(
            cmd::SET_SEXP,
            vec![
                PacketEntry::string("vec_d").unwrap(),
                PacketEntry::sexp(&Rexp::doubles(vec![1.5, -2.5])).unwrap(),
            ],
        );
        let bytes = packet_bytes(&packet).await;

        let mut cursor = &bytes[..];
        let back = read_packet(&mut cursor).await.unwrap();
        assert_eq!(back.command(), cmd::SET_SEXP);
        assert_eq!(back.entries(), packet.entries());
        assert!(cursor.is_empty(), "framing must consume exactly the packet");
    }

    #[tokio::test]
    async fn empty_packet_round_trip() {
        let packet = Packet::request(cmd::SHUTDOWN, vec![]);
        let bytes = packet_bytes(&packet).await;
        assert_eq!(bytes.len(), HEADER_LEN);

        let mut cursor = &bytes[..];
        let back = read_packet(&mut cursor).await.unwrap();
        assert!(back.entries().is_empty());
    }

    #[tokio::test]
    async fn read_entry_with_large_header() {
        let entry = PacketEntry::from_parts(dt::BYTESTREAM, vec![0xAB; 0x80_0010]);
        let packet = Packet::request(cmd::EVAL, vec![entry.clone()]);
        let bytes = packet_bytes(&packet).await;

        let mut cursor = &bytes[..];
        let back = read_packet(&mut cursor).await.unwrap();
        assert_eq!(back.entries().len(), 1);
        assert_eq!(back.entries()[0], entry);
    }

    #[tokio::test]
    async fn nonzero_offset_is_skipped() {
        let mut bytes = Vec::new();
        let mut header_buf = BytesMut::new();
        QapHeader {
            command: 0x1_0001,
            length: 8,
            offset: 4,
        }
        .encode(&mut header_buf);
        bytes.extend_from_slice(&header_buf);
        bytes.extend_from_slice(&[0xEE; 4]); // offset filler
        bytes.extend_from_slice(&[dt::INT, 4, 0, 0, 9, 0, 0, 0]);

        let mut cursor = &bytes[..];
        let packet = read_packet(&mut cursor).await.unwrap();
        assert_eq!(packet.entries().len(), 1);
        assert_eq!(packet.entries()[0].payload(), &[9, 0, 0, 0]);
    }

    #[tokio::test]
    async fn entry_overrunning_declared_length_is_broken_framing() {
        let mut bytes = Vec::new();
        let mut header_buf = BytesMut::new();
        QapHeader::new(0x1_0001, 8).encode(&mut header_buf);
        bytes.extend_from_slice(&header_buf);
        // Entry claims 12 payload bytes but the packet declared 8 total.
        bytes.extend_from_slice(&[dt::BYTESTREAM, 12, 0, 0]);
        bytes.extend_from_slice(&[0u8; 12]);

        let mut cursor = &bytes[..];
        let err = read_packet(&mut cursor).await.unwrap_err();
        assert!(matches!(err, QapError::Network { .. }));
    }

    #[tokio::test]
    async fn truncated_response_is_a_network_error() {
        let bytes = [0u8; 7]; // shorter than a header
        let mut cursor = &bytes[..];
        let err = read_packet(&mut cursor).await.unwrap_err();
        assert!(matches!(err, QapError::Network { .. }));
    }
}
