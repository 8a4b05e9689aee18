//! Single-connection session against a sentinel

use std::time::Duration;

use sentinel_proto::{decode_response, encode_resolve_request, ProtocolError};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Per-address dial timeout during (re)connection.
pub const DIAL_TIMEOUT: Duration = Duration::from_millis(300);

struct SessionConn {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

/// Owns at most one live connection to a sentinel.
///
/// Not safe for concurrent use: request and reply order on the line protocol
/// must match, so exactly one caller may drive the session at a time. The
/// [`Resolver`](crate::Resolver) worker is that caller.
pub struct SentinelSession {
    addresses: Vec<String>,
    conn: Option<SessionConn>,
}

impl SentinelSession {
    /// Create a session with no connection. `addresses` ordering defines
    /// failover precedence: every reconnect retries from index 0.
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            conn: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Try each configured sentinel address in order, adopting the first
    /// connection that succeeds within [`DIAL_TIMEOUT`]. Any prior
    /// connection is discarded first. Returns false if every address fails,
    /// leaving the session disconnected.
    pub async fn connect(&mut self) -> bool {
        self.conn = None;

        for idx in 0..self.addresses.len() {
            let addr = self.addresses[idx].clone();
            match timeout(DIAL_TIMEOUT, TcpStream::connect(addr.as_str())).await {
                Ok(Ok(stream)) => {
                    let (read_half, write_half) = stream.into_split();
                    self.conn = Some(SessionConn {
                        reader: BufReader::new(read_half),
                        writer: BufWriter::new(write_half),
                    });
                    debug!(sentinel = %addr, "connected to sentinel");
                    return true;
                }
                Ok(Err(e)) => {
                    warn!(sentinel = %addr, error = %e, "failed to dial sentinel");
                }
                Err(_) => {
                    warn!(sentinel = %addr, "timed out dialing sentinel");
                }
            }
        }

        false
    }

    /// Ask the sentinel for the current master address of `logical_name`.
    ///
    /// The reply is expected to be a 2-element array (host, port), joined
    /// into `host:port`. Any write or read I/O failure maps to
    /// [`ProtocolError::ConnectionClosed`]: the connection is presumed dead.
    pub async fn query(&mut self, logical_name: &str) -> Result<String, ProtocolError> {
        let conn = self.conn.as_mut().ok_or(ProtocolError::ConnectionClosed)?;

        let frame = encode_resolve_request(logical_name);
        conn.writer
            .write_all(&frame)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;
        conn.writer
            .flush()
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?;

        let reply = decode_response(&mut conn.reader).await?;
        if reply.len() != 2 {
            return Err(ProtocolError::MalformedFrame(
                "expected a host and a port in the reply",
            ));
        }

        Ok(format!("{}:{}", reply[0], reply[1]))
    }
}
