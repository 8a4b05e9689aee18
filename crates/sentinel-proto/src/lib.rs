//! Sentinel wire protocol (RESP, client role)
//!
//! Encodes the `SENTINEL get-master-addr-by-name` request as an
//! array-of-bulk-strings frame and decodes the reply. The framing is
//! byte-exact: the peer is a real Redis Sentinel, so there is no room for
//! flexibility here.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Command group identifier of the resolve request.
pub const RESOLVE_COMMAND: &str = "sentinel";

/// Query identifier of the resolve request.
pub const RESOLVE_QUERY: &str = "get-master-addr-by-name";

/// Wire protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the connection, or a line could not be read at all.
    /// The underlying connection must be presumed dead.
    #[error("connection to sentinel closed while reading reply")]
    ConnectionClosed,

    /// The reply was readable but syntactically wrong. The connection may
    /// still be usable; callers decide how conservative to be.
    #[error("malformed sentinel reply: {0}")]
    MalformedFrame(&'static str),

    /// The sentinel answered with a null array: the logical name is unknown.
    #[error("sentinel returned a null reply")]
    NullReply,
}

impl ProtocolError {
    /// True for connection-level failures that require a reconnect, as
    /// opposed to protocol-level failures on a live connection.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed)
    }
}

/// Encode a resolve request for `logical_name`.
///
/// Produces `*3\r\n$8\r\nsentinel\r\n$23\r\nget-master-addr-by-name\r\n
/// $<len>\r\n<logical_name>\r\n`.
pub fn encode_resolve_request(logical_name: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(64 + logical_name.len());
    buf.put_slice(b"*3\r\n");
    put_bulk(&mut buf, RESOLVE_COMMAND);
    put_bulk(&mut buf, RESOLVE_QUERY);
    put_bulk(&mut buf, logical_name);
    buf.freeze()
}

fn put_bulk(buf: &mut BytesMut, value: &str) {
    buf.put_slice(format!("${}\r\n", value.len()).as_bytes());
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}

/// Decode one array-of-bulk-strings reply from `reader`.
///
/// Returns the ordered sequence of decoded elements. An unreadable or empty
/// line is [`ProtocolError::ConnectionClosed`]; a frame that does not follow
/// the `*<count>` / `$<len>` structure is [`ProtocolError::MalformedFrame`];
/// a declared count of -1 is [`ProtocolError::NullReply`].
pub async fn decode_response<R>(reader: &mut R) -> Result<Vec<String>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let header = read_line(reader).await?;
    let count = header
        .strip_prefix('*')
        .ok_or(ProtocolError::MalformedFrame("reply does not start with '*'"))?;
    let count: i64 = count
        .parse()
        .map_err(|_| ProtocolError::MalformedFrame("unparseable array length"))?;
    if count == -1 {
        return Err(ProtocolError::NullReply);
    }
    if count < 0 {
        return Err(ProtocolError::MalformedFrame("negative array length"));
    }

    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let bulk_header = read_line(reader).await?;
        let declared = bulk_header
            .strip_prefix('$')
            .ok_or(ProtocolError::MalformedFrame("element does not start with '$'"))?;
        let declared: usize = declared
            .parse()
            .map_err(|_| ProtocolError::MalformedFrame("unparseable bulk length"))?;

        let value = read_line(reader).await?;
        if value.len() != declared {
            return Err(ProtocolError::MalformedFrame("bulk length mismatch"));
        }
        elements.push(value);
    }

    Ok(elements)
}

/// Read one CRLF-terminated line. EOF, I/O failure, and a blank line are all
/// connection-level failures for this protocol.
async fn read_line<R>(reader: &mut R) -> Result<String, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    match reader.read_until(b'\n', &mut line).await {
        Ok(0) | Err(_) => return Err(ProtocolError::ConnectionClosed),
        Ok(_) => {}
    }
    while matches!(line.last(), Some(b'\r') | Some(b'\n')) {
        line.pop();
    }
    if line.is_empty() {
        return Err(ProtocolError::ConnectionClosed);
    }
    String::from_utf8(line).map_err(|_| ProtocolError::MalformedFrame("non-utf8 line"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_resolve_request_is_byte_exact() {
        let frame = encode_resolve_request("cache");
        assert_eq!(
            &frame[..],
            &b"*3\r\n$8\r\nsentinel\r\n$23\r\nget-master-addr-by-name\r\n$5\r\ncache\r\n"[..]
        );
    }

    #[tokio::test]
    async fn test_decode_master_addr_reply() {
        let mut input: &[u8] = b"*2\r\n$8\r\n10.0.0.5\r\n$4\r\n6379\r\n";
        let reply = decode_response(&mut input).await.unwrap();
        assert_eq!(reply, vec!["10.0.0.5".to_string(), "6379".to_string()]);
    }

    #[tokio::test]
    async fn test_decode_empty_input_is_connection_closed() {
        let mut input: &[u8] = b"";
        let err = decode_response(&mut input).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
        assert!(err.is_connection_closed());
    }

    #[tokio::test]
    async fn test_decode_truncated_reply_is_connection_closed() {
        let mut input: &[u8] = b"*2\r\n$8\r\n10.0.0.5\r\n";
        let err = decode_response(&mut input).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_decode_missing_array_marker() {
        let mut input: &[u8] = b"+OK\r\n";
        let err = decode_response(&mut input).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
        assert!(!err.is_connection_closed());
    }

    #[tokio::test]
    async fn test_decode_missing_bulk_marker() {
        let mut input: &[u8] = b"*1\r\n+inline\r\n";
        let err = decode_response(&mut input).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[tokio::test]
    async fn test_decode_wrong_bulk_length() {
        let mut input: &[u8] = b"*1\r\n$10\r\nshort\r\n";
        let err = decode_response(&mut input).await.unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[tokio::test]
    async fn test_decode_null_array() {
        let mut input: &[u8] = b"*-1\r\n";
        let err = decode_response(&mut input).await.unwrap_err();
        assert!(matches!(err, ProtocolError::NullReply));
        assert!(!err.is_connection_closed());
    }
}
