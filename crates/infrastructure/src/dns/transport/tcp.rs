//! One-shot TCP fallback for truncated UDP responses.
//!
//! RFC 1035 §4.2.2 framing: each message is preceded by a two-byte
//! big-endian length. The exchange walks Connecting → Sending →
//! Receiving → Done; the socket is scoped to this function, so every
//! exit path closes it.

use hearth_dns_domain::ResolveError;
use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Reissues the already-encoded query over a fresh TCP connection to the
/// same server and returns the full response.
pub async fn exchange(
    server: SocketAddr,
    query_bytes: &[u8],
    timeout: Duration,
) -> Result<Message, ResolveError> {
    let started = std::time::Instant::now();
    tokio::time::timeout(timeout, exchange_inner(server, query_bytes))
        .await
        .map_err(|_| ResolveError::Timeout {
            server,
            elapsed: started.elapsed(),
        })?
}

async fn exchange_inner(server: SocketAddr, query_bytes: &[u8]) -> Result<Message, ResolveError> {
    // Connecting
    let mut stream = TcpStream::connect(server)
        .await
        .map_err(|e| ResolveError::transport(server, format!("TCP connect failed: {e}")))?;

    // Sending
    let len = u16::try_from(query_bytes.len())
        .map_err(|_| ResolveError::decode("query exceeds TCP frame size"))?;
    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| ResolveError::transport(server, format!("TCP write failed: {e}")))?;
    stream
        .write_all(query_bytes)
        .await
        .map_err(|e| ResolveError::transport(server, format!("TCP write failed: {e}")))?;

    // Receiving
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| ResolveError::transport(server, format!("TCP read failed: {e}")))?;
    let response_len = usize::from(u16::from_be_bytes(len_buf));
    let mut response = vec![0u8; response_len];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| ResolveError::transport(server, format!("TCP read failed: {e}")))?;

    // Done; `stream` drops and closes here on every path.
    debug!(server = %server, bytes = response_len, "TCP response received");
    Message::from_vec(&response)
        .map_err(|e| ResolveError::decode(format!("failed to parse TCP response: {e}")))
}
