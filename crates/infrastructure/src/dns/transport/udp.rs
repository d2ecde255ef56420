//! The resolver's shared UDP socket.
//!
//! One socket serves every query the resolver sends. A spawned receive
//! loop decodes each incoming datagram and hands it to the query-context
//! manager for `(sender, id)` attribution; everything that fails to
//! decode or to verify is dropped there. tokio's `UdpSocket` permits
//! concurrent `send_to`/`recv_from` through `&self`, so senders never
//! contend with the receive loop.

use crate::dns::query::QueryContextManager;
use hearth_dns_domain::ResolveError;
use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct DatagramTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    manager: Arc<QueryContextManager>,
    recv_task: JoinHandle<()>,
}

impl DatagramTransport {
    /// Binds the socket and starts the receive loop. `max_payload_size`
    /// caps the receive buffer, matching what the OPT record advertises.
    pub async fn bind(bind_addr: SocketAddr, max_payload_size: u16) -> Result<Self, ResolveError> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ResolveError::transport(bind_addr, format!("bind failed: {e}")))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| ResolveError::transport(bind_addr, format!("local_addr failed: {e}")))?;
        let socket = Arc::new(socket);
        let manager = Arc::new(QueryContextManager::new());

        let recv_task = tokio::spawn(Self::receive_loop(
            Arc::clone(&socket),
            Arc::clone(&manager),
            max_payload_size,
        ));

        debug!(local = %local_addr, "datagram transport bound");
        Ok(Self {
            socket,
            local_addr,
            manager,
            recv_task,
        })
    }

    async fn receive_loop(
        socket: Arc<UdpSocket>,
        manager: Arc<QueryContextManager>,
        max_payload_size: u16,
    ) {
        let mut buf = vec![0u8; usize::from(max_payload_size)];
        loop {
            let (len, sender) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "UDP receive error");
                    continue;
                }
            };

            let message = match Message::from_vec(&buf[..len]) {
                Ok(message) => message,
                Err(e) => {
                    debug!(sender = %sender, error = %e, "undecodable datagram dropped");
                    continue;
                }
            };

            let id = message.id();
            debug!(sender = %sender, id = id, "UDP response received");
            manager.settle_matching(sender, id, message);
        }
    }

    pub fn manager(&self) -> &Arc<QueryContextManager> {
        &self.manager
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn send_to(&self, bytes: &[u8], server: SocketAddr) -> Result<(), ResolveError> {
        let sent = self
            .socket
            .send_to(bytes, server)
            .await
            .map_err(|e| ResolveError::transport(server, format!("send failed: {e}")))?;
        debug!(server = %server, bytes_sent = sent, "UDP query sent");
        Ok(())
    }

    /// Stops the receive loop and fails every in-flight query; their
    /// waiters observe a closed channel.
    pub fn shutdown(&self) {
        self.recv_task.abort();
        self.manager.clear();
    }
}

impl Drop for DatagramTransport {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}
