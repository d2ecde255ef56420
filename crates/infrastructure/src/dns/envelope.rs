use hickory_proto::op::Message;
use std::net::SocketAddr;

/// An addressed DNS response: the decoded message together with the
/// server that sent it and the local socket it arrived on.
#[derive(Debug)]
pub struct ResponseEnvelope {
    pub sender: SocketAddr,
    pub recipient: SocketAddr,
    pub message: Message,
}

impl ResponseEnvelope {
    pub fn new(sender: SocketAddr, recipient: SocketAddr, message: Message) -> Self {
        Self {
            sender,
            recipient,
            message,
        }
    }
}
