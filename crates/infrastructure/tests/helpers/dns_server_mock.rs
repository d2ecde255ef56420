#![allow(dead_code)]
//! Programmable mock DNS servers for integration tests.
//!
//! A responder closure decides, per decoded query, whether to answer,
//! answer after a delay, or stay silent. The UDP server counts queries
//! so tests can assert exactly how much network traffic a resolve
//! produced; the TCP variant speaks the length-prefixed framing used by
//! truncation fallback and can share a port with the UDP mock.

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, NS, SOA};
use hickory_proto::rr::{Name, RData, Record};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;

/// What the mock does with one query.
pub enum MockReply {
    Respond(Message),
    DelayedRespond(Duration, Message),
    Ignore,
}

pub type Responder = Arc<dyn Fn(&Message) -> MockReply + Send + Sync>;

pub struct MockDnsServer {
    addr: SocketAddr,
    queries: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    /// Binds an ephemeral UDP port on localhost and serves `responder`.
    pub async fn start(responder: Responder) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        let queries = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let counter = Arc::clone(&queries);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    received = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = received else { break };
                        let Ok(query) = Message::from_vec(&buf[..len]) else { continue };
                        counter.fetch_add(1, Ordering::SeqCst);
                        match responder(&query) {
                            MockReply::Respond(response) => {
                                if let Ok(bytes) = response.to_vec() {
                                    let _ = socket.send_to(&bytes, peer).await;
                                }
                            }
                            MockReply::DelayedRespond(delay, response) => {
                                let socket = Arc::clone(&socket);
                                tokio::spawn(async move {
                                    tokio::time::sleep(delay).await;
                                    if let Ok(bytes) = response.to_vec() {
                                        let _ = socket.send_to(&bytes, peer).await;
                                    }
                                });
                            }
                            MockReply::Ignore => {}
                        }
                    }
                }
            }
        });

        Ok(Self {
            addr,
            queries,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// TCP sibling of the UDP mock, for truncation-fallback tests. Binding
/// it to the UDP mock's address works because the port spaces are
/// disjoint.
pub struct MockTcpDnsServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockTcpDnsServer {
    pub async fn start_on(addr: SocketAddr, responder: Responder) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((mut stream, _peer)) = accepted else { break };
                        let responder = Arc::clone(&responder);
                        tokio::spawn(async move {
                            let mut len_buf = [0u8; 2];
                            if stream.read_exact(&mut len_buf).await.is_err() {
                                return;
                            }
                            let len = usize::from(u16::from_be_bytes(len_buf));
                            let mut buf = vec![0u8; len];
                            if stream.read_exact(&mut buf).await.is_err() {
                                return;
                            }
                            let Ok(query) = Message::from_vec(&buf) else { return };
                            let response = match responder(&query) {
                                MockReply::Respond(response) => response,
                                MockReply::DelayedRespond(delay, response) => {
                                    tokio::time::sleep(delay).await;
                                    response
                                }
                                MockReply::Ignore => return,
                            };
                            let Ok(bytes) = response.to_vec() else { return };
                            let frame_len = bytes.len() as u16;
                            let _ = stream.write_all(&frame_len.to_be_bytes()).await;
                            let _ = stream.write_all(&bytes).await;
                        });
                    }
                }
            }
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for MockTcpDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Response skeleton echoing the query's ID and question section.
pub fn response_for(query: &Message) -> Message {
    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(true);
    response.set_recursion_available(true);
    for q in query.queries() {
        response.add_query(q.clone());
    }
    response
}

pub fn answer_response(query: &Message, answers: Vec<Record>) -> Message {
    let mut response = response_for(query);
    for record in answers {
        response.add_answer(record);
    }
    response
}

pub fn nxdomain_response(query: &Message) -> Message {
    let mut response = response_for(query);
    response.set_response_code(ResponseCode::NXDomain);
    response.add_name_server(soa_record("invalid.", 60));
    response
}

pub fn servfail_response(query: &Message) -> Message {
    let mut response = response_for(query);
    response.set_response_code(ResponseCode::ServFail);
    response
}

pub fn truncated_response(query: &Message, answers: Vec<Record>) -> Message {
    let mut response = answer_response(query, answers);
    response.set_truncated(true);
    response
}

pub fn a_record(name: &str, ip: &str, ttl: u32) -> Record {
    Record::from_rdata(
        Name::from_str(name).unwrap(),
        ttl,
        RData::A(A(ip.parse().unwrap())),
    )
}

pub fn aaaa_record(name: &str, ip: &str, ttl: u32) -> Record {
    Record::from_rdata(
        Name::from_str(name).unwrap(),
        ttl,
        RData::AAAA(AAAA(ip.parse().unwrap())),
    )
}

pub fn cname_record(alias: &str, target: &str, ttl: u32) -> Record {
    Record::from_rdata(
        Name::from_str(alias).unwrap(),
        ttl,
        RData::CNAME(CNAME(Name::from_str(target).unwrap())),
    )
}

pub fn ns_record(zone: &str, target: &str, ttl: u32) -> Record {
    Record::from_rdata(
        Name::from_str(zone).unwrap(),
        ttl,
        RData::NS(NS(Name::from_str(target).unwrap())),
    )
}

pub fn soa_record(zone: &str, minimum: u32) -> Record {
    Record::from_rdata(
        Name::from_str(zone).unwrap(),
        minimum,
        RData::SOA(SOA::new(
            Name::from_str(&format!("ns1.{zone}")).unwrap(),
            Name::from_str(&format!("hostmaster.{zone}")).unwrap(),
            1,
            7_200,
            3_600,
            86_400,
            minimum,
        )),
    )
}

/// Name of the first question, lowercased with the trailing dot kept.
pub fn question_name(query: &Message) -> String {
    query
        .queries()
        .first()
        .map(|q| q.name().to_utf8().to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn question_type(query: &Message) -> Option<hickory_proto::rr::RecordType> {
    query.queries().first().map(|q| q.query_type())
}
