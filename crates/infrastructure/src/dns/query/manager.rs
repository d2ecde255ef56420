//! The in-flight query table.
//!
//! Responses arrive on one shared UDP socket, so attribution is by the
//! `(server, query id)` pair: IDs are allocated per server, which lets
//! several upstream servers use overlapping ID ranges without collision.
//! An entry leaves the table exactly once: through a matched response,
//! a timeout claim, or cancellation of the owning resolve.

use dashmap::DashMap;
use hearth_dns_domain::ResolveError;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use rustc_hash::FxBuildHasher;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// One outstanding question awaiting its response.
#[derive(Debug)]
pub struct InFlightQuery {
    query: Query,
    tx: Mutex<Option<oneshot::Sender<Message>>>,
}

impl InFlightQuery {
    pub fn new(query: Query) -> (Self, oneshot::Receiver<Message>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                query,
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Spoofing defense: the response must be a response to *our* opcode
    /// and carry our exact question back.
    pub fn matches(&self, message: &Message) -> bool {
        message.message_type() == MessageType::Response
            && message.op_code() == OpCode::Query
            && message.queries().first() == Some(&self.query)
    }

    /// Hands the response to the waiter. Returns `false` when the waiter
    /// is already gone (cancelled resolve); settling twice is impossible
    /// because the sender is consumed.
    pub fn settle(&self, message: Message) -> bool {
        let Some(tx) = self.tx.lock().expect("in-flight sender lock").take() else {
            return false;
        };
        tx.send(message).is_ok()
    }
}

/// Allocates query IDs per name-server address and demultiplexes
/// incoming responses back to their in-flight entries.
#[derive(Debug, Default)]
pub struct QueryContextManager {
    in_flight: DashMap<(SocketAddr, u16), InFlightQuery, FxBuildHasher>,
    next_id: DashMap<SocketAddr, u16, FxBuildHasher>,
}

impl QueryContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry` under an ID unused for `server` and returns the ID.
    ///
    /// The first ID tried on a fresh server is 1; later allocations probe
    /// sequentially from a per-server counter, skipping IDs still in
    /// flight. Fails when all 65 535 IDs for the server are taken.
    pub fn add(&self, server: SocketAddr, entry: InFlightQuery) -> Result<u16, ResolveError> {
        let mut entry = Some(entry);
        for _ in 0..u16::MAX {
            let id = {
                let mut counter = self.next_id.entry(server).or_insert(0);
                *counter = counter.wrapping_add(1).max(1);
                *counter
            };
            match self.in_flight.entry((server, id)) {
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(entry.take().expect("entry consumed once"));
                    return Ok(id);
                }
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
            }
        }
        Err(ResolveError::NoMoreIds { server })
    }

    /// Removes and returns the entry, if present. Used by the timeout and
    /// cancellation paths; a missing entry means a response already won.
    pub fn claim(&self, server: SocketAddr, id: u16) -> Option<InFlightQuery> {
        self.in_flight.remove(&(server, id)).map(|(_, entry)| entry)
    }

    /// Routes a decoded response to its entry.
    ///
    /// The entry is removed only when the response verifies against the
    /// stored question. An ID-matching packet with the wrong question is
    /// dropped and the entry keeps waiting. Unknown `(server, id)` pairs
    /// are dropped quietly; both cases are spoofing or duplication, not
    /// errors to surface.
    pub fn settle_matching(&self, server: SocketAddr, id: u16, message: Message) {
        let removed = self
            .in_flight
            .remove_if(&(server, id), |_, entry| entry.matches(&message));
        match removed {
            Some((_, entry)) => {
                if !entry.settle(message) {
                    debug!(server = %server, id = id, "response arrived for a cancelled resolve");
                }
            }
            None => {
                if self.in_flight.contains_key(&(server, id)) {
                    debug!(server = %server, id = id, "response failed question verification, dropped");
                } else {
                    debug!(server = %server, id = id, "response with unknown id, dropped");
                }
            }
        }
    }

    /// Drops every entry; their waiters observe closed channels. Called
    /// when the owning transport shuts down.
    pub fn clear(&self) {
        self.in_flight.clear();
    }

    pub fn outstanding(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::message::MessageBuilder;
    use hearth_dns_domain::{DnsQuestion, RecordType};

    fn server() -> SocketAddr {
        "192.0.2.1:53".parse().unwrap()
    }

    fn wire_query(name: &str) -> Query {
        let question = DnsQuestion::new(name, RecordType::A).unwrap();
        MessageBuilder::wire_query(&question).unwrap()
    }

    #[test]
    fn first_id_on_a_fresh_server_is_one() {
        let manager = QueryContextManager::new();
        let (entry, _rx) = InFlightQuery::new(wire_query("example.org"));
        assert_eq!(manager.add(server(), entry).unwrap(), 1);
    }

    #[test]
    fn ids_allocate_sequentially_per_server() {
        let manager = QueryContextManager::new();
        for expected in 1..=4u16 {
            let (entry, _rx) = InFlightQuery::new(wire_query("example.org"));
            assert_eq!(manager.add(server(), entry).unwrap(), expected);
        }
        let other: SocketAddr = "192.0.2.2:53".parse().unwrap();
        let (entry, _rx) = InFlightQuery::new(wire_query("example.org"));
        assert_eq!(manager.add(other, entry).unwrap(), 1);
    }

    #[test]
    fn claim_is_single_shot() {
        let manager = QueryContextManager::new();
        let (entry, _rx) = InFlightQuery::new(wire_query("example.org"));
        let id = manager.add(server(), entry).unwrap();
        assert!(manager.claim(server(), id).is_some());
        assert!(manager.claim(server(), id).is_none());
    }

    #[test]
    fn occupied_ids_are_skipped() {
        let manager = QueryContextManager::new();
        let (a, _rx_a) = InFlightQuery::new(wire_query("a.example.org"));
        let (b, _rx_b) = InFlightQuery::new(wire_query("b.example.org"));
        let id_a = manager.add(server(), a).unwrap();
        let id_b = manager.add(server(), b).unwrap();

        // The counter probes past the still-occupied id_b.
        manager.claim(server(), id_a);
        let (c, _rx_c) = InFlightQuery::new(wire_query("c.example.org"));
        let id_c = manager.add(server(), c).unwrap();
        assert_ne!(id_c, id_b);
        assert_eq!(id_c, 3);
    }

    #[tokio::test]
    async fn settle_rejects_mismatched_question() {
        let manager = QueryContextManager::new();
        let (entry, mut rx) = InFlightQuery::new(wire_query("example.org"));
        let id = manager.add(server(), entry).unwrap();

        // Same id, different question: must be dropped, entry retained.
        let mut forged = Message::new();
        forged.set_id(id);
        forged.set_message_type(MessageType::Response);
        forged.set_op_code(OpCode::Query);
        forged.add_query(wire_query("attacker.example.net"));
        manager.settle_matching(server(), id, forged);
        assert!(rx.try_recv().is_err());
        assert_eq!(manager.outstanding(), 1);

        let mut genuine = Message::new();
        genuine.set_id(id);
        genuine.set_message_type(MessageType::Response);
        genuine.set_op_code(OpCode::Query);
        genuine.add_query(wire_query("example.org"));
        manager.settle_matching(server(), id, genuine);
        assert!(rx.await.is_ok());
        assert_eq!(manager.outstanding(), 0);
    }
}
