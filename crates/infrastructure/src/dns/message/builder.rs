//! DNS query construction.
//!
//! Builds query messages in wire format with `hickory-proto`, giving the
//! engine full control over the header flags, the query ID and the EDNS0
//! OPT pseudo-record.

use super::record_type_map::RecordTypeMapper;
use hearth_dns_domain::{DnsQuestion, ResolveError, ResolverOpts};
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, Record};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};

pub struct MessageBuilder;

impl MessageBuilder {
    /// Converts a normalized question into the codec's query shape. The
    /// resulting value is kept by the in-flight table so responses can be
    /// verified against the exact question that was sent.
    pub fn wire_query(question: &DnsQuestion) -> Result<Query, ResolveError> {
        let name = Name::from_utf8(question.name())
            .map_err(|e| ResolveError::InvalidHostname(format!("{}: {e}", question.name()).into()))?;

        let mut query = Query::new();
        query.set_name(name);
        query.set_query_type(RecordTypeMapper::to_wire(question.record_type()));
        query.set_query_class(DNSClass::IN);
        Ok(query)
    }

    /// Assembles and serializes the full query message for `id`.
    ///
    /// The OPT record advertising `max_payload_size` is appended when
    /// enabled; user additionals ride along in the additional section.
    pub fn build_query(
        id: u16,
        query: Query,
        additionals: &[Record],
        opts: &ResolverOpts,
    ) -> Result<Vec<u8>, ResolveError> {
        let mut message = Message::new();
        message.set_id(id);
        message.set_message_type(MessageType::Query);
        message.set_op_code(OpCode::Query);
        message.set_recursion_desired(opts.recursion_desired);
        message.add_query(query);

        for record in additionals {
            message.add_additional(record.clone());
        }

        if opts.opt_resource_enabled {
            let mut edns = Edns::new();
            edns.set_max_payload(opts.max_payload_size);
            edns.set_version(0);
            message.extensions_mut().replace(edns);
        }

        Self::serialize(&message)
    }

    fn serialize(message: &Message) -> Result<Vec<u8>, ResolveError> {
        let mut buf = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buf);
        message
            .emit(&mut encoder)
            .map_err(|e| ResolveError::decode(format!("failed to serialize query: {e}")))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_dns_domain::RecordType;
    use hickory_proto::rr::RecordType as WireRecordType;

    #[test]
    fn encoded_question_survives_the_wire() {
        let question = DnsQuestion::new("Example.ORG", RecordType::A).unwrap();
        let query = MessageBuilder::wire_query(&question).unwrap();
        let bytes =
            MessageBuilder::build_query(7, query.clone(), &[], &ResolverOpts::default()).unwrap();

        let decoded = Message::from_vec(&bytes).unwrap();
        assert_eq!(decoded.id(), 7);
        assert!(decoded.recursion_desired());
        let decoded_query = decoded.queries().first().unwrap();
        assert_eq!(decoded_query, &query);
        assert_eq!(decoded_query.query_type(), WireRecordType::A);
        assert_eq!(decoded_query.name().to_utf8().to_ascii_lowercase(), "example.org.");
    }

    #[test]
    fn opt_record_advertises_payload_size() {
        let question = DnsQuestion::new("example.org", RecordType::A).unwrap();
        let query = MessageBuilder::wire_query(&question).unwrap();
        let opts = ResolverOpts::default();
        let bytes = MessageBuilder::build_query(1, query, &[], &opts).unwrap();

        let decoded = Message::from_vec(&bytes).unwrap();
        let edns = decoded.extensions().as_ref().expect("OPT record expected");
        assert_eq!(edns.max_payload(), opts.max_payload_size);
    }

    #[test]
    fn opt_record_can_be_disabled() {
        let question = DnsQuestion::new("example.org", RecordType::A).unwrap();
        let query = MessageBuilder::wire_query(&question).unwrap();
        let opts = ResolverOpts {
            opt_resource_enabled: false,
            ..ResolverOpts::default()
        };
        let bytes = MessageBuilder::build_query(1, query, &[], &opts).unwrap();

        let decoded = Message::from_vec(&bytes).unwrap();
        assert!(decoded.extensions().is_none());
    }
}
