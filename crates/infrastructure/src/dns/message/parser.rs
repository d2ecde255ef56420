//! DNS response classification.
//!
//! Turns a decoded message into the facts the resolve loop cares about:
//! which answer records match the question (directly or through CNAME
//! edges present in the same response), whether the response is a
//! referral, and the SOA-derived negative TTL.

use hearth_dns_domain::{RecordType, ResolvedRecord};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{RData, Record};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// One alias → target edge discovered in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CnameEdge {
    pub alias: Arc<str>,
    pub target: Arc<str>,
    pub ttl: u32,
}

/// One NS record from the authority section, with any in-bailiwick glue
/// address found in the additional section.
#[derive(Debug, Clone)]
pub struct ReferralNs {
    pub zone: Arc<str>,
    pub ns_name: Arc<str>,
    pub ttl: u32,
    pub glue: Vec<IpAddr>,
}

/// The resolve loop's view of one response.
#[derive(Debug)]
pub struct ClassifiedResponse {
    pub rcode: ResponseCode,
    pub truncated: bool,

    /// Answer records whose owner is the question name or reachable from
    /// it through `cname_edges`, restricted to the question type.
    pub matching: Vec<Record>,

    /// The CNAME path walked from the question name, in order.
    pub cname_edges: Vec<CnameEdge>,

    /// Where the CNAME path ends when no terminal record was included.
    pub chain_tail: Option<Arc<str>>,

    /// Authority-section delegation, when the server answered with a
    /// referral instead of an answer.
    pub referrals: Vec<ReferralNs>,

    /// `min(SOA minimum, SOA record TTL)` from the authority section.
    pub soa_negative_ttl: Option<u32>,
}

impl ClassifiedResponse {
    pub fn is_referral(&self) -> bool {
        self.matching.is_empty() && self.cname_edges.is_empty() && !self.referrals.is_empty()
    }

    pub fn is_nxdomain(&self) -> bool {
        self.rcode == ResponseCode::NXDomain
    }

    /// SERVFAIL and friends: responses that say "try another server".
    pub fn is_server_error(&self) -> bool {
        matches!(
            self.rcode,
            ResponseCode::ServFail | ResponseCode::Refused | ResponseCode::NotImp
        )
    }
}

pub struct ResponseParser;

impl ResponseParser {
    /// Classifies `message` against the question `(qname, qtype)`.
    ///
    /// `qname` must be normalized (lowercase, trailing dot); all names
    /// pulled out of the message are normalized the same way before any
    /// comparison.
    pub fn classify(message: &Message, qname: &str, qtype: RecordType) -> ClassifiedResponse {
        let rcode = message.response_code();
        let truncated = message.truncated();
        let wire_qtype = super::RecordTypeMapper::to_wire(qtype);

        // Alias map over the whole answer section; the chain walk below
        // decides which edges actually connect to the question name.
        let mut aliases: HashMap<Arc<str>, (Arc<str>, u32)> = HashMap::new();
        for record in message.answers() {
            if let RData::CNAME(target) = record.data() {
                let alias = normalize(&record.name().to_ascii());
                let target = normalize(&target.to_ascii());
                aliases.entry(alias).or_insert((target, record.ttl()));
            }
        }

        let mut cname_edges = Vec::new();
        let mut chain: Vec<Arc<str>> = vec![Arc::from(qname)];
        let mut cursor: Arc<str> = Arc::from(qname);
        while let Some((target, ttl)) = aliases.get(&cursor) {
            cname_edges.push(CnameEdge {
                alias: Arc::clone(&cursor),
                target: Arc::clone(target),
                ttl: *ttl,
            });
            cursor = Arc::clone(target);
            if chain.contains(&cursor) {
                // Self-referential alias data; stop walking.
                debug!(name = %cursor, "CNAME loop inside a single response");
                break;
            }
            chain.push(Arc::clone(&cursor));
        }

        let matching: Vec<Record> = message
            .answers()
            .iter()
            .filter(|record| {
                record.record_type() == wire_qtype
                    && chain.iter().any(|name| **name == *normalize(&record.name().to_ascii()))
            })
            .cloned()
            .collect();

        let chain_tail = if matching.is_empty() && !cname_edges.is_empty() {
            Some(cursor)
        } else {
            None
        };

        let referrals = Self::extract_referrals(message, qname);
        let soa_negative_ttl = message.name_servers().iter().find_map(|r| {
            if let RData::SOA(soa) = r.data() {
                Some(soa.minimum().min(r.ttl()))
            } else {
                None
            }
        });

        debug!(
            rcode = ?rcode,
            matching = matching.len(),
            cname_hops = cname_edges.len(),
            referrals = referrals.len(),
            truncated = truncated,
            "response classified"
        );

        ClassifiedResponse {
            rcode,
            truncated,
            matching,
            cname_edges,
            chain_tail,
            referrals,
            soa_negative_ttl,
        }
    }

    /// Pulls NS delegation out of the authority section. Only zones that
    /// are a suffix of the question name are referrals for this lookup;
    /// glue is accepted solely for the NS targets themselves.
    fn extract_referrals(message: &Message, qname: &str) -> Vec<ReferralNs> {
        let mut referrals = Vec::new();
        for record in message.name_servers() {
            let RData::NS(ns_target) = record.data() else {
                continue;
            };
            let zone = normalize(&record.name().to_ascii());
            if !in_zone(qname, &zone) {
                debug!(zone = %zone, "ignoring out-of-bailiwick NS record");
                continue;
            }
            let ns_name = normalize(&ns_target.to_ascii());
            let glue = message
                .additionals()
                .iter()
                .filter(|extra| normalize(&extra.name().to_ascii()) == ns_name)
                .filter_map(|extra| match extra.data() {
                    RData::A(a) => Some(IpAddr::V4(a.0)),
                    RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
                    _ => None,
                })
                .collect();
            referrals.push(ReferralNs {
                zone,
                ns_name,
                ttl: record.ttl(),
                glue,
            });
        }
        referrals
    }

    /// Address records carried by `records`, in answer order.
    pub fn addresses(records: &[Record]) -> Vec<ResolvedRecord> {
        records
            .iter()
            .filter_map(|record| {
                let address = match record.data() {
                    RData::A(a) => IpAddr::V4(a.0),
                    RData::AAAA(aaaa) => IpAddr::V6(aaaa.0),
                    _ => return None,
                };
                Some(ResolvedRecord::new(
                    normalize(&record.name().to_ascii()),
                    address,
                    record.ttl(),
                ))
            })
            .collect()
    }
}

fn normalize(name: &str) -> Arc<str> {
    let mut lowered = name.to_ascii_lowercase();
    if !lowered.ends_with('.') {
        lowered.push('.');
    }
    Arc::from(lowered.as_str())
}

/// Whether `name` is inside `zone` (equal to it or a subdomain of it).
fn in_zone(name: &str, zone: &str) -> bool {
    if zone == "." {
        return true;
    }
    name == zone || name.ends_with(&format!(".{zone}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, MessageType, OpCode};
    use hickory_proto::rr::rdata::{A, CNAME, NS, SOA};
    use hickory_proto::rr::{Name, RData, Record};
    use std::str::FromStr;

    fn response() -> Message {
        let mut message = Message::new();
        message.set_id(1);
        message.set_message_type(MessageType::Response);
        message.set_op_code(OpCode::Query);
        message.set_recursion_available(true);
        message
    }

    fn a_record(name: &str, ip: &str, ttl: u32) -> Record {
        Record::from_rdata(
            Name::from_str(name).unwrap(),
            ttl,
            RData::A(A(ip.parse().unwrap())),
        )
    }

    fn cname_record(name: &str, target: &str, ttl: u32) -> Record {
        Record::from_rdata(
            Name::from_str(name).unwrap(),
            ttl,
            RData::CNAME(CNAME(Name::from_str(target).unwrap())),
        )
    }

    #[test]
    fn direct_answer_matches() {
        let mut message = response();
        message.add_answer(a_record("example.org.", "93.184.216.34", 300));

        let classified = ResponseParser::classify(&message, "example.org.", RecordType::A);
        assert_eq!(classified.matching.len(), 1);
        assert!(classified.cname_edges.is_empty());
        assert!(!classified.is_referral());
    }

    #[test]
    fn cname_and_terminal_in_one_response() {
        let mut message = response();
        message.add_answer(cname_record("www.example.org.", "example.org.", 600));
        message.add_answer(a_record("example.org.", "93.184.216.34", 300));

        let classified = ResponseParser::classify(&message, "www.example.org.", RecordType::A);
        assert_eq!(classified.matching.len(), 1);
        assert_eq!(classified.cname_edges.len(), 1);
        assert_eq!(&*classified.cname_edges[0].target, "example.org.");
        assert!(classified.chain_tail.is_none());
    }

    #[test]
    fn dangling_cname_reports_chain_tail() {
        let mut message = response();
        message.add_answer(cname_record("www.example.org.", "cdn.example.net.", 600));

        let classified = ResponseParser::classify(&message, "www.example.org.", RecordType::A);
        assert!(classified.matching.is_empty());
        assert_eq!(classified.chain_tail.as_deref(), Some("cdn.example.net."));
    }

    #[test]
    fn unrelated_answers_are_ignored() {
        let mut message = response();
        message.add_answer(a_record("other.example.org.", "192.0.2.99", 300));

        let classified = ResponseParser::classify(&message, "example.org.", RecordType::A);
        assert!(classified.matching.is_empty());
    }

    #[test]
    fn referral_with_in_bailiwick_glue() {
        let mut message = response();
        message.add_name_server(Record::from_rdata(
            Name::from_str("example.org.").unwrap(),
            3600,
            RData::NS(NS(Name::from_str("ns1.example.org.").unwrap())),
        ));
        message.add_additional(a_record("ns1.example.org.", "192.0.2.53", 3600));

        let classified = ResponseParser::classify(&message, "www.example.org.", RecordType::A);
        assert!(classified.is_referral());
        assert_eq!(classified.referrals.len(), 1);
        assert_eq!(classified.referrals[0].glue, vec!["192.0.2.53".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn out_of_bailiwick_ns_is_dropped() {
        let mut message = response();
        message.add_name_server(Record::from_rdata(
            Name::from_str("example.net.").unwrap(),
            3600,
            RData::NS(NS(Name::from_str("ns1.example.net.").unwrap())),
        ));

        let classified = ResponseParser::classify(&message, "www.example.org.", RecordType::A);
        assert!(classified.referrals.is_empty());
        assert!(!classified.is_referral());
    }

    #[test]
    fn soa_minimum_bounds_negative_ttl() {
        let mut message = response();
        message.set_response_code(ResponseCode::NXDomain);
        message.add_name_server(Record::from_rdata(
            Name::from_str("example.org.").unwrap(),
            600,
            RData::SOA(SOA::new(
                Name::from_str("ns1.example.org.").unwrap(),
                Name::from_str("hostmaster.example.org.").unwrap(),
                1,
                7200,
                3600,
                86400,
                60,
            )),
        ));

        let classified = ResponseParser::classify(&message, "gone.example.org.", RecordType::A);
        assert!(classified.is_nxdomain());
        assert_eq!(classified.soa_negative_ttl, Some(60));
    }
}
