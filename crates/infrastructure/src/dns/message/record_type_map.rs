use hearth_dns_domain::RecordType;
use hickory_proto::rr::RecordType as WireRecordType;

/// Bidirectional mapping between the domain-level [`RecordType`] and the
/// codec's wire record type.
pub struct RecordTypeMapper;

impl RecordTypeMapper {
    pub fn to_wire(record_type: RecordType) -> WireRecordType {
        match record_type {
            RecordType::A => WireRecordType::A,
            RecordType::AAAA => WireRecordType::AAAA,
            RecordType::CNAME => WireRecordType::CNAME,
            RecordType::NS => WireRecordType::NS,
            RecordType::PTR => WireRecordType::PTR,
            RecordType::SOA => WireRecordType::SOA,
            RecordType::TXT => WireRecordType::TXT,
            RecordType::MX => WireRecordType::MX,
            RecordType::SRV => WireRecordType::SRV,
            RecordType::OPT => WireRecordType::OPT,
            RecordType::Other(code) => WireRecordType::Unknown(code),
        }
    }

    pub fn from_wire(wire: WireRecordType) -> RecordType {
        match wire {
            WireRecordType::A => RecordType::A,
            WireRecordType::AAAA => RecordType::AAAA,
            WireRecordType::CNAME => RecordType::CNAME,
            WireRecordType::NS => RecordType::NS,
            WireRecordType::PTR => RecordType::PTR,
            WireRecordType::SOA => RecordType::SOA,
            WireRecordType::TXT => RecordType::TXT,
            WireRecordType::MX => RecordType::MX,
            WireRecordType::SRV => RecordType::SRV,
            WireRecordType::OPT => RecordType::OPT,
            other => RecordType::Other(u16::from(other)),
        }
    }
}
