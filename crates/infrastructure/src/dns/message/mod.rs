pub mod builder;
pub mod parser;
pub mod record_type_map;

pub use builder::MessageBuilder;
pub use parser::{ClassifiedResponse, CnameEdge, ReferralNs, ResponseParser};
pub use record_type_map::RecordTypeMapper;

use hickory_proto::rr::Name;

/// User-facing rendering of a wire-form name: punycode labels are
/// decoded to Unicode when `decode_idn` is set. Internal comparisons and
/// cache keys always stay in the ASCII wire form.
pub fn display_name(name: &str, decode_idn: bool) -> String {
    if !decode_idn {
        return name.to_string();
    }
    Name::from_ascii(name)
        .map(|n| n.to_utf8())
        .unwrap_or_else(|_| name.to_string())
}
