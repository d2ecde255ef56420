pub mod answer;
pub mod authoritative;
pub mod cname;

pub use answer::{AnswerCache, CachedAnswer};
pub use authoritative::AuthoritativeNsCache;
pub use cname::CnameCache;
