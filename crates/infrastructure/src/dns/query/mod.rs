pub mod context;
pub mod manager;

pub use context::QueryContext;
pub use manager::{InFlightQuery, QueryContextManager};
