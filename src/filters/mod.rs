//! Filter implementations

pub mod mock;
pub mod priority;
pub mod rate_limit;
pub mod regex;

pub use self::mock::{MockFilter, SuppressFilter};
pub use self::priority::{Comparison, PriorityFilter};
pub use self::rate_limit::{parse_ttl, RateLimitFilter, SignatureFn};
pub use self::regex::{RegexFilter, RegexTarget};

pub use crate::core::{Filter, FilterChain};
