pub mod bucket;
pub mod limiter;

pub use bucket::Bucket;
pub use limiter::{RateLimiter, RateLimiterConfig, DEFAULT_IDLE_EVICTION};
