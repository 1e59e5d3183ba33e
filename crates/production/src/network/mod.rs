//! Inbound network protection.

mod rate_limiter;

pub use rate_limiter::{InboundRateLimitConfig, InboundRateLimiter};
