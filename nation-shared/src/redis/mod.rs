/// Optional Redis integration
///
/// Holds the shared rate limit buckets when more than one API instance runs.
///
/// ```text
/// ┌─────────────┐   EVALSHA token bucket   ┌───────────────────────────┐
/// │  API nodes  │ ───────────────────────> │ ratelimit:user:{user_id}  │
/// └─────────────┘                          └───────────────────────────┘
/// ```

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
