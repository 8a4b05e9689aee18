//! Discovery client for Redis Sentinel
//!
//! [`SentinelSession`] owns the single network connection to a sentinel and
//! knows how to re-establish it from a fixed failover list. [`Resolver`] is
//! the concurrency-safe front: it funnels resolve requests from any number
//! of callers through one worker task so the session is never used
//! concurrently.

pub mod resolver;
pub mod session;

pub use resolver::{ResolveError, Resolver};
pub use session::SentinelSession;
