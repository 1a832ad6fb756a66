//! Cache-fronted fetch layer for the Fanout gateway.
//!
//! [`Fetcher`] is the single chokepoint between "a route handler wants data
//! from a URL" and "an outbound network call happens". It derives a cache
//! key from the request's identity, consults the tiered store, performs the
//! outbound call on a miss and stores successful responses with a TTL.
//!
//! [`retry::with_retry`] wraps whole multi-step workflows (certificate
//! rotation, bulk uploads) in exponential backoff; it composes around
//! fetch-and-cache operations, never around individual cache calls.

pub mod fetch;
pub mod retry;
pub mod transport;

pub use fetch::{FetchRequest, Fetcher};
pub use retry::{with_retry, RetryClass, RetryPolicy};
pub use transport::{HttpTransport, OutboundRequest, OutboundResponse, Transport};
