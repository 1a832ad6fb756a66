//! Two-tier cache store for the Fanout gateway.
//!
//! One logical key-value store backed by two physical backends: a shared
//! Redis store as primary and a bounded in-process store as fallback. The
//! store prefers the primary when healthy and degrades without surfacing
//! backend failures to callers - a broken backend costs at worst a cache
//! miss, never an error.
//!
//! Cache keys are derived, not caller-supplied: [`key::derive_key`] produces
//! a canonical, bounded-length key from a request's identity and defends the
//! store against adversarial payloads by degrading to a fixed-length hashed
//! form.

pub mod backend;
pub mod key;
pub mod pattern;
pub mod store;

pub use backend::memory::MemoryBackend;
pub use backend::redis::RedisBackend;
pub use backend::CacheBackend;
pub use key::{combined_size, derive_key};
pub use pattern::KeyPattern;
pub use store::{BackendHealth, TieredStore};
