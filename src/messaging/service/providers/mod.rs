//! # Stream Providers
//!
//! Concrete [`StreamService`](super::StreamService) backends.

pub mod in_memory;
pub mod pgmq;

pub use in_memory::InMemoryStreamService;
pub use pgmq::{PgmqStreamService, StreamEnvelope};
