//! A client-side HTTP/1.1 connection pool: a bounded set of persistent,
//! per-destination connections multiplexing many outbound requests, each
//! carried through a resolve → connect → (handshake) → write → read →
//! keep-alive state machine, retried once on a suspected stale keep-alive
//! socket, and torn down after an idle interval.
//!
//! `pool` and `client` are the two modules that embody nearly all of the
//! nontrivial engineering.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod metrics;
pub mod pool;
pub mod request;
pub mod resolver;
pub mod stats;
pub mod stream;
pub mod tls;

pub use client::{HttpClientHandle, Phase};
pub use config::PoolConfig;
pub use error::{PoolError, Stage};
pub use key::{DestinationKey, TlsProfile};
pub use pool::{HttpClientPool, PoolDeps};
pub use request::{Body, Completion, Outcome, Request, Response};
pub use stats::PoolStats;
