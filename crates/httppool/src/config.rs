//! Pool-wide, immutable configuration.
//!
//! Timeouts and capacity knobs are captured once as an immutable snapshot
//! at construction time rather than as mutable globals, per the Open
//! Questions decision recorded in `DESIGN.md`.

use std::time::Duration;

use serde::Deserialize;

/// Timeouts and capacity knobs for an [`crate::pool::HttpClientPool`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
	/// Deadline for TCP connect (and the tunnel/TLS handshake that follows it).
	pub connect_timeout: Duration,
	/// Deadline for writing a request.
	pub write_timeout: Duration,
	/// Deadline for reading a response.
	pub read_timeout: Duration,
	/// Default idle window after a response completes, used when the peer
	/// doesn't send a `Keep-Alive: timeout=<n>` directive.
	pub keep_alive_timeout: Duration,
	/// How often cumulative per-client counters are zeroed on snapshot.
	pub stats_reset_interval: Duration,
	/// Maximum number of `HttpClient`s maintained per destination key.
	pub max_per_host: usize,
	/// Whether the single write/read retry applies to all methods, or
	/// only to HTTP methods considered idempotent (GET, HEAD, PUT,
	/// DELETE, OPTIONS, TRACE).
	pub retry_unsafe_methods: bool,
	/// Value sent as the `User-Agent` header on first attempt.
	pub user_agent: String,
}

impl Default for PoolConfig {
	fn default() -> Self {
		PoolConfig {
			connect_timeout: Duration::from_secs(30),
			write_timeout: Duration::from_secs(30),
			read_timeout: Duration::from_secs(60),
			keep_alive_timeout: Duration::from_secs(60),
			stats_reset_interval: Duration::from_secs(30),
			max_per_host: 2,
			retry_unsafe_methods: true,
			user_agent: "httppool/1.0".to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_documented_timeouts() {
		let cfg = PoolConfig::default();
		assert_eq!(cfg.connect_timeout, Duration::from_secs(30));
		assert_eq!(cfg.write_timeout, Duration::from_secs(30));
		assert_eq!(cfg.read_timeout, Duration::from_secs(60));
		assert_eq!(cfg.keep_alive_timeout, Duration::from_secs(60));
		assert_eq!(cfg.stats_reset_interval, Duration::from_secs(30));
		assert_eq!(cfg.max_per_host, 2);
	}
}
