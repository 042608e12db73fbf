//! `HttpClientPool`: maps destination keys to a bounded list of
//! `HttpClient`s and aggregates their statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::client::{self, HttpClientDeps, HttpClientHandle};
use crate::codec::MessageCodec;
use crate::config::PoolConfig;
use crate::key::{DestinationKey, TlsProfile};
use crate::metrics::PoolMetrics;
use crate::request::Request;
use crate::resolver::Resolver;
use crate::stats::PoolStats;
use crate::stream::TlsEngine;

struct Destination {
	clients: Vec<HttpClientHandle>,
}

/// Shared collaborators every spawned `HttpClient` is wired up with.
pub struct PoolDeps {
	pub resolver: Arc<dyn Resolver>,
	pub tls_engine: Arc<dyn TlsEngine>,
	pub codec: Arc<dyn MessageCodec>,
	pub metrics: Option<Arc<PoolMetrics>>,
}

/// The pool itself: a plain owned struct (per the Open Question decision
/// in `DESIGN.md` — no shared-from-this pattern).
pub struct HttpClientPool {
	config: Arc<PoolConfig>,
	deps: PoolDeps,
	clients: Mutex<hashbrown::HashMap<String, Destination>>,
	stats_time: Mutex<Instant>,
}

impl HttpClientPool {
	pub fn new(config: PoolConfig, deps: PoolDeps) -> Self {
		HttpClientPool {
			config: Arc::new(config),
			deps,
			clients: Mutex::new(hashbrown::HashMap::new()),
			stats_time: Mutex::new(Instant::now()),
		}
	}

	fn client_deps(&self) -> HttpClientDeps {
		HttpClientDeps {
			resolver: self.deps.resolver.clone(),
			tls_engine: self.deps.tls_engine.clone(),
			codec: self.deps.codec.clone(),
			config: self.config.clone(),
			metrics: self.deps.metrics.clone(),
		}
	}

	/// Route `req` to a connection for `(host, port, tls)`, creating a new
	/// `HttpClient` (and, when the destination is already backlogged, a
	/// new connection) as needed.
	///
	/// Selection picks the least-loaded existing client; a new one is
	/// spawned only when that client's backlog exceeds one request *and*
	/// the per-host cap hasn't been reached. Ties go to the first client
	/// iterated (list order is insertion order).
	pub fn enqueue(&self, host: &str, port: &str, tls: Option<TlsProfile>, req: Request) {
		let key = DestinationKey::new(host, port, tls);
		let handle = {
			let mut clients = self.clients.lock();
			let dest = clients.entry(key.as_str().to_string()).or_insert_with(|| Destination {
				clients: Vec::new(),
			});

			if dest.clients.is_empty() {
				let handle = self.spawn_client(key.clone(), tls);
				dest.clients.push(handle.clone());
				handle
			} else {
				let (best_idx, best_size) = dest
					.clients
					.iter()
					.enumerate()
					.map(|(i, c)| (i, c.queue_size()))
					.min_by_key(|(_, size)| *size)
					.expect("non-empty");

				if best_size > 1 && dest.clients.len() < self.config.max_per_host {
					let handle = self.spawn_client(key.clone(), tls);
					dest.clients.push(handle.clone());
					handle
				} else {
					dest.clients[best_idx].clone()
				}
			}
		};
		handle.enqueue(req);
	}

	fn spawn_client(&self, key: DestinationKey, tls: Option<TlsProfile>) -> HttpClientHandle {
		let deps = self.client_deps();
		match tls {
			Some(profile) => client::spawn_tls(key, profile, deps),
			None => client::spawn(key, deps),
		}
	}

	/// Number of distinct `HttpClient`s currently held for `host`/`port`/`tls`.
	pub fn client_count(&self, host: &str, port: &str, tls: Option<TlsProfile>) -> usize {
		let key = DestinationKey::new(host, port, tls);
		self
			.clients
			.lock()
			.get(key.as_str())
			.map(|d| d.clients.len())
			.unwrap_or(0)
	}

	/// Snapshot aggregation across every `HttpClient` in the pool. Not
	/// atomic across clients: each is sampled independently.
	pub fn stats(&self) -> PoolStats {
		let reset = {
			let mut last = self.stats_time.lock();
			let should_reset = last.elapsed() > self.config.stats_reset_interval;
			if should_reset {
				*last = Instant::now();
			}
			should_reset
		};

		let clients = self.clients.lock();
		let mut out = PoolStats::default();
		out.host_count = clients.len() as u64;
		for dest in clients.values() {
			for handle in &dest.clients {
				let snap = handle.stats().snapshot(reset);
				if snap.state == 1 {
					out.active_count += 1;
				} else {
					out.inactive_count += 1;
				}
				out.queue_size += snap.queue_size;
				out.bytes_written += snap.bytes_written;
				out.bytes_read += snap.bytes_read;
				out.total_seconds += snap.total_seconds;
			}
		}
		out.finalize()
	}

	pub fn max_per_host(&self) -> usize {
		self.config.max_per_host
	}

	pub fn stats_reset_interval(&self) -> Duration {
		self.config.stats_reset_interval
	}
}
