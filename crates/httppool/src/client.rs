//! `HttpClient`: one persistent connection's lifecycle state machine.
//!
//! Rather than chaining callbacks onto a shared executor strand, each
//! client is a single `tokio::task` owning all of its mutable state, fed
//! through an unbounded mpsc channel. No two operations belonging to one
//! client ever run concurrently because there is exactly one task running
//! its body — that serial ownership is what lets the rest of the pool
//! treat a client handle as freely `Clone`-able and shareable.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::codec::MessageCodec;
use crate::config::PoolConfig;
use crate::error::{PoolError, Stage};
use crate::key::DestinationKey;
use crate::metrics::{DestinationLabels, PoolMetrics};
use crate::request::{Outcome, Request};
use crate::resolver::Resolver;
use crate::stats::ClientStatsCell;
use crate::stream::{ManagedStream, TlsEngine};

/// The explicit connection lifecycle states. Exposed for
/// introspection/tests; not used for dispatch (the actor's control flow
/// in [`Driver::process_head`] *is* the dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Resolving,
	Connecting,
	Handshaking,
	Writing,
	Reading,
	KeepAlive,
}

/// A handle the pool holds onto an `HttpClient`. Enqueuing forwards the
/// request onto the client's serial task via an unbounded channel send,
/// so the queue itself never needs a lock.
#[derive(Clone)]
pub struct HttpClientHandle {
	tx: mpsc::UnboundedSender<Request>,
	stats: Arc<ClientStatsCell>,
	phase: Arc<parking_lot::Mutex<Phase>>,
}

impl HttpClientHandle {
	pub fn enqueue(&self, req: Request) {
		self.stats.increment_queue_size();
		// If the send fails the actor task has exited; surface that as an
		// immediate terminal error rather than dropping the request
		// silently.
		if let Err(mpsc::error::SendError(mut req)) = self.tx.send(req) {
			req.complete(Outcome {
				error: Some(PoolError::Connect {
					endpoint: "<client task exited>".to_string(),
					source: anyhow::anyhow!("http client actor is no longer running"),
				}),
				stage: Stage::Connect,
				response: None,
			});
		}
	}

	pub fn queue_size(&self) -> u64 {
		self.stats.queue_size()
	}

	pub fn stats(&self) -> Arc<ClientStatsCell> {
		self.stats.clone()
	}

	pub fn phase(&self) -> Phase {
		*self.phase.lock()
	}
}

pub struct HttpClientDeps {
	pub resolver: Arc<dyn Resolver>,
	pub tls_engine: Arc<dyn TlsEngine>,
	pub codec: Arc<dyn MessageCodec>,
	pub config: Arc<PoolConfig>,
	pub metrics: Option<Arc<PoolMetrics>>,
}

/// Spawn a fresh `HttpClient` task bound to `key`, returning the handle
/// the pool keeps.
pub fn spawn(key: DestinationKey, deps: HttpClientDeps) -> HttpClientHandle {
	let (tx, rx) = mpsc::unbounded_channel();
	let stats = Arc::new(ClientStatsCell::default());
	let phase = Arc::new(parking_lot::Mutex::new(Phase::Idle));
	let default_idle = deps.config.keep_alive_timeout;
	let driver = Driver {
		key,
		deps,
		stream: ManagedStream::init(None),
		tls_profile: None,
		queue: VecDeque::new(),
		trycnt: 0,
		stats: stats.clone(),
		phase: phase.clone(),
		next_idle_timeout: default_idle,
	};
	tokio::spawn(driver.run(rx));
	HttpClientHandle { tx, stats, phase }
}

/// Spawn a client bound to a TLS profile (the stream will be upgraded on
/// first connect).
pub fn spawn_tls(
	key: DestinationKey,
	tls_profile: crate::key::TlsProfile,
	deps: HttpClientDeps,
) -> HttpClientHandle {
	let (tx, rx) = mpsc::unbounded_channel();
	let stats = Arc::new(ClientStatsCell::default());
	let phase = Arc::new(parking_lot::Mutex::new(Phase::Idle));
	let default_idle = deps.config.keep_alive_timeout;
	let driver = Driver {
		key,
		deps,
		stream: ManagedStream::init(Some(tls_profile)),
		tls_profile: Some(tls_profile),
		queue: VecDeque::new(),
		trycnt: 0,
		stats: stats.clone(),
		phase: phase.clone(),
		next_idle_timeout: default_idle,
	};
	tokio::spawn(driver.run(rx));
	HttpClientHandle { tx, stats, phase }
}

struct Driver {
	key: DestinationKey,
	deps: HttpClientDeps,
	stream: ManagedStream,
	tls_profile: Option<crate::key::TlsProfile>,
	queue: VecDeque<Request>,
	/// Retries of the current head-of-queue request; 0 or 1.
	trycnt: u8,
	stats: Arc<ClientStatsCell>,
	phase: Arc<parking_lot::Mutex<Phase>>,
	/// Idle window to wait for the *next* time the client goes idle,
	/// derived from the most recently completed response's `Keep-Alive`
	/// header (or the configured default if absent).
	next_idle_timeout: Duration,
}

impl Driver {
	fn set_phase(&self, p: Phase) {
		*self.phase.lock() = p;
	}

	async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
		loop {
			if self.queue.is_empty() {
				self.set_phase(Phase::Idle);
				if self.stream.valid() {
					let keep_alive = self.next_idle_timeout;
					tokio::select! {
						biased;
						maybe_req = rx.recv() => {
							match maybe_req {
								Some(req) => self.accept(req),
								None => break,
							}
						}
						_ = tokio::time::sleep(keep_alive) => {
							self.set_phase(Phase::KeepAlive);
							trace!(destination = %self.key, "idle window elapsed, closing connection");
							self.stream.shutdown().await;
							self.stream.reset();
							continue;
						}
					}
				} else {
					match rx.recv().await {
						Some(req) => self.accept(req),
						None => break,
					}
				}
			} else {
				self.process_head().await;
			}
		}
	}

	fn accept(&mut self, req: Request) {
		self.queue.push_back(req);
		self.stats.set_queue_size(self.queue.len() as u64);
	}

	async fn process_head(&mut self) {
		let start = Instant::now();
		if let Some(m) = &self.deps.metrics {
			m.requests_in_flight.inc();
		}
		loop {
			let outcome = self.attempt().await;
			match outcome {
				Ok((resp, bytes_written, bytes_read)) => {
					self.trycnt = 0;
					self.stats.record_success(bytes_written, bytes_read, start.elapsed().as_secs_f64());
					let keep_alive = resp
						.keep_alive_timeout_secs()
						.map(Duration::from_secs)
						.unwrap_or(self.deps.config.keep_alive_timeout);
					self.finish_head(Outcome {
						error: None,
						stage: Stage::Complete,
						response: Some(resp),
					});
					self.next_idle_timeout = keep_alive;
					debug!(destination = %self.key, idle_secs = keep_alive.as_secs(), "connection idle, keep-alive window armed");
					return;
				},
				Err(err) if err.is_retryable_stage() && self.trycnt == 0 => {
					warn!(destination = %self.key, stage = %err.stage(), "stale connection suspected, retrying once");
					if let Some(m) = &self.deps.metrics {
						m.retries
							.get_or_create(&DestinationLabels {
								destination: self.key.to_string(),
							})
							.inc();
					}
					self.stream.reset();
					self.trycnt = 1;
					continue;
				},
				Err(err) => {
					self.trycnt = 0;
					self.stats.record_error(start.elapsed().as_secs_f64());
					let stage = err.stage();
					self.stream.reset();
					self.finish_head(Outcome {
						error: Some(err),
						stage,
						response: None,
					});
					return;
				},
			}
		}
	}

	/// One pass through resolve → connect → (handshake) → write → read.
	/// Skips resolve/connect/handshake if the stream is already valid
	/// (the common keep-alive-reuse path).
	async fn attempt(&mut self) -> Result<(crate::request::Response, u64, u64), PoolError> {
		let cfg = self.deps.config.clone();
		if !self.stream.valid() {
			self.set_phase(Phase::Resolving);
			let host = self.key.host().to_string();
			let port: u16 = self.key.port().parse().unwrap_or(if self.tls_profile.is_some() { 443 } else { 80 });
			let endpoints: Vec<SocketAddr> = timeout(cfg.connect_timeout, self.deps.resolver.resolve(&host, port))
				.await
				.map_err(|_| PoolError::Timeout { stage: Stage::Resolve })?
				.map_err(|e| PoolError::Resolve { host: host.clone(), source: e })?;

			self.set_phase(Phase::Connecting);
			let connect_start = Instant::now();
			timeout(cfg.connect_timeout, self.stream.connect(&endpoints))
				.await
				.map_err(|_| PoolError::Timeout { stage: Stage::Connect })??;
			if let Some(m) = &self.deps.metrics {
				m.connect_duration
					.get_or_create(&DestinationLabels {
						destination: self.key.to_string(),
					})
					.observe(connect_start.elapsed().as_secs_f64());
			}

			if self.tls_profile.is_some() {
				self.set_phase(Phase::Handshaking);
				let sni = self.key.sni_name();
				timeout(
					cfg.connect_timeout,
					self.stream.handshake(&sni, self.deps.tls_engine.as_ref()),
				)
				.await
				.map_err(|_| PoolError::Timeout { stage: Stage::Handshake })??;
			}
		}

		self.set_phase(Phase::Writing);
		if self.trycnt == 0 {
			self.stamp_headers();
		}
		let req = self.queue.front().expect("process_head only runs with a head request");
		let io = self.stream.as_io();
		let bytes_written = timeout(cfg.write_timeout, self.deps.codec.write(io, req))
			.await
			.map_err(|_| PoolError::Timeout { stage: Stage::Write })??;

		self.set_phase(Phase::Reading);
		let io = self.stream.as_io();
		let (resp, bytes_read) = timeout(cfg.read_timeout, self.deps.codec.read(io))
			.await
			.map_err(|_| PoolError::Timeout { stage: Stage::Read })??;

		Ok((resp, bytes_written as u64, bytes_read as u64))
	}

	fn stamp_headers(&mut self) {
		let req = self.queue.front_mut().expect("head request present");
		let host_header = self.key.host();
		req
			.headers
			.insert(http::header::HOST, http::HeaderValue::from_str(host_header).unwrap_or_else(|_| http::HeaderValue::from_static("")));
		req.headers.insert(
			http::header::CONNECTION,
			http::HeaderValue::from_static("keep-alive"),
		);
		req.headers.insert(
			http::header::USER_AGENT,
			http::HeaderValue::from_str(&self.deps.config.user_agent)
				.unwrap_or_else(|_| http::HeaderValue::from_static("httppool")),
		);
	}

	fn finish_head(&mut self, outcome: Outcome) {
		if let Some(m) = &self.deps.metrics {
			m.requests_in_flight.dec();
		}
		let mut req = self.queue.pop_front().expect("head request present");
		self.stats.set_queue_size(self.queue.len() as u64);
		req.complete(outcome);
	}

}
