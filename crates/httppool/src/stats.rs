//! Per-client and pool-wide traffic counters.

use parking_lot::Mutex;

/// `state` is 0 when the client's last terminal operation failed, 1 when
/// it succeeded. Guarded by its own mutex (not the client's serial
/// context) because the pool samples it from a different task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientStats {
	pub state: u8,
	pub queue_size: u64,
	pub error_count: u64,
	pub total_requests: u64,
	pub bytes_written: u64,
	pub bytes_read: u64,
	pub total_seconds: f64,
}

/// Thread-safe counters owned by one `HttpClient`.
#[derive(Default)]
pub struct ClientStatsCell {
	inner: Mutex<ClientStats>,
}

impl ClientStatsCell {
	pub fn record_success(&self, bytes_written: u64, bytes_read: u64, elapsed_secs: f64) {
		let mut s = self.inner.lock();
		s.state = 1;
		s.total_requests += 1;
		s.bytes_written += bytes_written;
		s.bytes_read += bytes_read;
		s.total_seconds += elapsed_secs;
	}

	pub fn record_error(&self, elapsed_secs: f64) {
		let mut s = self.inner.lock();
		s.state = 0;
		s.error_count += 1;
		s.total_requests += 1;
		s.total_seconds += elapsed_secs;
	}

	pub fn set_queue_size(&self, size: u64) {
		self.inner.lock().queue_size = size;
	}

	/// Bump `queue_size` by one under a single lock acquisition, so
	/// concurrent enqueues routed to the same client can't race a
	/// read-then-write and lose an increment.
	pub fn increment_queue_size(&self) -> u64 {
		let mut s = self.inner.lock();
		s.queue_size += 1;
		s.queue_size
	}

	pub fn queue_size(&self) -> u64 {
		self.inner.lock().queue_size
	}

	/// Snapshot the current counters. When `reset` is true, zero the
	/// cumulative fields (but not `state` or `queue_size`, which reflect
	/// current condition rather than accumulation) after reporting their
	/// pre-reset values.
	pub fn snapshot(&self, reset: bool) -> ClientStats {
		let mut s = self.inner.lock();
		let out = *s;
		if reset {
			s.error_count = 0;
			s.total_requests = 0;
			s.bytes_written = 0;
			s.bytes_read = 0;
			s.total_seconds = 0.0;
		}
		out
	}
}

/// Aggregate counters across every `HttpClient` in a pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStats {
	pub host_count: u64,
	pub active_count: u64,
	pub inactive_count: u64,
	pub queue_size: u64,
	pub bytes_written: u64,
	pub bytes_read: u64,
	pub total_seconds: f64,
	pub bandwidth: f64,
}

impl PoolStats {
	pub fn finalize(mut self) -> Self {
		self.bandwidth = if self.total_seconds > 0.0 {
			(self.bytes_read as f64 + self.bytes_written as f64) / self.total_seconds
		} else {
			0.0
		};
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stats_are_monotonic_between_resets() {
		let cell = ClientStatsCell::default();
		cell.record_success(10, 20, 0.5);
		let first = cell.snapshot(false);
		cell.record_success(5, 5, 0.25);
		let second = cell.snapshot(false);
		assert!(second.total_requests >= first.total_requests);
		assert!(second.bytes_written >= first.bytes_written);
		assert!(second.bytes_read >= first.bytes_read);
		assert!(second.error_count >= first.error_count);
	}

	#[test]
	fn reset_zeroes_cumulative_fields_only() {
		let cell = ClientStatsCell::default();
		cell.record_success(10, 20, 1.0);
		cell.set_queue_size(3);
		let pre = cell.snapshot(true);
		assert_eq!(pre.total_requests, 1);
		let post = cell.snapshot(false);
		assert_eq!(post.total_requests, 0);
		assert_eq!(post.bytes_written, 0);
		assert_eq!(post.queue_size, 3);
		assert_eq!(post.state, 1);
	}

	#[test]
	fn bandwidth_is_zero_without_elapsed_time() {
		let stats = PoolStats {
			bytes_written: 100,
			bytes_read: 100,
			total_seconds: 0.0,
			..Default::default()
		}
		.finalize();
		assert_eq!(stats.bandwidth, 0.0);
	}
}
