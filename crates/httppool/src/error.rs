//! Error taxonomy and the final-stage enum reported to callers.

use std::fmt;

/// The step of the request lifecycle at which an outcome was observed.
///
/// Mirrors the integer enum in the external interface contract so callers
/// in other languages can match on the numeric value directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Stage {
	None = 0,
	Resolve = 1,
	Connect = 2,
	Handshake = 3,
	Write = 4,
	Read = 5,
	Complete = 6,
}

impl Stage {
	pub fn as_u8(self) -> u8 {
		self as u8
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Stage::None => "none",
			Stage::Resolve => "resolve",
			Stage::Connect => "connect",
			Stage::Handshake => "handshake",
			Stage::Write => "write",
			Stage::Read => "read",
			Stage::Complete => "complete",
		};
		f.write_str(s)
	}
}

/// A terminal failure surfaced to a request's completion callback.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
	#[error("dns resolution failed for {host}: {source}")]
	Resolve {
		host: String,
		#[source]
		source: anyhow::Error,
	},
	#[error("connect to {endpoint} failed: {source}")]
	Connect {
		endpoint: String,
		#[source]
		source: anyhow::Error,
	},
	#[error("tls handshake with {sni} failed: {source}")]
	Handshake {
		sni: String,
		#[source]
		source: anyhow::Error,
	},
	#[error("write failed: {source}")]
	Write {
		#[source]
		source: anyhow::Error,
	},
	#[error("read failed: {source}")]
	Read {
		#[source]
		source: anyhow::Error,
	},
	#[error("operation timed out at stage {stage}")]
	Timeout { stage: Stage },
}

impl PoolError {
	/// The final stage to report alongside this error, per the external
	/// interface contract.
	pub fn stage(&self) -> Stage {
		match self {
			PoolError::Resolve { .. } => Stage::Resolve,
			PoolError::Connect { .. } => Stage::Connect,
			PoolError::Handshake { .. } => Stage::Handshake,
			PoolError::Write { .. } => Stage::Write,
			PoolError::Read { .. } => Stage::Read,
			PoolError::Timeout { stage } => *stage,
		}
	}

	/// Errors at these stages are symptoms of a stale keep-alive socket
	/// and are worth a single silent retry on a fresh connection.
	pub fn is_retryable_stage(&self) -> bool {
		matches!(self.stage(), Stage::Write | Stage::Read)
	}
}
