//! The outbound request/response pair carried through one trip of the
//! state machine.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

use crate::error::{PoolError, Stage};

/// A request or response body. Empty is distinct from an empty string so a
/// codec can skip writing a body entirely rather than writing a
/// zero-length one.
#[derive(Debug, Clone, Default)]
pub enum Body {
	#[default]
	Empty,
	Text(String),
	Binary(Bytes),
}

impl Body {
	pub fn len(&self) -> usize {
		match self {
			Body::Empty => 0,
			Body::Text(s) => s.len(),
			Body::Binary(b) => b.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn as_bytes(&self) -> &[u8] {
		match self {
			Body::Empty => &[],
			Body::Text(s) => s.as_bytes(),
			Body::Binary(b) => b.as_ref(),
		}
	}
}

impl From<String> for Body {
	fn from(value: String) -> Self {
		Body::Text(value)
	}
}

impl From<Bytes> for Body {
	fn from(value: Bytes) -> Self {
		Body::Binary(value)
	}
}

/// A response as delivered to a request's completion callback: the full
/// body is read before completion fires (no streaming to the caller).
#[derive(Debug, Clone)]
pub struct Response {
	pub status: StatusCode,
	pub reason: String,
	pub headers: HeaderMap,
	pub body: Body,
}

impl Response {
	/// Search the `Keep-Alive` header for a `timeout=<int>` directive.
	/// Returns `None` if absent, malformed, or non-positive.
	pub fn keep_alive_timeout_secs(&self) -> Option<u64> {
		let value = self.headers.get("keep-alive")?.to_str().ok()?;
		let idx = value.find("timeout=")?;
		let digits: String = value[idx + "timeout=".len()..]
			.chars()
			.take_while(|c| c.is_ascii_digit())
			.collect();
		let n: u64 = digits.parse().ok()?;
		if n == 0 { None } else { Some(n) }
	}
}

/// The outcome delivered to a request's completion callback exactly once.
pub struct Outcome {
	pub error: Option<PoolError>,
	pub stage: Stage,
	pub response: Option<Response>,
}

/// Single-shot completion callback. Consumed at most once; after
/// invocation the owning [`Request`] is discarded.
pub type Completion = Box<dyn FnOnce(Outcome) + Send>;

/// An outbound request together with its pending response slot and
/// completion callback.
pub struct Request {
	pub method: Method,
	pub target: String,
	pub headers: HeaderMap,
	pub body: Body,
	completion: Option<Completion>,
}

impl Request {
	pub fn new(method: Method, target: impl Into<String>, body: Body, completion: Completion) -> Self {
		Request {
			method,
			target: target.into(),
			headers: HeaderMap::new(),
			body,
			completion: Some(completion),
		}
	}

	pub fn get(target: impl Into<String>, completion: Completion) -> Self {
		Request::new(Method::GET, target, Body::Empty, completion)
	}

	pub fn post(target: impl Into<String>, body: Body, completion: Completion) -> Self {
		Request::new(Method::POST, target, body, completion)
	}

	/// Whether this method is considered idempotent for retry purposes.
	pub fn is_idempotent(&self) -> bool {
		matches!(
			self.method,
			Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS | Method::TRACE
		)
	}

	/// Consume the completion callback and invoke it. Panics if called
	/// twice; callers must only call this once per request, which the
	/// state machine in `client.rs` guarantees.
	pub fn complete(&mut self, outcome: Outcome) {
		let cb = self
			.completion
			.take()
			.expect("completion invoked more than once");
		cb(outcome);
	}
}

impl std::fmt::Debug for Request {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Request")
			.field("method", &self.method)
			.field("target", &self.target)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn resp_with_keep_alive(value: &str) -> Response {
		let mut headers = HeaderMap::new();
		headers.insert("keep-alive", value.parse().unwrap());
		Response {
			status: StatusCode::OK,
			reason: "OK".to_string(),
			headers,
			body: Body::Empty,
		}
	}

	#[test]
	fn parses_timeout_directive() {
		let r = resp_with_keep_alive("timeout=15, max=100");
		assert_eq!(r.keep_alive_timeout_secs(), Some(15));
	}

	#[test]
	fn missing_timeout_directive_is_none() {
		let r = resp_with_keep_alive("max=100");
		assert_eq!(r.keep_alive_timeout_secs(), None);
	}

	#[test]
	fn zero_timeout_is_none() {
		let r = resp_with_keep_alive("timeout=0");
		assert_eq!(r.keep_alive_timeout_secs(), None);
	}

	#[test]
	fn non_numeric_timeout_is_none() {
		let r = resp_with_keep_alive("timeout=abc");
		assert_eq!(r.keep_alive_timeout_secs(), None);
	}
}
