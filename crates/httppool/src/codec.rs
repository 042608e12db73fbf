//! HTTP/1.1 message encoding/decoding, abstracted behind [`MessageCodec`].
//! The core state machine only depends on this trait; [`Http1Codec`] is
//! the concrete implementation the demo binary wires up.

use std::future::Future;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::PoolError;
use crate::request::{Body, Request, Response};

/// Async byte-stream a codec writes to / reads from. Implemented by both
/// the plain and TLS variants of [`crate::stream::ManagedStream`].
pub trait AsyncIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncIo for T {}

/// Serializes requests and parses responses over an [`AsyncIo`].
pub trait MessageCodec: Send + Sync {
	fn write<'a>(
		&'a self,
		io: &'a mut (dyn AsyncIo + 'a),
		req: &'a Request,
	) -> impl Future<Output = Result<usize, PoolError>> + Send + 'a;

	fn read<'a>(
		&'a self,
		io: &'a mut (dyn AsyncIo + 'a),
	) -> impl Future<Output = Result<(Response, usize), PoolError>> + Send + 'a;
}

/// A straightforward HTTP/1.1 codec: no chunked transfer-encoding, no
/// pipelining — responses are read fully by `Content-Length` (or until EOF
/// for close-terminated bodies) before the request completes.
#[derive(Default)]
pub struct Http1Codec;

fn write_err(e: impl Into<anyhow::Error>) -> PoolError {
	PoolError::Write { source: e.into() }
}

fn read_err(e: impl Into<anyhow::Error>) -> PoolError {
	PoolError::Read { source: e.into() }
}

impl MessageCodec for Http1Codec {
	async fn write<'a>(
		&'a self,
		io: &'a mut (dyn AsyncIo + 'a),
		req: &'a Request,
	) -> Result<usize, PoolError> {
		let mut buf = BytesMut::new();
		buf.extend_from_slice(format!("{} {} HTTP/1.1\r\n", req.method, req.target).as_bytes());
		for (name, value) in req.headers.iter() {
			buf.extend_from_slice(name.as_str().as_bytes());
			buf.extend_from_slice(b": ");
			buf.extend_from_slice(value.as_bytes());
			buf.extend_from_slice(b"\r\n");
		}
		if !req.body.is_empty() && !req.headers.contains_key("content-length") {
			buf.extend_from_slice(format!("content-length: {}\r\n", req.body.len()).as_bytes());
		}
		buf.extend_from_slice(b"\r\n");
		buf.extend_from_slice(req.body.as_bytes());
		let n = buf.len();
		io.write_all(&buf).await.map_err(write_err)?;
		io.flush().await.map_err(write_err)?;
		Ok(n)
	}

	async fn read<'a>(&'a self, io: &'a mut (dyn AsyncIo + 'a)) -> Result<(Response, usize), PoolError> {
		let mut buf = BytesMut::with_capacity(4096);
		let header_end = loop {
			let mut chunk = [0u8; 4096];
			let n = io.read(&mut chunk).await.map_err(read_err)?;
			if n == 0 {
				return Err(read_err(anyhow::anyhow!("connection closed before headers completed")));
			}
			buf.extend_from_slice(&chunk[..n]);
			if let Some(pos) = find_header_end(&buf) {
				break pos;
			}
			if buf.len() > 64 * 1024 {
				return Err(read_err(anyhow::anyhow!("response headers too large")));
			}
		};

		let head = buf.split_to(header_end);
		let _ = buf.split_to(4.min(buf.len())); // discard the blank-line separator
		let head_str =
			std::str::from_utf8(&head).map_err(|e| read_err(anyhow::anyhow!("invalid header bytes: {e}")))?;
		let mut lines = head_str.split("\r\n");
		let status_line = lines
			.next()
			.ok_or_else(|| read_err(anyhow::anyhow!("empty response")))?;
		let (status, reason) = parse_status_line(status_line)?;

		let mut headers = HeaderMap::new();
		for line in lines {
			if line.is_empty() {
				continue;
			}
			let Some((name, value)) = line.split_once(':') else {
				continue;
			};
			let name = http::header::HeaderName::from_bytes(name.trim().as_bytes())
				.map_err(|e| read_err(anyhow::anyhow!("bad header name: {e}")))?;
			let value = http::header::HeaderValue::from_str(value.trim())
				.map_err(|e| read_err(anyhow::anyhow!("bad header value: {e}")))?;
			headers.append(name, value);
		}

		let content_length: Option<usize> = headers
			.get(http::header::CONTENT_LENGTH)
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.parse().ok());

		let body = match content_length {
			Some(0) => Bytes::new(),
			Some(len) => {
				while buf.len() < len {
					let mut chunk = [0u8; 4096];
					let n = io.read(&mut chunk).await.map_err(read_err)?;
					if n == 0 {
						return Err(read_err(anyhow::anyhow!("connection closed before body completed")));
					}
					buf.extend_from_slice(&chunk[..n]);
				}
				buf.split_to(len).freeze()
			},
			// No Content-Length: a close-terminated body. Read until EOF
			// rather than assuming empty, since the peer may still be
			// sending bytes after the header block.
			None => {
				loop {
					let mut chunk = [0u8; 4096];
					let n = io.read(&mut chunk).await.map_err(read_err)?;
					if n == 0 {
						break;
					}
					buf.extend_from_slice(&chunk[..n]);
				}
				buf.split_to(buf.len()).freeze()
			},
		};

		let total = header_end + 4 + body.len();
		let response = Response {
			status,
			reason,
			headers,
			body: Body::Binary(body),
		};
		Ok((response, total))
	}
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
	buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status_line(line: &str) -> Result<(StatusCode, String), PoolError> {
	let mut parts = line.splitn(3, ' ');
	let _version = parts
		.next()
		.ok_or_else(|| read_err(anyhow::anyhow!("missing HTTP version")))?;
	let code = parts
		.next()
		.ok_or_else(|| read_err(anyhow::anyhow!("missing status code")))?;
	let reason = parts.next().unwrap_or("").to_string();
	let status = code
		.parse::<u16>()
		.ok()
		.and_then(|c| StatusCode::from_u16(c).ok())
		.ok_or_else(|| read_err(anyhow::anyhow!("invalid status code: {code}")))?;
	Ok((status, reason))
}

#[cfg(test)]
mod tests {
	use tokio::io::duplex;

	use super::*;

	#[tokio::test]
	async fn round_trips_a_simple_response() {
		let (mut client, mut server) = duplex(4096);
		let server_task = tokio::spawn(async move {
			let mut buf = [0u8; 1024];
			let _ = server.read(&mut buf).await.unwrap();
			server
				.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
				.await
				.unwrap();
		});
		let codec = Http1Codec;
		let req = Request::get("/a", Box::new(|_| {}));
		codec.write(&mut client, &req).await.unwrap();
		let (resp, _n) = codec.read(&mut client).await.unwrap();
		server_task.await.unwrap();
		assert_eq!(resp.status, StatusCode::OK);
		assert_eq!(resp.body.as_bytes(), b"hello");
	}
}
