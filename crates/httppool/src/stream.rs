//! A uniform handle over either a plain TCP socket or a TLS-wrapped one,
//! collapsed to a small tagged variant rather than a trait object.

use std::net::SocketAddr;
use std::sync::Arc;

use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::error::PoolError;
use crate::key::TlsProfile;

fn connect_err(e: impl Into<anyhow::Error>, endpoint: SocketAddr) -> PoolError {
	PoolError::Connect {
		endpoint: endpoint.to_string(),
		source: e.into(),
	}
}

fn handshake_err(e: impl Into<anyhow::Error>, sni: &str) -> PoolError {
	PoolError::Handshake {
		sni: sni.to_string(),
		source: e.into(),
	}
}

/// Resolves a [`TlsProfile`] to a concrete client config. Kept separate
/// from [`ManagedStream`] so tests can swap in a config that trusts a
/// self-signed test certificate.
pub trait TlsEngine: Send + Sync {
	fn client_config(&self, profile: TlsProfile) -> Arc<rustls::ClientConfig>;
}

enum Inner {
	None,
	Plain(TcpStream),
	Tls(Box<TlsStream<TcpStream>>),
}

/// The connection-lifecycle handle: `init`, `valid`, `connect`,
/// `handshake`, `shutdown`, `reset`. Reading/writing HTTP messages over
/// the established socket is the [`crate::codec::MessageCodec`]'s job,
/// not this type's — this type only owns the raw byte stream.
pub struct ManagedStream {
	inner: Inner,
	tls_profile: Option<TlsProfile>,
}

impl ManagedStream {
	/// Construct a stream configured for `profile`; discards any previous
	/// socket. `profile = None` means a plain connection.
	pub fn init(profile: Option<TlsProfile>) -> Self {
		ManagedStream {
			inner: Inner::None,
			tls_profile: profile,
		}
	}

	pub fn valid(&self) -> bool {
		!matches!(self.inner, Inner::None)
	}

	pub fn tls_profile(&self) -> Option<TlsProfile> {
		self.tls_profile
	}

	/// Iterate resolved endpoints, succeeding on the first that accepts a
	/// connection.
	pub async fn connect(&mut self, endpoints: &[SocketAddr]) -> Result<(), PoolError> {
		let mut last_err = None;
		for ep in endpoints {
			match TcpStream::connect(*ep).await {
				Ok(sock) => {
					let _ = sock.set_nodelay(true);
					self.inner = Inner::Plain(sock);
					return Ok(());
				},
				Err(e) => last_err = Some(connect_err(e, *ep)),
			}
		}
		Err(last_err.unwrap_or_else(|| {
			connect_err(
				anyhow::anyhow!("no endpoints to try"),
				SocketAddr::from(([0, 0, 0, 0], 0)),
			)
		}))
	}

	/// TLS only: set SNI and perform the handshake, upgrading the current
	/// plain socket in place.
	pub async fn handshake(&mut self, sni_host: &str, engine: &dyn TlsEngine) -> Result<(), PoolError> {
		let profile = self
			.tls_profile
			.expect("handshake called on a plain stream");
		let tcp = match std::mem::replace(&mut self.inner, Inner::None) {
			Inner::Plain(tcp) => tcp,
			other => {
				self.inner = other;
				return Err(handshake_err(
					anyhow::anyhow!("handshake attempted without a connected socket"),
					sni_host,
				));
			},
		};
		let server_name = ServerName::try_from(sni_host.to_string())
			.map_err(|e| handshake_err(e, sni_host))?;
		let config = engine.client_config(profile);
		let tls = TlsConnector::from(config)
			.connect(server_name, tcp)
			.await
			.map_err(|e| handshake_err(e, sni_host))?;
		self.inner = Inner::Tls(Box::new(tls));
		Ok(())
	}

	pub fn as_io(&mut self) -> &mut (dyn crate::codec::AsyncIo) {
		match &mut self.inner {
			Inner::Plain(tcp) => tcp,
			Inner::Tls(tls) => tls.as_mut(),
			Inner::None => panic!("stream has no socket; call connect first"),
		}
	}

	/// Half-close both directions on the socket without releasing it.
	pub async fn shutdown(&mut self) {
		use tokio::io::AsyncWriteExt;
		let _ = match &mut self.inner {
			Inner::Plain(tcp) => tcp.shutdown().await,
			Inner::Tls(tls) => tls.shutdown().await,
			Inner::None => return,
		};
	}

	/// Drop the socket entirely and release its resources.
	pub fn reset(&mut self) {
		self.inner = Inner::None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_stream_is_invalid() {
		let s = ManagedStream::init(None);
		assert!(!s.valid());
	}

	#[tokio::test]
	async fn reset_clears_validity() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			let _ = listener.accept().await;
		});
		let mut s = ManagedStream::init(None);
		s.connect(&[addr]).await.unwrap();
		assert!(s.valid());
		s.reset();
		assert!(!s.valid());
	}
}
