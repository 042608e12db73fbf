//! Destination keys: the `(host, port, tls)` triple a pool routes on.

use std::fmt;

/// A named TLS client profile. Opaque from the pool's point of view; the
/// concrete `rustls::ClientConfig` is resolved from this by whatever
/// constructs a [`crate::stream::TokioTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsProfile {
	/// TLS 1.2 only, client auth disabled.
	Tls12Client,
	/// Whatever TLS versions the platform default trusts.
	TlsClient,
}

impl TlsProfile {
	fn suffix_id(self) -> u8 {
		match self {
			TlsProfile::Tls12Client => 1,
			TlsProfile::TlsClient => 2,
		}
	}
}

impl fmt::Display for TlsProfile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TlsProfile::Tls12Client => write!(f, "tlsv12-client"),
			TlsProfile::TlsClient => write!(f, "tls-client"),
		}
	}
}

/// Canonicalized destination identity: `"host[:port][:sslN]"`.
///
/// Two destinations are equal iff their canonical strings are equal, so
/// this type derives equality/hashing from the canonical form rather than
/// the individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
	canonical: String,
	host: String,
	port: String,
	tls: Option<TlsProfile>,
}

impl DestinationKey {
	pub fn new(host: impl Into<String>, port: impl Into<String>, tls: Option<TlsProfile>) -> Self {
		let host = host.into();
		let port = port.into();
		let mut canonical = host.clone();
		if !port.is_empty() {
			canonical.push(':');
			canonical.push_str(&port);
		}
		if let Some(profile) = tls {
			canonical.push_str(":ssl");
			canonical.push_str(&profile.suffix_id().to_string());
		}
		DestinationKey {
			canonical,
			host,
			port,
			tls,
		}
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> &str {
		&self.port
	}

	pub fn tls(&self) -> Option<TlsProfile> {
		self.tls
	}

	/// The `host[:port]` string used as the TLS SNI name.
	pub fn sni_name(&self) -> String {
		if self.port.is_empty() {
			self.host.clone()
		} else {
			format!("{}:{}", self.host, self.port)
		}
	}

	pub fn as_str(&self) -> &str {
		&self.canonical
	}
}

impl fmt::Display for DestinationKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.canonical)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn canonicalizes_bare_host() {
		let k = DestinationKey::new("x", "", None);
		assert_eq!(k.as_str(), "x");
	}

	#[test]
	fn canonicalizes_host_and_port() {
		let k = DestinationKey::new("x", "80", None);
		assert_eq!(k.as_str(), "x:80");
	}

	#[test]
	fn distinct_tls_profiles_produce_distinct_keys() {
		let a = DestinationKey::new("x", "443", Some(TlsProfile::Tls12Client));
		let b = DestinationKey::new("x", "443", Some(TlsProfile::TlsClient));
		assert_ne!(a, b);
		assert_ne!(a.as_str(), b.as_str());
	}

	#[test]
	fn sni_name_includes_port() {
		let k = DestinationKey::new("example.com", "8443", Some(TlsProfile::TlsClient));
		assert_eq!(k.sni_name(), "example.com:8443");
	}
}
