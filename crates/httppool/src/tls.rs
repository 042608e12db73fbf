//! Concrete [`TlsEngine`] implementation: resolves the two
//! [`TlsProfile`] variants to `rustls::ClientConfig`s trusting the
//! platform's native certificate store.
//!
//! This crate needs only the config resolution half since
//! `stream::ManagedStream` owns the connect/handshake call itself.

use std::sync::Arc;

use rustls::ClientConfig;
use rustls::RootCertStore;

use crate::key::TlsProfile;
use crate::stream::TlsEngine;

/// Builds `rustls::ClientConfig`s once at construction and hands out
/// cheap `Arc` clones thereafter.
pub struct SystemTlsEngine {
	tls12: Arc<ClientConfig>,
	modern: Arc<ClientConfig>,
}

impl SystemTlsEngine {
	pub fn new() -> anyhow::Result<Self> {
		let mut roots = RootCertStore::empty();
		for cert in rustls_native_certs::load_native_certs().certs {
			// Malformed entries are skipped rather than aborting startup;
			// a handful of bad platform certs shouldn't prevent every
			// outbound TLS connection from working.
			let _ = roots.add(cert);
		}

		let modern = ClientConfig::builder()
			.with_root_certificates(roots.clone())
			.with_no_client_auth();

		let tls12 = ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS12])
			.with_root_certificates(roots)
			.with_no_client_auth();

		Ok(SystemTlsEngine {
			tls12: Arc::new(tls12),
			modern: Arc::new(modern),
		})
	}
}

impl TlsEngine for SystemTlsEngine {
	fn client_config(&self, profile: TlsProfile) -> Arc<ClientConfig> {
		match profile {
			TlsProfile::Tls12Client => self.tls12.clone(),
			TlsProfile::TlsClient => self.modern.clone(),
		}
	}
}
