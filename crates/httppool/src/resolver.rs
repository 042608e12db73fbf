//! DNS resolution, abstracted so the core pool/client logic never depends
//! directly on a resolver implementation.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use hickory_resolver::TokioResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};

/// Resolves a `(host, port)` pair to a non-empty set of candidate
/// endpoints. An empty result is treated as a resolve failure by the
/// caller.
pub trait Resolver: Send + Sync {
	fn resolve(
		&self,
		host: &str,
		port: u16,
	) -> impl Future<Output = anyhow::Result<Vec<SocketAddr>>> + Send;
}

/// A [`Resolver`] backed by `hickory-resolver`, using the system's
/// configured nameservers.
pub struct SystemResolver {
	inner: TokioResolver,
}

impl SystemResolver {
	pub fn new(cfg: ResolverConfig, opts: ResolverOpts) -> Self {
		let inner = TokioResolver::builder_with_config(cfg, hickory_resolver::name_server::TokioConnectionProvider::default())
			.with_options(opts)
			.build();
		SystemResolver { inner }
	}

	pub fn from_system_conf() -> anyhow::Result<Self> {
		let inner = TokioResolver::builder_tokio()
			.context("reading system resolver configuration")?
			.build();
		Ok(SystemResolver { inner })
	}
}

impl Resolver for SystemResolver {
	async fn resolve(&self, host: &str, port: u16) -> anyhow::Result<Vec<SocketAddr>> {
		if let Ok(addr) = host.parse::<std::net::IpAddr>() {
			return Ok(vec![SocketAddr::new(addr, port)]);
		}
		let response = self
			.inner
			.lookup_ip(host)
			.await
			.with_context(|| format!("resolving {host}"))?;
		let endpoints: Vec<SocketAddr> = response.iter().map(|ip| SocketAddr::new(ip, port)).collect();
		if endpoints.is_empty() {
			anyhow::bail!("no addresses found for {host}");
		}
		Ok(endpoints)
	}
}

/// Test doubles for the `Resolver` collaborator. Kept public (rather than
/// `#[cfg(test)]`-gated) so downstream integration tests — in this crate's
/// own `tests/` directory and in `httppool-cli`'s — can drive the pool
/// deterministically without a real DNS server.
pub mod fake {
	use std::net::SocketAddr;

	use super::Resolver;

	/// A fake resolver standing in for the DNS collaborator, for
	/// deterministic tests.
	pub struct FakeResolver {
		pub result: Result<Vec<SocketAddr>, String>,
	}

	impl FakeResolver {
		pub fn ok(endpoints: Vec<SocketAddr>) -> Self {
			FakeResolver {
				result: Ok(endpoints),
			}
		}

		pub fn failing(msg: impl Into<String>) -> Self {
			FakeResolver {
				result: Err(msg.into()),
			}
		}
	}

	impl Resolver for FakeResolver {
		async fn resolve(&self, _host: &str, _port: u16) -> anyhow::Result<Vec<SocketAddr>> {
			match &self.result {
				Ok(v) if !v.is_empty() => Ok(v.clone()),
				Ok(_) => anyhow::bail!("empty result"),
				Err(e) => anyhow::bail!("{e}"),
			}
		}
	}
}
