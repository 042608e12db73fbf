//! Demo driver: parses URLs off the command line and fires GET requests
//! at them on a fixed interval through an `HttpClientPool`, printing
//! per-destination and aggregate stats periodically.
//!
//! This binary is deliberately thin — URL parsing, CLI argument handling
//! and process lifetime are driver glue; all the interesting engineering
//! lives in the `httppool` library crate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use httppool::codec::Http1Codec;
use httppool::pool::{HttpClientPool, PoolDeps};
use httppool::resolver::SystemResolver;
use httppool::tls::SystemTlsEngine;
use httppool::{PoolConfig, Request, TlsProfile};
use tracing::{info, warn};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "httppool-demo", about = "Drives an HttpClientPool against one or more URLs")]
struct Args {
	/// URLs to poll, e.g. http://example.com/ https://example.com/status
	#[arg(required = true)]
	urls: Vec<String>,

	/// Seconds between request bursts.
	#[arg(long, default_value_t = 1)]
	interval_secs: u64,

	/// Maximum connections to keep open per destination.
	#[arg(long, default_value_t = 2)]
	max_per_host: usize,

	/// Number of bursts to send before exiting; 0 means run forever.
	#[arg(long, default_value_t = 0)]
	rounds: u64,
}

struct Destination {
	host: String,
	port: String,
	tls: Option<TlsProfile>,
	path: String,
}

fn parse_destination(raw: &str) -> anyhow::Result<Destination> {
	let url = Url::parse(raw).with_context(|| format!("parsing URL {raw}"))?;
	let host = url
		.host_str()
		.ok_or_else(|| anyhow::anyhow!("URL {raw} has no host"))?
		.to_string();
	let tls = match url.scheme() {
		"https" => Some(TlsProfile::TlsClient),
		"http" => None,
		other => anyhow::bail!("unsupported scheme {other} in {raw}"),
	};
	let port = url
		.port_or_known_default()
		.ok_or_else(|| anyhow::anyhow!("no default port for {raw}"))?
		.to_string();
	let path = if url.path().is_empty() { "/".to_string() } else { url.path().to_string() };
	Ok(Destination { host, port, tls, path })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let args = Args::parse();
	let destinations: Vec<Destination> = args
		.urls
		.iter()
		.map(|u| parse_destination(u))
		.collect::<anyhow::Result<_>>()?;

	let mut config = PoolConfig::default();
	config.max_per_host = args.max_per_host;

	let pool = Arc::new(HttpClientPool::new(
		config,
		PoolDeps {
			resolver: Arc::new(SystemResolver::from_system_conf()?),
			tls_engine: Arc::new(SystemTlsEngine::new()?),
			codec: Arc::new(Http1Codec),
			metrics: None,
		},
	));

	let mut round: u64 = 0;
	let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs.max(1)));
	loop {
		ticker.tick().await;
		round += 1;
		for dest in &destinations {
			let (tx, rx) = tokio::sync::oneshot::channel();
			let label = format!("{}:{}{}", dest.host, dest.port, dest.path);
			pool.enqueue(
				&dest.host,
				&dest.port,
				dest.tls,
				Request::get(
					dest.path.clone(),
					Box::new(move |outcome| {
						let _ = tx.send(outcome);
					}),
				),
			);
			tokio::spawn(async move {
				match rx.await {
					Ok(outcome) => match outcome.error {
						None => {
							let status = outcome.response.as_ref().map(|r| r.status.as_u16()).unwrap_or(0);
							info!(%label, status, "request completed");
						},
						Some(err) => warn!(%label, stage = %outcome.stage, error = %err, "request failed"),
					},
					Err(_) => warn!(%label, "completion channel dropped"),
				}
			});
		}

		let stats = pool.stats();
		info!(
			host_count = stats.host_count,
			active = stats.active_count,
			inactive = stats.inactive_count,
			queue_size = stats.queue_size,
			bandwidth = stats.bandwidth,
			"pool stats"
		);

		if args.rounds > 0 && round >= args.rounds {
			break;
		}
	}

	Ok(())
}
