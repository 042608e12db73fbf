//! End-to-end scenarios against a minimal in-process HTTP/1.1 server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use httppool::codec::Http1Codec;
use httppool::pool::{HttpClientPool, PoolDeps};
use httppool::resolver::fake::FakeResolver;
use httppool::{PoolConfig, Request};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A canned HTTP/1.1 server: accepts connections, and for each one reads
/// requests off the socket (until `\r\n\r\n`) and writes back
/// `200 OK` with `Content-Length: 2` and body `ok`, honoring keep-alive
/// (it keeps reading more requests off the same socket until the client
/// disconnects).
async fn spawn_echo_server(keep_alive_header: Option<&'static str>) -> (SocketAddr, Arc<AtomicUsize>) {
	spawn_server(keep_alive_header, false).await
}

/// Like `spawn_echo_server`, but when `close_after_response` is set the
/// server drops the socket right after writing its response instead of
/// reading a further request off it, simulating a peer that silently
/// closed a keep-alive connection.
async fn spawn_server(keep_alive_header: Option<&'static str>, close_after_response: bool) -> (SocketAddr, Arc<AtomicUsize>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let connections = Arc::new(AtomicUsize::new(0));
	let connections2 = connections.clone();
	tokio::spawn(async move {
		loop {
			let Ok((mut sock, _)) = listener.accept().await else {
				break;
			};
			connections2.fetch_add(1, Ordering::SeqCst);
			tokio::spawn(async move {
				let mut buf = Vec::new();
				loop {
					let mut chunk = [0u8; 4096];
					let Ok(n) = sock.read(&mut chunk).await else { break };
					if n == 0 {
						break;
					}
					buf.extend_from_slice(&chunk[..n]);
					if buf.windows(4).any(|w| w == b"\r\n\r\n") {
						buf.clear();
						let ka = keep_alive_header.map(|v| format!("Keep-Alive: {v}\r\n")).unwrap_or_default();
						let resp = format!("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n{ka}\r\nok");
						if sock.write_all(resp.as_bytes()).await.is_err() {
							break;
						}
						if close_after_response {
							let _ = sock.shutdown().await;
							break;
						}
					}
				}
			});
		}
	});
	(addr, connections)
}

fn test_pool(config: PoolConfig) -> HttpClientPool {
	HttpClientPool::new(
		config,
		PoolDeps {
			resolver: Arc::new(httppool::resolver::SystemResolver::new(
				Default::default(),
				Default::default(),
			)),
			tls_engine: Arc::new(httppool::tls::SystemTlsEngine::new().unwrap()),
			codec: Arc::new(Http1Codec),
			metrics: None,
		},
	)
}

fn completion(tx: oneshot::Sender<httppool::Outcome>) -> httppool::Completion {
	Box::new(move |outcome| {
		let _ = tx.send(outcome);
	})
}

#[tokio::test]
async fn two_requests_share_one_client_and_complete_in_order() {
	let (addr, connections) = spawn_echo_server(None).await;
	let pool = test_pool(PoolConfig::default());
	let host = addr.ip().to_string();
	let port = addr.port().to_string();

	let (tx_a, rx_a) = oneshot::channel();
	let (tx_b, rx_b) = oneshot::channel();
	let order = Arc::new(std::sync::Mutex::new(Vec::new()));
	let order_a = order.clone();
	let order_b = order.clone();

	pool.enqueue(
		&host,
		&port,
		None,
		Request::get(
			"/a",
			Box::new(move |o| {
				order_a.lock().unwrap().push('a');
				let _ = tx_a.send(o);
			}),
		),
	);
	pool.enqueue(
		&host,
		&port,
		None,
		Request::get(
			"/b",
			Box::new(move |o| {
				order_b.lock().unwrap().push('b');
				let _ = tx_b.send(o);
			}),
		),
	);

	let outcome_a = rx_a.await.unwrap();
	let outcome_b = rx_b.await.unwrap();
	assert!(outcome_a.error.is_none());
	assert!(outcome_b.error.is_none());
	assert_eq!(*order.lock().unwrap(), vec!['a', 'b']);
	assert_eq!(pool.client_count(&host, &port, None), 1);
	assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn third_simultaneous_request_does_not_exceed_max_per_host() {
	let (addr, _connections) = spawn_echo_server(None).await;
	let mut cfg = PoolConfig::default();
	cfg.max_per_host = 2;
	let pool = test_pool(cfg);
	let host = addr.ip().to_string();
	let port = addr.port().to_string();

	let mut receivers = Vec::new();
	for path in ["/a", "/b", "/c"] {
		let (tx, rx) = oneshot::channel();
		pool.enqueue(&host, &port, None, Request::get(path, completion(tx)));
		receivers.push(rx);
	}
	for rx in receivers {
		let outcome = rx.await.unwrap();
		assert!(outcome.error.is_none());
	}

	assert_eq!(pool.client_count(&host, &port, None), 2);
}

#[tokio::test]
async fn keep_alive_header_controls_idle_window() {
	let (addr, connections) = spawn_echo_server(Some("timeout=1")).await;
	let mut cfg = PoolConfig::default();
	cfg.keep_alive_timeout = std::time::Duration::from_secs(60);
	let pool = test_pool(cfg);
	let host = addr.ip().to_string();
	let port = addr.port().to_string();

	let (tx, rx) = oneshot::channel();
	pool.enqueue(&host, &port, None, Request::get("/a", completion(tx)));
	let outcome = rx.await.unwrap();
	assert!(outcome.error.is_none());
	assert_eq!(connections.load(Ordering::SeqCst), 1);

	tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

	let (tx2, rx2) = oneshot::channel();
	pool.enqueue(&host, &port, None, Request::get("/b", completion(tx2)));
	let outcome2 = rx2.await.unwrap();
	assert!(outcome2.error.is_none());
	assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stale_keep_alive_connection_triggers_silent_reconnect() {
	let (addr, connections) = spawn_server(None, true).await;
	let pool = test_pool(PoolConfig::default());
	let host = addr.ip().to_string();
	let port = addr.port().to_string();

	let (tx, rx) = oneshot::channel();
	pool.enqueue(&host, &port, None, Request::get("/a", completion(tx)));
	let outcome = rx.await.unwrap();
	assert!(outcome.error.is_none());

	// Give the server's task time to close the socket before the client
	// tries to reuse it for the next request.
	tokio::time::sleep(std::time::Duration::from_millis(50)).await;

	let (tx2, rx2) = oneshot::channel();
	pool.enqueue(&host, &port, None, Request::get("/b", completion(tx2)));
	let outcome2 = rx2.await.unwrap();
	assert!(outcome2.error.is_none(), "write/read failure on a stale socket should retry silently");
	assert_eq!(pool.client_count(&host, &port, None), 1);
	assert_eq!(connections.load(Ordering::SeqCst), 2);
}

/// A server that accepts a connection and closes it immediately without
/// reading or writing anything, on every connection it ever accepts —
/// unlike `spawn_server`'s `close_after_response`, which only fails the
/// connection *after* one successful exchange.
async fn spawn_always_failing_server() -> (SocketAddr, Arc<AtomicUsize>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let connections = Arc::new(AtomicUsize::new(0));
	let connections2 = connections.clone();
	tokio::spawn(async move {
		loop {
			let Ok((sock, _)) = listener.accept().await else {
				break;
			};
			connections2.fetch_add(1, Ordering::SeqCst);
			drop(sock);
		}
	});
	(addr, connections)
}

#[tokio::test]
async fn second_consecutive_write_read_failure_is_terminal() {
	let (addr, connections) = spawn_always_failing_server().await;
	let pool = test_pool(PoolConfig::default());
	let host = addr.ip().to_string();
	let port = addr.port().to_string();

	let (tx, rx) = oneshot::channel();
	pool.enqueue(&host, &port, None, Request::get("/a", completion(tx)));
	let outcome = rx.await.unwrap();

	assert!(
		outcome.error.is_some(),
		"a connection that fails write/read on both the original attempt and the retry must surface an error"
	);
	assert!(
		matches!(outcome.stage, httppool::Stage::Write | httppool::Stage::Read),
		"unexpected terminal stage: {:?}",
		outcome.stage
	);
	// One connection for the first attempt, one for the retry — no third
	// attempt beyond the single retry cap.
	assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn connect_timeout_is_not_retried() {
	let mut cfg = PoolConfig::default();
	cfg.connect_timeout = std::time::Duration::from_millis(50);
	let pool = HttpClientPool::new(
		cfg,
		PoolDeps {
			resolver: Arc::new(FakeResolver::ok(vec!["192.0.2.1:80".parse().unwrap()])),
			tls_engine: Arc::new(httppool::tls::SystemTlsEngine::new().unwrap()),
			codec: Arc::new(Http1Codec),
			metrics: None,
		},
	);

	let (tx, rx) = oneshot::channel();
	pool.enqueue("unreachable.invalid", "80", None, Request::get("/a", completion(tx)));
	let outcome = rx.await.unwrap();
	assert!(outcome.error.is_some());
	assert_eq!(outcome.stage, httppool::Stage::Connect);
	assert_eq!(pool.client_count("unreachable.invalid", "80", None), 1);
}

#[tokio::test]
async fn dns_failure_reports_resolve_stage_error() {
	let pool = HttpClientPool::new(
		PoolConfig::default(),
		PoolDeps {
			resolver: Arc::new(FakeResolver::failing("no such host")),
			tls_engine: Arc::new(httppool::tls::SystemTlsEngine::new().unwrap()),
			codec: Arc::new(Http1Codec),
			metrics: None,
		},
	);

	let (tx, rx) = oneshot::channel();
	pool.enqueue("nowhere.invalid", "80", None, Request::get("/a", completion(tx)));
	let outcome = rx.await.unwrap();
	assert!(outcome.error.is_some());
	assert_eq!(outcome.stage, httppool::Stage::Resolve);
	assert!(outcome.response.is_none());
}

#[tokio::test]
async fn header_stamping_on_first_attempt() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let (tx_req, rx_req) = oneshot::channel();
	tokio::spawn(async move {
		let (mut sock, _) = listener.accept().await.unwrap();
		let mut buf = Vec::new();
		loop {
			let mut chunk = [0u8; 4096];
			let n = sock.read(&mut chunk).await.unwrap();
			buf.extend_from_slice(&chunk[..n]);
			if buf.windows(4).any(|w| w == b"\r\n\r\n") {
				break;
			}
		}
		let _ = tx_req.send(String::from_utf8_lossy(&buf).to_string());
		let _ = sock
			.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
			.await;
	});

	let pool = test_pool(PoolConfig::default());
	let host = addr.ip().to_string();
	let port = addr.port().to_string();
	let (tx, rx) = oneshot::channel();
	pool.enqueue(&host, &port, None, Request::get("/a", completion(tx)));
	let outcome = rx.await.unwrap();
	assert!(outcome.error.is_none());

	let raw = rx_req.await.unwrap();
	let lower = raw.to_lowercase();
	// Host must be the bare host, not `host:port` — that form is only used
	// for the TLS SNI name, not the HTTP Host header.
	assert!(
		lower.contains(&format!("host: {host}\r\n")),
		"expected bare host {host:?} in Host header, got: {raw:?}"
	);
	assert!(lower.contains("connection: keep-alive"));
	assert!(lower.contains("user-agent:"));
}
