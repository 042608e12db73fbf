//! Additive Prometheus instrumentation alongside the pool's own
//! `ClientStats`/`PoolStats` structures.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
pub struct DestinationLabels {
	pub destination: String,
}

pub struct PoolMetrics {
	pub connect_duration: Family<DestinationLabels, Histogram>,
	pub retries: Family<DestinationLabels, Counter>,
	pub requests_in_flight: Gauge,
}

impl PoolMetrics {
	pub fn new(registry: &mut Registry) -> Self {
		let connect_duration = Family::<DestinationLabels, Histogram>::new_with_constructor(|| {
			Histogram::new(prometheus_client::metrics::histogram::exponential_buckets(0.001, 2.0, 12))
		});
		let retries = Family::<DestinationLabels, Counter>::default();
		let requests_in_flight = Gauge::default();

		registry.register(
			"httppool_connect_duration_seconds",
			"Time to establish an upstream connection",
			connect_duration.clone(),
		);
		registry.register("httppool_retries_total", "Silent write/read retries issued", retries.clone());
		registry.register(
			"httppool_requests_in_flight",
			"Requests currently dispatched to an HttpClient",
			requests_in_flight.clone(),
		);

		PoolMetrics {
			connect_duration,
			retries,
			requests_in_flight,
		}
	}
}
