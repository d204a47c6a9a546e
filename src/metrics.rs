//! Metrics helpers and key set telemetry bookkeeping.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
// self
use crate::{_prelude::*, error::ErrorKind};

type LabelSet = SmallVec<[Label; 4]>;

const METRIC_REQUESTS_TOTAL: &str = "jwks_cache_requests_total";
const METRIC_HITS_TOTAL: &str = "jwks_cache_hits_total";
const METRIC_MISSES_TOTAL: &str = "jwks_cache_misses_total";
const METRIC_FETCH_TOTAL: &str = "jwks_fetch_total";
const METRIC_FETCH_DURATION: &str = "jwks_fetch_duration_seconds";
const METRIC_FETCH_ERRORS: &str = "jwks_fetch_errors_total";
const METRIC_VERIFICATIONS_TOTAL: &str = "jwt_verifications_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe metrics accumulator for the key set provider.
#[derive(Debug, Default)]
pub struct ProviderMetrics {
	total_requests: AtomicU64,
	cache_hits: AtomicU64,
	fetch_successes: AtomicU64,
	fetch_errors: AtomicU64,
	last_fetch_micros: AtomicU64,
}
impl ProviderMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a lookup served from the cache.
	pub fn record_hit(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a lookup that had to go upstream.
	pub fn record_miss(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a successful fetch and its latency.
	pub fn record_fetch_success(&self, duration: Duration) {
		self.fetch_successes.fetch_add(1, Ordering::Relaxed);
		self.last_fetch_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Record a failed fetch.
	pub fn record_fetch_error(&self) {
		self.fetch_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> ProviderMetricsSnapshot {
		ProviderMetricsSnapshot {
			total_requests: self.total_requests.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
			fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
			last_fetch_micros: match self.last_fetch_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of provider telemetry counters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderMetricsSnapshot {
	/// Total number of key set lookups observed.
	pub total_requests: u64,
	/// Count of lookups served from the cache.
	pub cache_hits: u64,
	/// Count of successful upstream fetches.
	pub fetch_successes: u64,
	/// Count of upstream fetches that failed.
	pub fetch_errors: u64,
	/// Microsecond latency of the most recent successful fetch.
	pub last_fetch_micros: Option<u64>,
}
impl ProviderMetricsSnapshot {
	/// Convenience method to compute the cache hit rate.
	pub fn hit_rate(&self) -> f64 {
		if self.total_requests == 0 {
			0.0
		} else {
			self.cache_hits as f64 / self.total_requests as f64
		}
	}
}

/// Verification outcome label values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
	/// Wallet key matched.
	Success,
	/// Token verified but the wallet key differed.
	Mismatch,
	/// Verification could not complete.
	Error(ErrorKind),
}
impl Outcome {
	fn as_str(self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::Mismatch => "mismatch",
			Self::Error(_) => "error",
		}
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a key set lookup served from the cache.
pub fn record_key_set_hit(source: &str) {
	let labels = base_labels(source);

	metrics::counter!(METRIC_REQUESTS_TOTAL, labels.iter()).increment(1);
	metrics::counter!(METRIC_HITS_TOTAL, labels.iter()).increment(1);
}

/// Record a key set lookup that required an upstream fetch.
pub fn record_key_set_miss(source: &str) {
	let labels = base_labels(source);

	metrics::counter!(METRIC_REQUESTS_TOTAL, labels.iter()).increment(1);
	metrics::counter!(METRIC_MISSES_TOTAL, labels.iter()).increment(1);
}

/// Record a successful fetch along with its latency.
pub fn record_fetch_success(source: &str, duration: Duration) {
	metrics::counter!(METRIC_FETCH_TOTAL, status_labels(source, "success").iter()).increment(1);
	metrics::histogram!(METRIC_FETCH_DURATION, base_labels(source).iter())
		.record(duration.as_secs_f64());
}

/// Record a failed fetch.
pub fn record_fetch_error(source: &str) {
	metrics::counter!(METRIC_FETCH_TOTAL, status_labels(source, "error").iter()).increment(1);
	metrics::counter!(METRIC_FETCH_ERRORS, base_labels(source).iter()).increment(1);
}

/// Record the outcome of one verification request.
pub fn record_verification(outcome: Outcome) {
	let mut labels = LabelSet::new();

	labels.push(Label::new("outcome", outcome.as_str()));

	if let Outcome::Error(kind) = outcome {
		labels.push(Label::new("kind", kind.as_str()));
	}

	metrics::counter!(METRIC_VERIFICATIONS_TOTAL, labels.iter()).increment(1);
}

fn base_labels(source: &str) -> LabelSet {
	let mut labels = LabelSet::with_capacity(1);

	labels.push(Label::new("source", source.to_owned()));

	labels
}

fn status_labels(source: &str, status: &'static str) -> LabelSet {
	let mut labels = base_labels(source);

	labels.push(Label::new("status", status));

	labels
}
