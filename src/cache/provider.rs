//! Key set provider: serves the cached JWKS or fetches a fresh copy.

// crates.io
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::{
		entry::CacheEntry,
		state::{CachePayload, CacheState},
	},
	config::ProviderConfig,
	http::client::{self, fetch_key_set},
	key_set::KeySet,
	metrics::{self, ProviderMetrics, ProviderMetricsSnapshot},
};

/// Owns the single key set cache slot for one issuer.
///
/// Cloning is cheap and every clone shares the same slot, so one provider built at startup can
/// be handed to each request handler.
#[derive(Clone, Debug)]
pub struct KeySetProvider {
	config: Arc<ProviderConfig>,
	client: Arc<Client>,
	entry: Arc<RwLock<CacheEntry>>,
	single_flight: Arc<Mutex<()>>,
	metrics: Arc<ProviderMetrics>,
	source: Arc<str>,
}
impl KeySetProvider {
	/// Build a new provider with the default reqwest client.
	pub fn new(config: ProviderConfig) -> Result<Self> {
		config.validate()?;

		let client = client::build_client(&config)?;

		Ok(Self::with_client(config, client))
	}

	/// Build a provider using the supplied HTTP client (primarily for tests).
	pub fn with_client(config: ProviderConfig, client: Client) -> Self {
		let source: Arc<str> = Arc::from(config.jwks_url.host_str().unwrap_or("unknown"));

		Self {
			config: Arc::new(config),
			client: Arc::new(client),
			entry: Arc::new(RwLock::new(CacheEntry::new())),
			single_flight: Arc::new(Mutex::new(())),
			metrics: ProviderMetrics::new(),
			source,
		}
	}

	/// Provider configuration.
	pub fn config(&self) -> &ProviderConfig {
		&self.config
	}

	/// Access the provider metrics accumulator.
	pub fn metrics(&self) -> Arc<ProviderMetrics> {
		self.metrics.clone()
	}

	/// Return the cached key set while it is fresh, otherwise fetch and cache a new one.
	///
	/// Concurrent misses wait on one fetch instead of each going upstream, and share its outcome:
	/// callers queued behind a failed attempt return that failure rather than fetching again. A
	/// failed fetch leaves the slot as it was, so the next request simply tries again.
	#[tracing::instrument(skip(self), fields(jwks_url = %self.config.jwks_url))]
	pub async fn get_key_set(&self) -> Result<Arc<KeySet>> {
		let observed = match self.lookup().await {
			Ok(key_set) => {
				tracing::debug!("serving cached key set");

				self.observe_hit();

				return Ok(key_set);
			},
			Err(attempts) => attempts,
		};
		let _guard = self.single_flight.lock().await;

		{
			let entry = self.entry.read().await;

			// Whoever held the guard before us may have just stored a fresh key set.
			if let Some(key_set) = entry.fresh(Instant::now()) {
				tracing::debug!("key set refreshed by a concurrent caller");

				self.observe_hit();

				return Ok(key_set);
			}
			if entry.attempts() != observed
				&& let Some(reason) = entry.last_failure()
			{
				tracing::debug!(error = %reason, "concurrent key set fetch failed");

				self.observe_miss();

				return Err(Error::SharedFetch {
					url: self.config.jwks_url.clone(),
					reason: reason.clone(),
				});
			}
		}

		tracing::debug!("cache empty or expired; fetching key set");

		self.observe_miss();
		self.fetch_and_store().await
	}

	/// Fetch a new key set regardless of the cached copy's freshness.
	///
	/// On failure the cached copy, if any, stays in place until its own expiry.
	#[tracing::instrument(skip(self), fields(jwks_url = %self.config.jwks_url))]
	pub async fn refresh(&self) -> Result<Arc<KeySet>> {
		let _guard = self.single_flight.lock().await;

		self.fetch_and_store().await
	}

	/// Project the cache slot and counters into a status report.
	pub async fn status(&self) -> KeySetStatus {
		let now = Instant::now();
		let entry = { self.entry.read().await.clone() };
		let metrics = self.metrics.snapshot();
		let (state, key_count, last_refresh, expires_at) = match entry.state() {
			CacheState::Empty => (KeySetState::Empty, 0, None, None),
			CacheState::Ready(payload) => {
				let state =
					if payload.is_expired(now) { KeySetState::Expired } else { KeySetState::Fresh };

				(state, payload.key_set.len(), Some(payload.fetched_at), payload.expires_at_utc())
			},
		};

		KeySetStatus {
			jwks_url: self.config.jwks_url.clone(),
			state,
			key_count,
			last_refresh,
			expires_at,
			ttl_secs: self.config.cache_ttl.as_secs(),
			error_count: entry.consecutive_failures(),
			last_error_at: entry.last_failure_at(),
			hit_rate: metrics.hit_rate(),
			metrics,
		}
	}

	/// Fresh key set, or the attempt count observed while the slot was not fresh.
	async fn lookup(&self) -> std::result::Result<Arc<KeySet>, u64> {
		let entry = self.entry.read().await;

		entry.fresh(Instant::now()).ok_or(entry.attempts())
	}

	async fn fetch_and_store(&self) -> Result<Arc<KeySet>> {
		match fetch_key_set(&self.client, &self.config).await {
			Ok(fetch) => {
				let key_set = Arc::new(fetch.key_set);
				let payload =
					CachePayload::new(key_set.clone(), Instant::now(), self.config.cache_ttl);

				{
					let mut entry = self.entry.write().await;

					entry.replace(payload);
				}

				self.observe_fetch_success(fetch.elapsed);

				tracing::info!(
					keys = key_set.len(),
					bytes = fetch.size,
					ttl = ?self.config.cache_ttl,
					"key set cached"
				);

				Ok(key_set)
			},
			Err(err) => {
				{
					let mut entry = self.entry.write().await;

					entry.record_failure(err.to_string());
				}

				self.observe_fetch_error();

				tracing::warn!(error = %err, "key set fetch failed");

				Err(err)
			},
		}
	}

	fn observe_hit(&self) {
		metrics::record_key_set_hit(&self.source);

		self.metrics.record_hit();
	}

	fn observe_miss(&self) {
		metrics::record_key_set_miss(&self.source);

		self.metrics.record_miss();
	}

	fn observe_fetch_success(&self, duration: Duration) {
		metrics::record_fetch_success(&self.source, duration);

		self.metrics.record_fetch_success(duration);
	}

	fn observe_fetch_error(&self) {
		metrics::record_fetch_error(&self.source);

		self.metrics.record_fetch_error();
	}
}

/// Public representation of the cache slot.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum KeySetState {
	/// No key set has been fetched yet.
	Empty,
	/// A key set is cached and within its TTL.
	Fresh,
	/// The cached key set is past its TTL; the next lookup refetches it.
	Expired,
}

/// Status projection for the key set provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeySetStatus {
	/// JWKS endpoint the provider fetches from.
	pub jwks_url: Url,
	/// Lifecycle state of the cache slot.
	pub state: KeySetState,
	/// Number of keys in the cached document.
	pub key_count: usize,
	/// Timestamp of the most recent successful fetch.
	pub last_refresh: Option<DateTime<Utc>>,
	/// Expiration timestamp for the cached key set.
	pub expires_at: Option<DateTime<Utc>>,
	/// Configured time-to-live in seconds.
	pub ttl_secs: u64,
	/// Consecutive fetch failures since the last success.
	pub error_count: u32,
	/// Timestamp of the most recent failed fetch.
	pub last_error_at: Option<DateTime<Utc>>,
	/// Ratio of cache hits to total lookups.
	pub hit_rate: f64,
	/// Raw provider counters.
	pub metrics: ProviderMetricsSnapshot,
}
