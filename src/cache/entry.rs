//! The single cache slot and its transition helpers.

// self
use crate::{
	_prelude::*,
	cache::state::{CachePayload, CacheState},
	key_set::KeySet,
};

/// Holds the one cached key set plus refresh failure bookkeeping.
///
/// Payloads are only ever replaced wholesale; failures never touch the stored payload.
#[derive(Clone, Debug, Default)]
pub struct CacheEntry {
	state: CacheState,
	attempts: u64,
	consecutive_failures: u32,
	last_failure_at: Option<DateTime<Utc>>,
	last_failure: Option<Arc<str>>,
}
impl CacheEntry {
	/// Create a new empty cache entry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inspect the current cache state.
	pub fn state(&self) -> &CacheState {
		&self.state
	}

	/// Key set that is still fresh at `now`, if any.
	pub fn fresh(&self, now: Instant) -> Option<Arc<KeySet>> {
		self.state
			.payload()
			.filter(|payload| !payload.is_expired(now))
			.map(|payload| payload.key_set.clone())
	}

	/// Store a freshly fetched payload, replacing whatever was there.
	pub fn replace(&mut self, payload: CachePayload) {
		self.state = CacheState::Ready(payload);
		self.attempts = self.attempts.wrapping_add(1);
		self.consecutive_failures = 0;
		self.last_failure_at = None;
		self.last_failure = None;
	}

	/// Record a failed fetch without disturbing the stored payload.
	pub fn record_failure(&mut self, reason: impl Into<Arc<str>>) {
		self.attempts = self.attempts.wrapping_add(1);
		self.consecutive_failures = self.consecutive_failures.saturating_add(1);
		self.last_failure_at = Some(Utc::now());
		self.last_failure = Some(reason.into());
	}

	/// Number of completed fetch attempts, successful or not.
	pub fn attempts(&self) -> u64 {
		self.attempts
	}

	/// Description of the most recent failure, cleared by the next success.
	pub fn last_failure(&self) -> Option<&Arc<str>> {
		self.last_failure.as_ref()
	}

	/// Count of fetch failures since the last success.
	pub fn consecutive_failures(&self) -> u32 {
		self.consecutive_failures
	}

	/// When the most recent fetch failure happened.
	pub fn last_failure_at(&self) -> Option<DateTime<Utc>> {
		self.last_failure_at
	}
}
