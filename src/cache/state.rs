//! Cache slot contents.

// self
use crate::{_prelude::*, key_set::KeySet};

/// A fetched key set together with its freshness bookkeeping.
#[derive(Clone, Debug)]
pub struct CachePayload {
	/// Key set served to verifiers until `expires_at`.
	pub key_set: Arc<KeySet>,
	/// UTC timestamp when the key set was fetched.
	pub fetched_at: DateTime<Utc>,
	/// Monotonic deadline after which the key set must not be served.
	pub expires_at: Instant,
	/// Time-to-live the payload was stored with.
	pub ttl: Duration,
}
impl CachePayload {
	/// Build a payload that stays fresh for `ttl` starting at `now`.
	pub fn new(key_set: Arc<KeySet>, now: Instant, ttl: Duration) -> Self {
		Self { key_set, fetched_at: Utc::now(), expires_at: now + ttl, ttl }
	}

	/// Whether the payload has exceeded its freshness window.
	pub fn is_expired(&self, now: Instant) -> bool {
		now >= self.expires_at
	}

	/// Wall-clock expiry derived from the fetch time and TTL.
	pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
		let ttl = TimeDelta::from_std(self.ttl).ok()?;

		self.fetched_at.checked_add_signed(ttl)
	}
}

/// Cache lifecycle states.
#[derive(Clone, Debug, Default)]
pub enum CacheState {
	/// No key set has been fetched yet.
	#[default]
	Empty,
	/// A key set is stored; it may have expired.
	Ready(CachePayload),
}
impl CacheState {
	/// Retrieve the current payload if available.
	pub fn payload(&self) -> Option<&CachePayload> {
		match self {
			CacheState::Ready(payload) => Some(payload),
			CacheState::Empty => None,
		}
	}
}
