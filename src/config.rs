//! Service configuration and validation.
//!
//! Every field carries a default matching the reference deployment so an empty JSON object is a
//! valid configuration.

// std
use std::net::{Ipv4Addr, SocketAddr};
// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::_prelude::*;

/// Issuer JWKS endpoint used when no override is configured.
pub const DEFAULT_JWKS_URL: &str = "https://api-auth.web3auth.io/jwks";
/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default key set time-to-live.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
/// Default total timeout for a JWKS fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Default TCP/TLS connect timeout for a JWKS fetch.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default size guard for JWKS documents (1 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 1_048_576;
/// Default size guard for inbound request bodies (64 KiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Top-level configuration for the verification service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
	/// Socket address the HTTP server binds to.
	#[serde(default = "default_listen_addr")]
	pub listen_addr: SocketAddr,
	/// Replace error detail in `500` responses with a fixed message.
	#[serde(default)]
	pub redact_errors: bool,
	/// Maximum accepted request body size in bytes.
	#[serde(default = "default_max_body_bytes")]
	pub max_body_bytes: usize,
	/// Key set retrieval and caching settings.
	#[serde(default)]
	pub provider: ProviderConfig,
	/// Token validation settings.
	#[serde(default)]
	pub verifier: VerifierConfig,
}
impl ServiceConfig {
	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.max_body_bytes == 0 {
			return Err(Error::Validation {
				field: "max_body_bytes",
				reason: "Must be greater than zero.".into(),
			});
		}

		self.provider.validate()?;
		self.verifier.validate()
	}
}
impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			listen_addr: default_listen_addr(),
			redact_errors: false,
			max_body_bytes: DEFAULT_MAX_BODY_BYTES,
			provider: ProviderConfig::default(),
			verifier: VerifierConfig::default(),
		}
	}
}

/// Describes where the key set lives and how long a fetched copy stays valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
	/// URL of the JWKS endpoint to fetch signing keys from.
	#[serde(default = "default_jwks_url")]
	pub jwks_url: Url,
	/// Lifetime of a fetched key set before the next request refetches it.
	#[serde(default = "default_cache_ttl")]
	pub cache_ttl: Duration,
	/// Total timeout applied to each JWKS fetch.
	#[serde(default = "default_fetch_timeout")]
	pub fetch_timeout: Duration,
	/// Connect timeout applied to each JWKS fetch.
	#[serde(default = "default_connect_timeout")]
	pub connect_timeout: Duration,
	/// Maximum size allowed for JWKS payloads in bytes.
	#[serde(default = "default_max_response_bytes")]
	pub max_response_bytes: u64,
	/// Whether HTTPS is required for JWKS retrieval.
	#[serde(default = "default_true")]
	pub require_https: bool,
}
impl ProviderConfig {
	/// Construct a configuration for the given JWKS URL with default cache settings.
	pub fn new(jwks_url: impl AsRef<str>) -> Result<Self> {
		let jwks_url = Url::parse(jwks_url.as_ref())?;

		Ok(Self { jwks_url, ..Self::default() })
	}

	/// Set HTTPS requirement to the desired value.
	pub fn with_require_https(mut self, require_https: bool) -> Self {
		self.require_https = require_https;

		self
	}

	/// Override the key set time-to-live.
	pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;

		self
	}

	/// Validate the provider settings.
	pub fn validate(&self) -> Result<()> {
		if self.require_https && self.jwks_url.scheme() != "https" {
			return Err(Error::Security(format!("Upstream URL {} must use HTTPS.", self.jwks_url)));
		}
		if self.jwks_url.host_str().is_none() {
			return Err(Error::Validation {
				field: "jwks_url",
				reason: "Must include a host component.".into(),
			});
		}
		if self.cache_ttl.is_zero() {
			return Err(Error::Validation {
				field: "cache_ttl",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.fetch_timeout < Duration::from_millis(100) {
			return Err(Error::Validation {
				field: "fetch_timeout",
				reason: "Must be at least 100 ms.".into(),
			});
		}
		if self.connect_timeout.is_zero() || self.connect_timeout > self.fetch_timeout {
			return Err(Error::Validation {
				field: "connect_timeout",
				reason: "Must be non-zero and no longer than fetch_timeout.".into(),
			});
		}
		if self.max_response_bytes == 0 {
			return Err(Error::Validation {
				field: "max_response_bytes",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}
}
impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			jwks_url: default_jwks_url(),
			cache_ttl: DEFAULT_CACHE_TTL,
			fetch_timeout: DEFAULT_FETCH_TIMEOUT,
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
			require_https: true,
		}
	}
}

/// Optional registered-claim checks layered on top of signature verification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VerifierConfig {
	/// Required `iss` value; unchecked when absent.
	#[serde(default)]
	pub issuer: Option<String>,
	/// Accepted `aud` values; unchecked when empty.
	#[serde(default)]
	pub audiences: Vec<String>,
	/// Clock skew tolerated when checking `exp` and `nbf`.
	#[serde(default)]
	pub leeway: Duration,
}
impl VerifierConfig {
	/// Validate the verifier settings.
	pub fn validate(&self) -> Result<()> {
		if self.issuer.as_deref().is_some_and(str::is_empty) {
			return Err(Error::Validation {
				field: "verifier.issuer",
				reason: "Must not be empty when set.".into(),
			});
		}
		if self.audiences.iter().any(String::is_empty) {
			return Err(Error::Validation {
				field: "verifier.audiences",
				reason: "Entries must not be empty.".into(),
			});
		}
		if self.leeway > Duration::from_secs(300) {
			return Err(Error::Validation {
				field: "verifier.leeway",
				reason: "Must be at most 300 seconds.".into(),
			});
		}

		Ok(())
	}
}

fn default_listen_addr() -> SocketAddr {
	SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

fn default_jwks_url() -> Url {
	Url::parse(DEFAULT_JWKS_URL).expect("default JWKS URL must parse")
}

fn default_cache_ttl() -> Duration {
	DEFAULT_CACHE_TTL
}

fn default_fetch_timeout() -> Duration {
	DEFAULT_FETCH_TIMEOUT
}

fn default_connect_timeout() -> Duration {
	DEFAULT_CONNECT_TIMEOUT
}

fn default_max_response_bytes() -> u64 {
	DEFAULT_MAX_RESPONSE_BYTES
}

fn default_max_body_bytes() -> usize {
	DEFAULT_MAX_BODY_BYTES
}

fn default_true() -> bool {
	true
}
