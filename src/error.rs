//! Crate-wide error types and `Result` alias.

// crates.io
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use url::Url;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the verifier crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Failed to fetch JWKS from {url}: {source}")]
	Fetch {
		url: Url,
		#[source]
		source: reqwest::Error,
	},
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: http::StatusCode, url: Url, body: Option<String> },
	#[error("Malformed JWKS document from {url}: {source}")]
	MalformedKeySet {
		url: Url,
		#[source]
		source: serde_json::Error,
	},
	#[error("JWKS response from {url} is {size} bytes, exceeding the {limit} byte guard.")]
	ResponseTooLarge { url: Url, size: u64, limit: u64 },
	#[error("Concurrent JWKS fetch from {url} failed: {reason}")]
	SharedFetch { url: Url, reason: std::sync::Arc<str> },

	#[error("Token rejected: {0}")]
	Token(#[from] jsonwebtoken::errors::Error),
	#[error("Token algorithm {0:?} is not accepted; only ES256 is allowed.")]
	AlgorithmNotAllowed(Algorithm),
	#[error("No ES256 signing key in the key set matches kid {kid:?}.")]
	KeyNotFound { kid: Option<String> },

	#[error("Token claims lack `wallets[0].public_key`: {reason}")]
	ClaimShape { reason: String },

	#[error("Invalid request body: {0}")]
	Request(String),

	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Security violation: {0}")]
	Security(String),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Classify the error into the coarse taxonomy reported to HTTP callers.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Fetch { .. }
			| Self::HttpStatus { .. }
			| Self::MalformedKeySet { .. }
			| Self::ResponseTooLarge { .. }
			| Self::SharedFetch { .. } => ErrorKind::Fetch,
			Self::Token(_) | Self::AlgorithmNotAllowed(_) | Self::KeyNotFound { .. } =>
				ErrorKind::Signature,
			Self::ClaimShape { .. } => ErrorKind::ClaimShape,
			Self::Request(_) => ErrorKind::Request,
			Self::Io(_)
			| Self::Url(_)
			| Self::Metrics(_)
			| Self::Security(_)
			| Self::Validation { .. } => ErrorKind::Internal,
		}
	}
}

/// Coarse error classes surfaced in `500` response bodies and metric labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// JWKS could not be retrieved or parsed.
	Fetch,
	/// Token is malformed, unsigned by a known key, expired, or uses another algorithm.
	Signature,
	/// Token verified but lacks the wallet public-key claim.
	ClaimShape,
	/// Request body could not be parsed.
	Request,
	/// Configuration, I/O, or other local failure.
	Internal,
}
impl ErrorKind {
	/// Stable label used for metrics.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fetch => "fetch",
			Self::Signature => "signature",
			Self::ClaimShape => "claim_shape",
			Self::Request => "request",
			Self::Internal => "internal",
		}
	}
}
