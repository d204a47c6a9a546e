//! Wallet-bound identity token verification backed by a TTL-cached issuer JWKS.
//!
//! Tokens must be ES256-signed by a key from the issuer's key set, and the first wallet in their
//! `wallets` claim must carry exactly the public key the caller expects.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod claims;
pub mod cli;
pub mod config;
pub mod http;
pub mod key_set;
pub mod metrics;
pub mod verifier;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	cache::provider::{KeySetProvider, KeySetState, KeySetStatus},
	config::{ProviderConfig, ServiceConfig, VerifierConfig},
	error::{Error, ErrorKind, Result},
	http::server::{AppState, router, serve},
	key_set::KeySet,
	verifier::{DecodedToken, Verification, VerificationResult, Verifier},
};
