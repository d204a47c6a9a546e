//! HTTP client integration for JWKS retrieval.

// crates.io
use http::header::ACCEPT;
use jsonwebtoken::jwk::JwkSet;
use reqwest::{Client, redirect::Policy};
// self
use crate::{_prelude::*, config::ProviderConfig, key_set::KeySet};

/// Outcome of a successful JWKS fetch.
#[derive(Clone, Debug)]
pub struct HttpFetch {
	/// Parsed key set.
	pub key_set: KeySet,
	/// Size of the document in bytes.
	pub size: u64,
	/// Round-trip duration of the exchange.
	pub elapsed: Duration,
}

/// Build the reqwest client used for JWKS fetches.
pub fn build_client(config: &ProviderConfig) -> Result<Client> {
	Client::builder()
		.redirect(Policy::limited(3))
		.https_only(config.require_https)
		.user_agent(format!("wallet-jwt-verifier/{}", env!("CARGO_PKG_VERSION")))
		.connect_timeout(config.connect_timeout)
		.timeout(config.fetch_timeout)
		.build()
		.map_err(|source| Error::Fetch { url: config.jwks_url.clone(), source })
}

/// Fetch and parse the JWKS document described by `config`.
pub async fn fetch_key_set(client: &Client, config: &ProviderConfig) -> Result<HttpFetch> {
	let url = &config.jwks_url;
	let start = Instant::now();
	let response = client
		.get(url.clone())
		.header(ACCEPT, "application/json")
		.send()
		.await
		.map_err(|source| Error::Fetch { url: url.clone(), source })?;
	let status = response.status();

	if !status.is_success() {
		let body = response.text().await.ok();

		return Err(Error::HttpStatus { status, url: url.clone(), body });
	}
	if let Some(length) = response.content_length()
		&& length > config.max_response_bytes
	{
		return Err(Error::ResponseTooLarge {
			url: url.clone(),
			size: length,
			limit: config.max_response_bytes,
		});
	}

	let bytes =
		response.bytes().await.map_err(|source| Error::Fetch { url: url.clone(), source })?;
	let size = bytes.len() as u64;

	if size > config.max_response_bytes {
		return Err(Error::ResponseTooLarge {
			url: url.clone(),
			size,
			limit: config.max_response_bytes,
		});
	}

	let jwks: JwkSet = serde_json::from_slice(&bytes)
		.map_err(|source| Error::MalformedKeySet { url: url.clone(), source })?;
	let elapsed = start.elapsed();

	tracing::debug!(
		url = %url,
		status = %status,
		keys = jwks.keys.len(),
		elapsed = ?elapsed,
		"jwks fetch complete"
	);

	Ok(HttpFetch { key_set: KeySet::new(jwks), size, elapsed })
}
