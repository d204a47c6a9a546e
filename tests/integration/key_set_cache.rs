//! Key set caching behaviour against a mocked issuer.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use wallet_jwt_verifier::{
	Error, ErrorKind, KeySetProvider, KeySetState, Result, http::client::build_client,
};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};
// self
use crate::common::*;

#[tokio::test]
async fn caches_key_set_after_initial_fetch() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_jwks(&server, 1).await;

	let provider = provider(&server);
	let first = provider.get_key_set().await?;
	let second = provider.get_key_set().await?;

	assert_eq!(first.len(), 2);
	assert!(Arc::ptr_eq(&first, &second));

	let status = provider.status().await;

	assert_eq!(status.state, KeySetState::Fresh);
	assert_eq!(status.key_count, 2);
	assert_eq!(status.metrics.total_requests, 2);
	assert_eq!(status.metrics.cache_hits, 1);
	assert!(status.last_refresh.is_some());

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn refetches_once_ttl_elapses() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_jwks(&server, 2).await;

	let config = provider_config(&jwks_url(&server)).with_cache_ttl(SHORT_TTL);
	let provider = KeySetProvider::new(config)?;
	let first = provider.get_key_set().await?;

	tokio::time::sleep(SHORT_TTL + Duration::from_millis(100)).await;

	assert_eq!(provider.status().await.state, KeySetState::Expired);

	let second = provider.get_key_set().await?;

	assert!(!Arc::ptr_eq(&first, &second), "expired key set should be replaced");
	assert_eq!(provider.status().await.state, KeySetState::Fresh);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn failed_fetch_is_not_cached_and_next_call_retries() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ResponseTemplate::new(503))
		.up_to_n_times(1)
		.with_priority(1)
		.expect(1)
		.mount(&server)
		.await;
	mount_jwks(&server, 1).await;

	let provider = provider(&server);
	let err = provider.get_key_set().await.expect_err("first fetch fails");

	assert!(matches!(err, Error::HttpStatus { .. }));
	assert_eq!(err.kind(), ErrorKind::Fetch);

	let status = provider.status().await;

	assert_eq!(status.state, KeySetState::Empty);
	assert_eq!(status.error_count, 1);
	assert!(status.last_error_at.is_some());

	let key_set = provider.get_key_set().await?;

	assert_eq!(key_set.len(), 2);

	let status = provider.status().await;

	assert_eq!(status.state, KeySetState::Fresh);
	assert_eq!(status.error_count, 0);
	assert_eq!(status.metrics.fetch_errors, 1);
	assert_eq!(status.metrics.fetch_successes, 1);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn malformed_document_is_a_fetch_error() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string("<html>not a key set</html>"))
		.expect(2)
		.mount(&server)
		.await;

	let provider = provider(&server);

	for _ in 0..2 {
		let err = provider.get_key_set().await.expect_err("malformed document");

		assert!(matches!(err, Error::MalformedKeySet { .. }));
	}

	assert_eq!(provider.status().await.error_count, 2);

	server.verify().await;
}

#[tokio::test]
async fn oversized_document_is_rejected() {
	let server = MockServer::start().await;

	mount_jwks(&server, 1).await;

	let mut config = provider_config(&jwks_url(&server));

	config.max_response_bytes = 64;

	let provider = KeySetProvider::new(config).expect("provider");
	let err = provider.get_key_set().await.expect_err("oversized document");

	assert!(matches!(err, Error::ResponseTooLarge { limit: 64, .. }));
	assert_eq!(provider.status().await.state, KeySetState::Empty);

	server.verify().await;
}

#[tokio::test]
async fn concurrent_misses_share_one_fetch() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(jwks_response().set_delay(Duration::from_millis(200)))
		.expect(1)
		.mount(&server)
		.await;

	let provider = provider(&server);
	let tasks: Vec<_> = (0..8)
		.map(|_| {
			let provider = provider.clone();

			tokio::spawn(async move { provider.get_key_set().await })
		})
		.collect();
	let mut key_sets = Vec::with_capacity(tasks.len());

	for task in tasks {
		key_sets.push(task.await.expect("task")?);
	}

	assert!(key_sets.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));

	let snapshot = provider.metrics().snapshot();

	assert_eq!(snapshot.total_requests, 8);
	assert_eq!(snapshot.fetch_successes, 1);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn concurrent_misses_share_one_failed_fetch() {
	let server = MockServer::start().await;
	let delay = Duration::from_millis(300);

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ResponseTemplate::new(503).set_delay(delay))
		.expect(1)
		.mount(&server)
		.await;

	let provider = provider(&server);
	let started = tokio::time::Instant::now();
	let tasks: Vec<_> = (0..5)
		.map(|_| {
			let provider = provider.clone();

			tokio::spawn(async move { provider.get_key_set().await })
		})
		.collect();

	for task in tasks {
		let err = task.await.expect("task").expect_err("upstream unavailable");

		assert_eq!(err.kind(), ErrorKind::Fetch);
		assert!(err.to_string().contains("503"), "unexpected error: {err}");
	}

	assert!(started.elapsed() < delay * 3, "callers fetched one after another");

	let status = provider.status().await;

	assert_eq!(status.state, KeySetState::Empty);
	assert_eq!(status.error_count, 1);
	assert_eq!(status.metrics.total_requests, 5);
	assert_eq!(status.metrics.fetch_errors, 1);

	server.verify().await;
}

#[tokio::test]
async fn next_request_after_shared_failure_fetches_again() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(200)))
		.up_to_n_times(1)
		.with_priority(1)
		.expect(1)
		.mount(&server)
		.await;
	mount_jwks(&server, 1).await;

	let provider = provider(&server);
	let tasks: Vec<_> = (0..3)
		.map(|_| {
			let provider = provider.clone();

			tokio::spawn(async move { provider.get_key_set().await })
		})
		.collect();

	for task in tasks {
		assert!(task.await.expect("task").is_err());
	}

	assert_eq!(provider.get_key_set().await?.len(), 2);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn failed_refresh_keeps_cached_key_set() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(jwks_response())
		.up_to_n_times(1)
		.with_priority(1)
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path(JWKS_PATH))
		.respond_with(ResponseTemplate::new(503))
		.expect(1)
		.mount(&server)
		.await;

	let provider = provider(&server);
	let first = provider.get_key_set().await?;
	let err = provider.refresh().await.expect_err("refresh fails");

	assert!(matches!(err, Error::HttpStatus { .. }));

	let cached = provider.get_key_set().await?;

	assert!(Arc::ptr_eq(&first, &cached));

	let status = provider.status().await;

	assert_eq!(status.state, KeySetState::Fresh);
	assert_eq!(status.error_count, 1);
	assert_eq!(status.metrics.fetch_successes, 1);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn forced_refresh_replaces_fresh_key_set() -> Result<()> {
	let server = MockServer::start().await;

	mount_jwks(&server, 2).await;

	let provider = provider(&server);
	let first = provider.get_key_set().await?;
	let refreshed = provider.refresh().await?;
	let cached = provider.get_key_set().await?;

	assert!(!Arc::ptr_eq(&first, &refreshed));
	assert!(Arc::ptr_eq(&refreshed, &cached));

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn plain_http_is_refused_when_https_is_required() {
	let server = MockServer::start().await;

	mount_jwks(&server, 0).await;

	let config = provider_config(&jwks_url(&server)).with_require_https(true);

	assert!(matches!(KeySetProvider::new(config.clone()), Err(Error::Security(_))));

	let client = build_client(&config).expect("client");
	let provider = KeySetProvider::with_client(config, client);
	let err = provider.get_key_set().await.expect_err("insecure upstream");

	assert!(matches!(err, Error::Fetch { .. }), "unexpected error: {err}");

	server.verify().await;
}
