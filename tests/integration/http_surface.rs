//! Request/response contract of the HTTP routes.

// crates.io
use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode, header::{CONTENT_LENGTH, CONTENT_TYPE}},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wallet_jwt_verifier::{AppState, KeySetProvider, router};
use wiremock::MockServer;
// self
use crate::common::*;

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.oneshot(request).await.expect("response");
	let status = response.status();
	let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
	let value = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
			String::from_utf8_lossy(&bytes).into_owned(),
		))
	};

	(status, value)
}

fn verify_request(body: impl Into<Body>) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/verify-jwt")
		.header(CONTENT_TYPE, "application/json")
		.body(body.into())
		.expect("request")
}

fn verify_json(id_token: &str, app_pub_key: &str) -> Request<Body> {
	verify_request(json!({ "idToken": id_token, "app_pub_key": app_pub_key }).to_string())
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("request")
}

async fn app_with_jwks(fetches: u64) -> (MockServer, Router) {
	let _ = tracing_subscriber::fmt::try_init();
	let server = MockServer::start().await;

	mount_jwks(&server, fetches).await;

	let app = router(app_state(provider(&server)), max_body_bytes());

	(server, app)
}

fn unreachable_state() -> AppState {
	app_state(KeySetProvider::new(provider_config("http://127.0.0.1:1/jwks")).expect("provider"))
}

#[tokio::test]
async fn matching_key_returns_200_with_decoded_token() {
	let (server, app) = app_with_jwks(1).await;
	let token = valid_token(&wallet_claims(WALLET_KEY));
	let (status, body) = call(app, verify_json(&token, WALLET_KEY)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["message"], "Verification Successful");
	assert_eq!(body["decodedJWT"]["payload"]["wallets"][0]["public_key"], WALLET_KEY);
	assert_eq!(body["decodedJWT"]["protectedHeader"]["alg"], "ES256");
	assert_eq!(body["decodedJWT"]["protectedHeader"]["kid"], PRIMARY_KID);
	assert!(body.get("error").is_none());

	server.verify().await;
}

#[tokio::test]
async fn mismatched_key_returns_400_with_decoded_token() {
	let (server, app) = app_with_jwks(1).await;
	let token = valid_token(&wallet_claims(WALLET_KEY));
	let (status, body) = call(app, verify_json(&token, "02ffff")).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["message"], "Verification Failed");
	assert_eq!(body["decodedJWT"]["payload"]["sub"], "user-1");
	assert!(body.get("error").is_none());

	server.verify().await;
}

#[tokio::test]
async fn forged_token_returns_500_without_decoded_token() {
	let (server, app) = app_with_jwks(1).await;
	let token = sign(
		&wallet_claims(WALLET_KEY),
		jsonwebtoken::Algorithm::ES256,
		Some(PRIMARY_KID),
		&ec_key(FOREIGN_KEY_PEM),
	);
	let (status, body) = call(app, verify_json(&token, WALLET_KEY)).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["message"], "Internal Server Error");
	assert_eq!(body["error"]["kind"], "signature");
	assert!(body["error"]["message"].as_str().is_some_and(|message| !message.is_empty()));
	assert!(body.get("decodedJWT").is_none());

	server.verify().await;
}

#[tokio::test]
async fn hs256_token_returns_500() {
	let (server, app) = app_with_jwks(1).await;
	let token = sign(
		&wallet_claims(WALLET_KEY),
		jsonwebtoken::Algorithm::HS256,
		Some(PRIMARY_KID),
		&jsonwebtoken::EncodingKey::from_secret(b"shared-secret"),
	);
	let (status, body) = call(app, verify_json(&token, WALLET_KEY)).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["error"]["kind"], "signature");
	assert!(body["error"]["message"].as_str().is_some_and(|message| message.contains("HS256")));

	server.verify().await;
}

#[tokio::test]
async fn unreachable_issuer_returns_500() {
	let app = router(unreachable_state(), max_body_bytes());
	let token = valid_token(&wallet_claims(WALLET_KEY));
	let (status, body) = call(app, verify_json(&token, WALLET_KEY)).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["message"], "Internal Server Error");
	assert_eq!(body["error"]["kind"], "fetch");
	assert!(body["error"]["message"].as_str().is_some_and(|message| message.contains("127.0.0.1")));
}

#[tokio::test]
async fn redaction_hides_error_detail_but_keeps_kind() {
	let app = router(unreachable_state().with_redact_errors(true), max_body_bytes());
	let token = valid_token(&wallet_claims(WALLET_KEY));
	let (status, body) = call(app, verify_json(&token, WALLET_KEY)).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["error"]["kind"], "fetch");
	assert_eq!(body["error"]["message"], "Verification could not be completed.");
}

#[tokio::test]
async fn missing_wallet_claim_returns_500() {
	let (server, app) = app_with_jwks(1).await;
	let token = valid_token(&json!({ "sub": "user-1" }));
	let (status, body) = call(app, verify_json(&token, WALLET_KEY)).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["error"]["kind"], "claim_shape");

	server.verify().await;
}

#[tokio::test]
async fn malformed_bodies_return_500_without_fetching() {
	let (server, app) = app_with_jwks(0).await;
	let bodies = [
		"{".to_owned(),
		json!({ "app_pub_key": WALLET_KEY }).to_string(),
		json!({ "idToken": 42, "app_pub_key": WALLET_KEY }).to_string(),
	];

	for raw in bodies {
		let (status, body) = call(app.clone(), verify_request(raw)).await;

		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["message"], "Internal Server Error");
		assert_eq!(body["error"]["kind"], "request");
	}

	server.verify().await;
}

#[tokio::test]
async fn oversized_body_returns_500_without_fetching() {
	let server = MockServer::start().await;

	mount_jwks(&server, 0).await;

	let app = router(app_state(provider(&server)), 256);
	let raw = json!({ "idToken": "a".repeat(1024), "app_pub_key": WALLET_KEY }).to_string();
	let mut request = verify_request(raw.clone());

	request.headers_mut().insert(CONTENT_LENGTH, raw.len().into());

	let (status, body) = call(app, request).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body["message"], "Internal Server Error");
	assert_eq!(body["error"]["kind"], "request");

	server.verify().await;
}

#[tokio::test]
async fn key_set_is_shared_across_requests() {
	let (server, app) = app_with_jwks(1).await;
	let token = valid_token(&wallet_claims(WALLET_KEY));

	for _ in 0..3 {
		let (status, _) = call(app.clone(), verify_json(&token, WALLET_KEY)).await;

		assert_eq!(status, StatusCode::OK);
	}

	let (status, body) = call(app, get("/jwks/status")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["state"], "Fresh");
	assert_eq!(body["key_count"], 2);
	assert_eq!(body["ttl_secs"], 3600);
	assert_eq!(body["metrics"]["total_requests"], 3);
	assert_eq!(body["metrics"]["cache_hits"], 2);

	server.verify().await;
}

#[tokio::test]
async fn status_reports_empty_slot_before_first_request() {
	let (server, app) = app_with_jwks(0).await;
	let (status, body) = call(app, get("/jwks/status")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["state"], "Empty");
	assert_eq!(body["jwks_url"], jwks_url(&server));
	assert_eq!(body["error_count"], 0);

	server.verify().await;
}

#[tokio::test]
async fn health_check_responds_ok() {
	let (_server, app) = app_with_jwks(0).await;
	let (status, body) = call(app, get("/healthz")).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, Value::String("ok".into()));
}
