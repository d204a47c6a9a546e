//! Inbound HTTP surface: `POST /verify-jwt` plus health, status, and metrics routes.

// std
use std::future::Future;
// crates.io
use axum::{
	Json, Router,
	extract::{DefaultBodyLimit, State, rejection::JsonRejection},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
// self
use crate::{
	_prelude::*,
	cache::provider::{KeySetProvider, KeySetStatus},
	config::ServiceConfig,
	error::ErrorKind,
	verifier::{DecodedToken, Verification, Verifier},
};

const MESSAGE_SUCCESS: &str = "Verification Successful";
const MESSAGE_MISMATCH: &str = "Verification Failed";
const MESSAGE_ERROR: &str = "Internal Server Error";
const REDACTED_DETAIL: &str = "Verification could not be completed.";

/// Shared state for handlers.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Verifier shared by every request.
	pub verifier: Arc<Verifier>,
	/// Replace error detail in `500` bodies with a fixed message.
	pub redact_errors: bool,
}
impl AppState {
	/// Wrap a verifier, exposing error detail to callers.
	pub fn new(verifier: Verifier) -> Self {
		Self { verifier: Arc::new(verifier), redact_errors: false }
	}

	/// Set the error redaction policy.
	pub fn with_redact_errors(mut self, redact_errors: bool) -> Self {
		self.redact_errors = redact_errors;

		self
	}
}

/// Body accepted by `POST /verify-jwt`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
	/// Compact-serialised identity token.
	#[serde(rename = "idToken")]
	pub id_token: String,
	/// Public key the token's primary wallet must carry.
	pub app_pub_key: String,
}

/// Body returned by `POST /verify-jwt`.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyResponse {
	/// Human-readable outcome.
	pub message: &'static str,
	/// Decoded token, present for `200` and `400`.
	#[serde(rename = "decodedJWT", skip_serializing_if = "Option::is_none")]
	pub decoded_jwt: Option<DecodedToken>,
	/// Failure detail, present for `500`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorBody>,
}

/// Failure detail embedded in `500` responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Coarse failure class.
	pub kind: ErrorKind,
	/// Failure description, or a fixed string when redaction is enabled.
	pub message: String,
}

/// Build the service router around `state`.
///
/// Bodies larger than `max_body_bytes` fail extraction and are answered like any other
/// unreadable request.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
	let router = Router::new()
		.route("/verify-jwt", post(verify_jwt))
		.route("/jwks/status", get(key_set_status))
		.route("/healthz", get(|| async { "ok" }));
	#[cfg(feature = "prometheus")]
	let router = router.route("/metrics", get(render_metrics));

	router
		.layer(DefaultBodyLimit::max(max_body_bytes))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Bind `config.listen_addr` and serve until `shutdown` resolves.
pub async fn serve<F>(config: ServiceConfig, shutdown: F) -> Result<()>
where
	F: Future<Output = ()> + Send + 'static,
{
	config.validate()?;

	let provider = KeySetProvider::new(config.provider.clone())?;
	let verifier = Verifier::new(provider, &config.verifier);
	let state = AppState::new(verifier).with_redact_errors(config.redact_errors);
	let app = router(state, config.max_body_bytes);
	let listener = TcpListener::bind(config.listen_addr).await?;

	tracing::info!(
		addr = %listener.local_addr()?,
		jwks_url = %config.provider.jwks_url,
		cache_ttl = ?config.provider.cache_ttl,
		"verification server listening"
	);

	axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

	tracing::info!("verification server stopped");

	Ok(())
}

async fn verify_jwt(
	State(state): State<AppState>,
	payload: std::result::Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
	let outcome = match payload {
		Ok(Json(request)) => state.verifier.verify(&request.id_token, &request.app_pub_key).await,
		Err(rejection) => {
			tracing::warn!(error = %rejection, "rejected verification request body");

			Err(Error::Request(rejection.body_text()))
		},
	};

	match outcome {
		Ok(verification) => {
			let (status, message) = match &verification {
				Verification::Success(_) => (StatusCode::OK, MESSAGE_SUCCESS),
				Verification::ClaimMismatch(_) => (StatusCode::BAD_REQUEST, MESSAGE_MISMATCH),
			};
			let body = VerifyResponse {
				message,
				decoded_jwt: Some(verification.into_decoded()),
				error: None,
			};

			(status, Json(body)).into_response()
		},
		Err(err) => {
			let message = if state.redact_errors { REDACTED_DETAIL.into() } else { err.to_string() };
			let body = VerifyResponse {
				message: MESSAGE_ERROR,
				decoded_jwt: None,
				error: Some(ErrorBody { kind: err.kind(), message }),
			};

			(StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
		},
	}
}

async fn key_set_status(State(state): State<AppState>) -> Json<KeySetStatus> {
	Json(state.verifier.provider().status().await)
}

#[cfg(feature = "prometheus")]
async fn render_metrics() -> Response {
	match crate::metrics::prometheus_handle() {
		Some(handle) => handle.render().into_response(),
		None => (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response(),
	}
}
