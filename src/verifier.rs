//! Token verification: ES256 signature against the issuer key set, then the wallet key check.

// std
use std::collections::HashSet;
// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, Header, Validation, errors::ErrorKind as JwtErrorKind,
};
use serde::Serialize;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	cache::provider::KeySetProvider,
	claims::WalletClaims,
	config::VerifierConfig,
	key_set::KeySet,
	metrics::{self, Outcome},
};

/// The only signing algorithm tokens may use.
pub const ACCEPTED_ALGORITHM: Algorithm = Algorithm::ES256;

/// Tri-state verification outcome: success, claim mismatch, or error.
pub type VerificationResult = Result<Verification>;

/// A token whose signature has been verified.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedToken {
	/// Claims carried by the token.
	pub payload: Value,
	/// JOSE header the token was signed with.
	pub protected_header: Header,
}

/// Completed verification of a well-formed, validly signed token.
#[derive(Clone, Debug)]
pub enum Verification {
	/// The wallet public key equals the expected key.
	Success(DecodedToken),
	/// The wallet public key differs from the expected key.
	ClaimMismatch(DecodedToken),
}
impl Verification {
	/// Whether the wallet key matched.
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success(_))
	}

	/// Decoded token regardless of outcome.
	pub fn decoded(&self) -> &DecodedToken {
		match self {
			Self::Success(decoded) | Self::ClaimMismatch(decoded) => decoded,
		}
	}

	/// Take ownership of the decoded token.
	pub fn into_decoded(self) -> DecodedToken {
		match self {
			Self::Success(decoded) | Self::ClaimMismatch(decoded) => decoded,
		}
	}
}

/// Verifies identity tokens against the key set served by a [`KeySetProvider`].
#[derive(Clone, Debug)]
pub struct Verifier {
	provider: KeySetProvider,
	validation: Validation,
}
impl Verifier {
	/// Build a verifier that draws keys from `provider`.
	pub fn new(provider: KeySetProvider, config: &VerifierConfig) -> Self {
		Self { provider, validation: build_validation(config) }
	}

	/// Key set provider backing this verifier.
	pub fn provider(&self) -> &KeySetProvider {
		&self.provider
	}

	/// Verify `token` and compare its primary wallet key with `expected_public_key`.
	///
	/// Each stage short-circuits on failure: key set retrieval, signature verification, wallet
	/// claim extraction. The comparison is exact; case and whitespace matter.
	#[tracing::instrument(skip_all)]
	pub async fn verify(&self, token: &str, expected_public_key: &str) -> VerificationResult {
		let result = self.run(token, expected_public_key).await;

		match &result {
			Ok(Verification::Success(_)) => {
				tracing::debug!("wallet public key matched");

				metrics::record_verification(Outcome::Success);
			},
			Ok(Verification::ClaimMismatch(_)) => {
				tracing::info!("wallet public key mismatch");

				metrics::record_verification(Outcome::Mismatch);
			},
			Err(err) => {
				tracing::warn!(error = %err, kind = err.kind().as_str(), "verification failed");

				metrics::record_verification(Outcome::Error(err.kind()));
			},
		}

		result
	}

	/// Verify the token's signature and registered claims against `key_set`.
	pub fn verify_signature(&self, token: &str, key_set: &KeySet) -> Result<DecodedToken> {
		let header = jsonwebtoken::decode_header(token)?;

		if header.alg != ACCEPTED_ALGORITHM {
			return Err(Error::AlgorithmNotAllowed(header.alg));
		}

		let mut last_error = None;

		for jwk in key_set.es256_candidates(header.kid.as_deref()) {
			let key = DecodingKey::from_jwk(jwk)?;

			match jsonwebtoken::decode::<Value>(token, &key, &self.validation) {
				Ok(data) =>
					return Ok(DecodedToken { payload: data.claims, protected_header: data.header }),
				Err(err) if matches!(err.kind(), JwtErrorKind::InvalidSignature) =>
					last_error = Some(err),
				Err(err) => return Err(err.into()),
			}
		}

		Err(last_error.map(Error::from).unwrap_or(Error::KeyNotFound { kid: header.kid }))
	}

	async fn run(&self, token: &str, expected_public_key: &str) -> VerificationResult {
		let key_set = self.provider.get_key_set().await?;
		let decoded = self.verify_signature(token, &key_set)?;
		let claims = WalletClaims::from_payload(&decoded.payload)?;

		if claims.primary_public_key()? == expected_public_key {
			Ok(Verification::Success(decoded))
		} else {
			Ok(Verification::ClaimMismatch(decoded))
		}
	}
}

fn build_validation(config: &VerifierConfig) -> Validation {
	let mut validation = Validation::new(ACCEPTED_ALGORITHM);

	// `exp` and `nbf` are enforced when present but not required.
	validation.required_spec_claims = HashSet::new();
	validation.validate_exp = true;
	validation.validate_nbf = true;
	validation.leeway = config.leeway.as_secs();

	if let Some(issuer) = &config.issuer {
		validation.set_issuer(&[issuer]);
	}
	if config.audiences.is_empty() {
		validation.validate_aud = false;
	} else {
		validation.set_audience(&config.audiences);
	}

	validation
}
