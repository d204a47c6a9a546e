//! Immutable, verifier-consumable view over a fetched JWKS document.

// crates.io
use jsonwebtoken::jwk::{
	AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
};

/// Public keys published by the issuer, as returned by one JWKS fetch.
///
/// A key set is never mutated after construction; the cache swaps in a new `Arc<KeySet>` on
/// every successful refresh.
#[derive(Clone, Debug)]
pub struct KeySet {
	jwks: JwkSet,
}
impl KeySet {
	/// Wrap a parsed JWKS document.
	pub fn new(jwks: JwkSet) -> Self {
		Self { jwks }
	}

	/// Number of keys in the document, usable or not.
	pub fn len(&self) -> usize {
		self.jwks.keys.len()
	}

	/// Whether the document carried no keys at all.
	pub fn is_empty(&self) -> bool {
		self.jwks.keys.is_empty()
	}

	/// Keys able to verify an ES256 token carrying the given `kid` header.
	///
	/// When the token names a key only that key is considered; otherwise every ES256-capable key
	/// is a candidate.
	pub fn es256_candidates<'a>(&'a self, kid: Option<&'a str>) -> impl Iterator<Item = &'a Jwk> {
		self.jwks.keys.iter().filter(move |jwk| {
			let kid_matches = match kid {
				Some(kid) => jwk.common.key_id.as_deref() == Some(kid),
				None => true,
			};

			kid_matches && is_es256_signing_key(jwk)
		})
	}
}
impl From<JwkSet> for KeySet {
	fn from(jwks: JwkSet) -> Self {
		Self::new(jwks)
	}
}

fn is_es256_signing_key(jwk: &Jwk) -> bool {
	let p256 = matches!(
		&jwk.algorithm,
		AlgorithmParameters::EllipticCurve(params) if params.curve == EllipticCurve::P256
	);
	let alg_ok = jwk.common.key_algorithm.is_none_or(|alg| alg == KeyAlgorithm::ES256);
	let use_ok = jwk
		.common
		.public_key_use
		.as_ref()
		.is_none_or(|key_use| *key_use == PublicKeyUse::Signature);

	p256 && alg_ok && use_ok
}
