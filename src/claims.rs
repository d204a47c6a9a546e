//! Wallet claims embedded in issuer tokens.

// crates.io
use serde::Deserialize;
use serde_json::Value;
// self
use crate::_prelude::*;

/// The subset of token claims describing the holder's wallets.
#[derive(Clone, Debug, Deserialize)]
pub struct WalletClaims {
	/// Wallets bound to the identity, primary first.
	pub wallets: Vec<Wallet>,
}
impl WalletClaims {
	/// Read the wallet claims out of a verified token payload.
	pub fn from_payload(payload: &Value) -> Result<Self> {
		Self::deserialize(payload).map_err(|err| Error::ClaimShape { reason: err.to_string() })
	}

	/// Public key of the first wallet; an empty list is a shape error.
	pub fn primary_public_key(&self) -> Result<&str> {
		self.wallets
			.first()
			.map(|wallet| wallet.public_key.as_str())
			.ok_or_else(|| Error::ClaimShape { reason: "`wallets` is empty.".into() })
	}
}

/// One wallet entry.
#[derive(Clone, Debug, Deserialize)]
pub struct Wallet {
	/// Public key compared verbatim against the caller-supplied key.
	pub public_key: String,
	/// Wallet type, e.g. `web3auth_app_key`.
	#[serde(default, rename = "type")]
	pub kind: Option<String>,
	/// Curve the key lives on, e.g. `secp256k1`.
	#[serde(default)]
	pub curve: Option<String>,
}
