//! Command-line and environment configuration for the server binary.

// std
use std::{fs, net::SocketAddr, path::PathBuf};
// crates.io
use clap::{ArgAction, Parser};
use tracing_subscriber::{EnvFilter, filter::ParseError};
use url::Url;
// self
use crate::{_prelude::*, config::ServiceConfig};

/// Verify wallet-bound identity tokens against an issuer JWKS.
#[derive(Clone, Debug, Parser)]
#[command(name = "wallet-jwt-verifier", version, about)]
pub struct Cli {
	/// JSON configuration file; flags and environment variables override its values.
	#[arg(long, env = "VERIFIER_CONFIG")]
	pub config: Option<PathBuf>,
	/// Socket address to listen on.
	#[arg(long, env = "VERIFIER_LISTEN_ADDR")]
	pub listen_addr: Option<SocketAddr>,
	/// Port to listen on, keeping the configured bind address.
	#[arg(long, env = "VERIFIER_PORT", conflicts_with = "listen_addr")]
	pub port: Option<u16>,
	/// JWKS endpoint of the token issuer.
	#[arg(long, env = "VERIFIER_JWKS_URL")]
	pub jwks_url: Option<Url>,
	/// Seconds a fetched key set stays cached.
	#[arg(long, env = "VERIFIER_CACHE_TTL_SECS")]
	pub cache_ttl_secs: Option<u64>,
	/// Seconds allowed for one JWKS fetch.
	#[arg(long, env = "VERIFIER_FETCH_TIMEOUT_SECS")]
	pub fetch_timeout_secs: Option<u64>,
	/// Required token issuer (`iss`).
	#[arg(long, env = "VERIFIER_ISSUER")]
	pub issuer: Option<String>,
	/// Accepted token audience (`aud`); repeat or comma-separate for several.
	#[arg(long = "audience", env = "VERIFIER_AUDIENCES", value_delimiter = ',')]
	pub audiences: Vec<String>,
	/// Hide error detail from `500` responses.
	#[arg(long, env = "VERIFIER_REDACT_ERRORS", action = ArgAction::SetTrue)]
	pub redact_errors: bool,
	/// Allow fetching the JWKS over plain HTTP.
	#[arg(long, env = "VERIFIER_ALLOW_INSECURE_JWKS", action = ArgAction::SetTrue)]
	pub allow_insecure_jwks: bool,
	/// Tracing filter directives.
	#[arg(long, env = "RUST_LOG", default_value = "info")]
	pub log_filter: String,
}
impl Cli {
	/// Install the global tracing subscriber.
	///
	/// Invalid filter directives fall back to `info` and are reported once the subscriber is up.
	pub fn init_tracing(&self) {
		let (filter, invalid) = resolve_filter(&self.log_filter);
		let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

		if let Some(err) = invalid {
			tracing::warn!(
				filter = %self.log_filter,
				error = %err,
				"invalid log filter; falling back to `info`"
			);
		}
	}

	/// Resolve the effective configuration: file (or defaults), then overrides, then validation.
	pub fn load_config(&self) -> Result<ServiceConfig> {
		let mut config = match &self.config {
			Some(path) => {
				let raw = fs::read_to_string(path)?;

				serde_json::from_str(&raw).map_err(|err| Error::Validation {
					field: "config",
					reason: format!("Failed to parse {}: {err}.", path.display()),
				})?
			},
			None => ServiceConfig::default(),
		};

		self.apply(&mut config);
		config.validate()?;

		Ok(config)
	}

	fn apply(&self, config: &mut ServiceConfig) {
		if let Some(addr) = self.listen_addr {
			config.listen_addr = addr;
		}
		if let Some(port) = self.port {
			config.listen_addr.set_port(port);
		}
		if let Some(url) = &self.jwks_url {
			config.provider.jwks_url = url.clone();
		}
		if let Some(secs) = self.cache_ttl_secs {
			config.provider.cache_ttl = Duration::from_secs(secs);
		}
		if let Some(secs) = self.fetch_timeout_secs {
			config.provider.fetch_timeout = Duration::from_secs(secs);
		}
		if let Some(issuer) = &self.issuer {
			config.verifier.issuer = Some(issuer.clone());
		}
		if !self.audiences.is_empty() {
			config.verifier.audiences = self.audiences.clone();
		}
		if self.redact_errors {
			config.redact_errors = true;
		}
		if self.allow_insecure_jwks {
			config.provider.require_https = false;
		}
	}
}

fn resolve_filter(directives: &str) -> (EnvFilter, Option<ParseError>) {
	match EnvFilter::try_new(directives) {
		Ok(filter) => (filter, None),
		Err(err) => (EnvFilter::new("info"), Some(err)),
	}
}
