//! Verification server entry point.

// std
use std::process::ExitCode;
// crates.io
use clap::Parser;
// self
use wallet_jwt_verifier::{Result, cli::Cli};

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	cli.init_tracing();

	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			tracing::error!(error = %err, "verification server failed");

			ExitCode::FAILURE
		},
	}
}

async fn run(cli: Cli) -> Result<()> {
	let config = cli.load_config()?;

	#[cfg(feature = "prometheus")]
	wallet_jwt_verifier::install_default_exporter()?;

	wallet_jwt_verifier::serve(config, shutdown_signal()).await
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::warn!(error = %err, "failed to listen for shutdown signal");

		std::future::pending::<()>().await;
	}

	tracing::info!("shutdown signal received");
}
