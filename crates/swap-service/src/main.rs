use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use swap_config::ConfigLoader;
use swap_core::SwapEngineBuilder;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "fastswap")]
#[command(about = "Swap quoting and settlement engine", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[arg(short, long, value_name = "FILE", env = "FASTSWAP_CONFIG", default_value = "config/example.toml")]
	config: PathBuf,

	/// Used when RUST_LOG is not set
	#[arg(long, env = "FASTSWAP_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Stream auto-refreshing quotes for a pair until interrupted
	Quote {
		/// Input token symbol or address
		from: String,
		/// Output token symbol or address
		to: String,
		/// Human-readable input amount
		amount: String,
	},
	/// Quote, sign and settle a swap
	Swap {
		from: String,
		to: String,
		amount: String,
		/// Slippage tolerance in percent; the configured default when omitted
		#[arg(long, conflicts_with = "auto_slippage")]
		slippage: Option<String>,
		/// Derive slippage from trade size and gas price
		#[arg(long)]
		auto_slippage: bool,
		/// Intent deadline in minutes
		#[arg(long)]
		deadline: Option<u32>,
		/// Return after submission instead of waiting for the receipt
		#[arg(long)]
		no_wait: bool,
		/// Save the signed intent to this file for a later `cancel`
		#[arg(long, value_name = "FILE")]
		intent_out: Option<PathBuf>,
	},
	/// Cancel an unsettled intent read from a JSON file
	Cancel {
		#[arg(value_name = "INTENT_JSON")]
		intent: PathBuf,
	},
	/// Claim a refund held by the settlement contract
	Refund {
		/// Token symbol or address
		token: String,
	},
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	info!("Loading configuration from: {:?}", cli.config);
	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	let shutdown = CancellationToken::new();
	{
		let shutdown = shutdown.clone();
		tokio::spawn(async move {
			setup_shutdown_signal().await;
			info!("Shutdown signal received");
			shutdown.cancel();
		});
	}

	if let Commands::Validate = cli.command {
		return commands::validate(config);
	}

	let engine = SwapEngineBuilder::new(config)
		.with_shutdown(shutdown.clone())
		.build()
		.context("Failed to build swap engine")?;

	match cli.command {
		Commands::Quote { from, to, amount } => {
			commands::quote(&engine, &from, &to, &amount, shutdown).await
		}
		Commands::Swap {
			from,
			to,
			amount,
			slippage,
			auto_slippage,
			deadline,
			no_wait,
			intent_out,
		} => {
			let args = commands::SwapArgs {
				from,
				to,
				amount,
				slippage,
				auto_slippage,
				deadline_minutes: deadline,
				wait: !no_wait,
				intent_out,
			};
			commands::swap(&engine, args).await
		}
		Commands::Cancel { intent } => commands::cancel(&engine, &intent).await,
		Commands::Refund { token } => commands::refund(&engine, &token).await,
		Commands::Validate => Ok(()),
	}
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
		.context("Invalid log level")?;

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			warn!(error = %e, "Failed to install Ctrl+C handler");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				warn!(error = %e, "Failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
