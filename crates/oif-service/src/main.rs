use alloy::primitives::U256;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oif_config::{ConfigLoader, DeploymentConfig};
use oif_core::scenario::{run_local_settlement, ScenarioParams};
use oif_core::{DeploymentBuilder, InMemoryChain};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "oif-node")]
#[command(about = "OIF settlement node", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "OIF_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Validate the configuration file
	Validate,
	/// Run a same-chain settlement against an in-memory chain
	Simulate {
		#[arg(long, default_value_t = 1_000_000)]
		input_amount: u64,

		#[arg(long, default_value_t = 990_000)]
		output_amount: u64,

		#[arg(long, default_value_t = 1)]
		nonce: u64,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	// Initialize tracing
	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Validate) | None => validate_config(&cli.config).await,
		Some(Commands::Simulate {
			input_amount,
			output_amount,
			nonce,
		}) => {
			let params = ScenarioParams {
				input_amount: U256::from(input_amount),
				output_amount: U256::from(output_amount),
				nonce: U256::from(nonce),
				..Default::default()
			};
			simulate(&cli.config, params).await
		}
	}
}

async fn load_config(path: &Path) -> Result<DeploymentConfig> {
	info!("Loading configuration from: {:?}", path);
	ConfigLoader::new()
		.with_file(path)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn validate_config(path: &Path) -> Result<()> {
	let config = load_config(path).await?;
	let chain = InMemoryChain::from_settings(&config.chain);
	let builder = DeploymentBuilder::new(config.clone(), chain.services()).with_default_oracles();
	builder
		.validate()
		.context("Component configuration is invalid")?;

	info!("Configuration is valid");
	info!("Deployment: {} on chain {}", config.service.name, config.chain.chain_id);
	for (name, oracle) in &config.oracles {
		if oracle.enabled {
			info!("  Oracle: {} ({})", name, oracle.implementation);
		}
	}
	Ok(())
}

async fn simulate(path: &Path, params: ScenarioParams) -> Result<()> {
	let config = load_config(path).await?;
	let chain = InMemoryChain::from_settings(&config.chain);
	let deployment = DeploymentBuilder::new(config, chain.services())
		.with_default_oracles()
		.build()
		.context("Failed to build deployment")?;

	let report = run_local_settlement(&deployment, &chain.ledger, &params)
		.context("Settlement scenario failed")?;
	println!("{}", serde_json::to_string_pretty(&report)?);
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	Ok(())
}
