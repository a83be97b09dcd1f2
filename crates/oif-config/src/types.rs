//! Deployment configuration sections.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One settlement deployment on a single chain.
///
/// `settler`, `filler` and the oracle `config` tables are handed unparsed to
/// the component factories, which validate them against their own schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
	pub service: ServiceSettings,
	pub chain: ChainSettings,
	pub settler: toml::Value,
	pub filler: toml::Value,
	pub lock: LockSettings,
	#[serde(default)]
	pub oracles: HashMap<String, OracleSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
	pub name: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// Capacity of the protocol event bus.
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
	pub chain_id: u64,
	/// Message escrow relay oracles submit through.
	#[serde(default)]
	pub escrow: Option<Address>,
	/// This chain's identifier in the message transport's namespace.
	#[serde(default)]
	pub transport_identifier: Option<B256>,
}

/// The resource lock the settler deposits into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSettings {
	pub address: Address,
	/// When set, every claim must carry this allocator's signature.
	#[serde(default)]
	pub allocator: Option<Address>,
}

/// A named oracle deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
	/// Factory name, e.g. `relay` or `bitcoin`.
	pub implementation: String,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	pub config: toml::Value,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_event_capacity() -> usize {
	1024
}

fn default_enabled() -> bool {
	true
}
