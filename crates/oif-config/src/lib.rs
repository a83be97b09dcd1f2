//! Deployment configuration loading.
//!
//! Reads a TOML deployment file, substitutes `${VAR}` references from the
//! environment, applies prefixed environment overrides and checks the
//! structure before any component is built.

use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub mod types;

pub use types::*;

pub const DEFAULT_ENV_PREFIX: &str = "OIF_";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: DEFAULT_ENV_PREFIX.to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<DeploymentConfig, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;
		info!("Loading configuration from {:?}", file_path);

		let content = tokio::fs::read_to_string(file_path)
			.await
			.map_err(|e| match e.kind() {
				std::io::ErrorKind::NotFound => {
					ConfigError::FileNotFound(file_path.display().to_string())
				}
				_ => ConfigError::IoError(e),
			})?;
		self.load_str(&content)
	}

	/// Same as [`ConfigLoader::load`] for configuration already in memory.
	pub fn load_str(&self, content: &str) -> Result<DeploymentConfig, ConfigError> {
		let substituted = self.substitute_env_vars(content)?;
		let mut config: DeploymentConfig =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;
		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		let mut result = content.to_string();
		for cap in re.captures_iter(content) {
			let var_name = &cap[1];
			let value =
				env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
			result = result.replace(&cap[0], &value);
		}
		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut DeploymentConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			debug!("Overriding log level from environment");
			config.service.log_level = log_level;
		}

		if let Ok(chain_id) = env::var(format!("{}CHAIN_ID", self.env_prefix)) {
			debug!("Overriding chain id from environment");
			config.chain.chain_id = chain_id
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid chain id: {}", e)))?;
		}

		Ok(())
	}
}

/// Structural checks. Component tables are validated by their factories.
pub fn validate_config(config: &DeploymentConfig) -> Result<(), ConfigError> {
	if config.chain.chain_id == 0 {
		return Err(ConfigError::ValidationError(
			"Chain id must be non-zero".to_string(),
		));
	}

	for (section, table) in [("settler", &config.settler), ("filler", &config.filler)] {
		let has_address = table
			.as_table()
			.is_some_and(|t| t.contains_key("address"));
		if !has_address {
			return Err(ConfigError::ValidationError(format!(
				"[{}] must be a table with an address",
				section
			)));
		}
	}

	let mut enabled = 0;
	for (name, oracle) in &config.oracles {
		if !oracle.enabled {
			continue;
		}
		if oracle.implementation.is_empty() {
			return Err(ConfigError::ValidationError(format!(
				"Oracle '{}' names no implementation",
				name
			)));
		}
		if !oracle.config.is_table() {
			return Err(ConfigError::ValidationError(format!(
				"Oracle '{}' config must be a table",
				name
			)));
		}
		enabled += 1;
	}
	if enabled == 0 {
		return Err(ConfigError::ValidationError(
			"At least one oracle must be enabled".to_string(),
		));
	}

	Ok(())
}
