//! Deployment wiring.
//!
//! A [`Deployment`] is one chain's settler, filler, resource lock and oracles,
//! built from a [`DeploymentConfig`] by [`DeploymentBuilder`]. Oracles are
//! created through named factories so new verification strategies plug in
//! without touching the builder.

use alloy::primitives::{Address, B256};
use oif_chain::implementations::memory_lock::MemoryResourceLock;
use oif_chain::LedgerError;
use oif_codec::CodecError;
use oif_config::DeploymentConfig;
use oif_filler::{create_filler, FillerError, FillerSchema, OutputFiller};
use oif_oracle::implementations::bitcoin::{create_bitcoin_oracle, BitcoinOracleSchema};
use oif_oracle::implementations::relay::{create_relay_oracle, RelayOracleSchema};
use oif_oracle::{AttestationQuery, BitcoinOracle, MessageRelayOracle, OracleError, OracleRegistry};
use oif_settler::{create_settler, CompactSettler, SettlerError, SettlerSchema, SettlerServices};
use oif_types::{ConfigSchema, EventBus, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub mod relay;
pub mod scenario;
pub mod services;

pub use relay::deliver_pending;
pub use services::{ChainServices, InMemoryChain};

#[derive(Debug, Error)]
pub enum DeploymentError {
	#[error("Invalid [{section}] configuration: {source}")]
	Validation {
		section: String,
		source: ValidationError,
	},
	#[error("Unknown oracle implementation '{0}'")]
	UnknownImplementation(String),
	#[error("Oracle implementation '{implementation}' needs a {service}")]
	MissingService {
		implementation: String,
		service: &'static str,
	},
	#[error("Two oracles are deployed at {0}")]
	DuplicateOracle(Address),
	#[error("A payload creator is already deployed at {0}")]
	DuplicatePayloadCreator(Address),
	#[error("No relay oracle with identifier {0}")]
	UnknownRelayDestination(B256),
	#[error(transparent)]
	Settler(#[from] SettlerError),
	#[error(transparent)]
	Filler(#[from] FillerError),
	#[error(transparent)]
	Oracle(#[from] OracleError),
	#[error(transparent)]
	Ledger(#[from] LedgerError),
	#[error(transparent)]
	Codec(#[from] CodecError),
}

/// A deployed oracle, by kind.
#[derive(Clone)]
pub enum OracleHandle {
	Relay(Arc<MessageRelayOracle>),
	Bitcoin(Arc<BitcoinOracle>),
	Custom {
		address: Address,
		oracle: Arc<dyn AttestationQuery>,
	},
}

impl OracleHandle {
	pub fn address(&self) -> Address {
		match self {
			OracleHandle::Relay(oracle) => oracle.address(),
			OracleHandle::Bitcoin(oracle) => oracle.address(),
			OracleHandle::Custom { address, .. } => *address,
		}
	}

	pub fn query(&self) -> Arc<dyn AttestationQuery> {
		match self {
			OracleHandle::Relay(oracle) => oracle.clone(),
			OracleHandle::Bitcoin(oracle) => oracle.clone(),
			OracleHandle::Custom { oracle, .. } => oracle.clone(),
		}
	}
}

// Type aliases for factory functions
type OracleFactory = Box<
	dyn Fn(&toml::Value, &ChainServices, &EventBus) -> Result<OracleHandle, DeploymentError>
		+ Send
		+ Sync,
>;

struct RegisteredOracle {
	factory: OracleFactory,
	schema: Box<dyn ConfigSchema>,
}

/// One chain's deployed components.
pub struct Deployment {
	config: DeploymentConfig,
	services: ChainServices,
	events: EventBus,
	lock: Arc<MemoryResourceLock>,
	filler: Arc<OutputFiller>,
	settler: Arc<CompactSettler>,
	registry: Arc<OracleRegistry>,
	oracles: HashMap<String, OracleHandle>,
}

impl Deployment {
	pub fn chain_id(&self) -> u64 {
		self.config.chain.chain_id
	}

	pub fn config(&self) -> &DeploymentConfig {
		&self.config
	}

	pub fn services(&self) -> &ChainServices {
		&self.services
	}

	pub fn events(&self) -> &EventBus {
		&self.events
	}

	pub fn lock(&self) -> &Arc<MemoryResourceLock> {
		&self.lock
	}

	pub fn filler(&self) -> &Arc<OutputFiller> {
		&self.filler
	}

	pub fn settler(&self) -> &Arc<CompactSettler> {
		&self.settler
	}

	pub fn registry(&self) -> &Arc<OracleRegistry> {
		&self.registry
	}

	pub fn oracle(&self, name: &str) -> Option<&OracleHandle> {
		self.oracles.get(name)
	}

	pub fn oracle_names(&self) -> impl Iterator<Item = &str> {
		self.oracles.keys().map(String::as_str)
	}

	pub fn relay_oracle(&self, name: &str) -> Option<Arc<MessageRelayOracle>> {
		match self.oracles.get(name)? {
			OracleHandle::Relay(oracle) => Some(oracle.clone()),
			_ => None,
		}
	}

	pub fn bitcoin_oracle(&self, name: &str) -> Option<Arc<BitcoinOracle>> {
		match self.oracles.get(name)? {
			OracleHandle::Bitcoin(oracle) => Some(oracle.clone()),
			_ => None,
		}
	}

	/// Every relay oracle of this deployment.
	pub fn relay_oracles(&self) -> impl Iterator<Item = &Arc<MessageRelayOracle>> {
		self.oracles.values().filter_map(|handle| match handle {
			OracleHandle::Relay(oracle) => Some(oracle),
			_ => None,
		})
	}
}

// Factory pattern for creating a deployment from config
pub struct DeploymentBuilder {
	config: DeploymentConfig,
	services: ChainServices,
	oracle_factories: HashMap<String, RegisteredOracle>,
}

impl DeploymentBuilder {
	pub fn new(config: DeploymentConfig, services: ChainServices) -> Self {
		Self {
			config,
			services,
			oracle_factories: HashMap::new(),
		}
	}

	pub fn with_oracle_factory<F, S>(mut self, name: &str, schema: S, factory: F) -> Self
	where
		F: Fn(&toml::Value, &ChainServices, &EventBus) -> Result<OracleHandle, DeploymentError>
			+ Send
			+ Sync
			+ 'static,
		S: ConfigSchema + 'static,
	{
		self.oracle_factories.insert(
			name.to_string(),
			RegisteredOracle {
				factory: Box::new(factory),
				schema: Box::new(schema),
			},
		);
		self
	}

	/// Registers the `relay` and `bitcoin` implementations.
	pub fn with_default_oracles(self) -> Self {
		self.with_oracle_factory("relay", RelayOracleSchema, |config, services, events| {
			let escrow = services
				.escrow
				.clone()
				.ok_or_else(|| DeploymentError::MissingService {
					implementation: "relay".to_string(),
					service: "message escrow",
				})?;
			let oracle = create_relay_oracle(
				config,
				escrow,
				services.payload_creators.clone(),
				events.clone(),
			)?;
			Ok(OracleHandle::Relay(Arc::new(oracle)))
		})
		.with_oracle_factory("bitcoin", BitcoinOracleSchema, |config, services, events| {
			let light_client =
				services
					.light_client
					.clone()
					.ok_or_else(|| DeploymentError::MissingService {
						implementation: "bitcoin".to_string(),
						service: "light client",
					})?;
			let oracle =
				create_bitcoin_oracle(config, light_client, services.ledger.clone(), events.clone())?;
			Ok(OracleHandle::Bitcoin(Arc::new(oracle)))
		})
	}

	/// Checks every component table against its schema without building.
	pub fn validate(&self) -> Result<(), DeploymentError> {
		let check = |section: &str, schema: &dyn ConfigSchema, config: &toml::Value| {
			schema
				.validate(config)
				.map_err(|source| DeploymentError::Validation {
					section: section.to_string(),
					source,
				})
		};
		check("settler", &SettlerSchema, &self.config.settler)?;
		check("filler", &FillerSchema, &self.config.filler)?;
		for (name, settings) in self.config.oracles.iter().filter(|(_, s)| s.enabled) {
			let registered = self
				.oracle_factories
				.get(&settings.implementation)
				.ok_or_else(|| DeploymentError::UnknownImplementation(settings.implementation.clone()))?;
			check(&format!("oracles.{}", name), registered.schema.as_ref(), &settings.config)?;
		}
		Ok(())
	}

	pub fn build(self) -> Result<Deployment, DeploymentError> {
		self.validate()?;
		let chain_id = self.config.chain.chain_id;
		let services = self.services;
		let events = EventBus::new(self.config.service.event_capacity);

		let mut lock = MemoryResourceLock::new(
			self.config.lock.address,
			services.ledger.clone(),
			services.verifier.clone(),
		);
		if let Some(allocator) = self.config.lock.allocator {
			lock = lock.with_allocator(allocator);
		}
		let lock = Arc::new(lock);

		let filler = Arc::new(create_filler(
			&self.config.filler,
			chain_id,
			services.ledger.clone(),
			services.caller.clone(),
			events.clone(),
		)?);

		// Relay oracles on this chain carry the filler's payloads under its address.
		if !services
			.payload_creators
			.register(filler.address(), filler.clone())
		{
			return Err(DeploymentError::DuplicatePayloadCreator(filler.address()));
		}

		// The filler attests its own fills and serves as the same-chain oracle.
		let registry = Arc::new(OracleRegistry::new());
		registry.register(filler.address(), filler.clone());

		let mut oracles = HashMap::new();
		for (name, settings) in &self.config.oracles {
			if !settings.enabled {
				debug!(oracle = %name, "oracle disabled, skipping");
				continue;
			}
			let registered = self
				.oracle_factories
				.get(&settings.implementation)
				.ok_or_else(|| DeploymentError::UnknownImplementation(settings.implementation.clone()))?;
			let handle = (registered.factory)(&settings.config, &services, &events)?;
			let address = handle.address();
			if registry.get(&address).is_some() {
				return Err(DeploymentError::DuplicateOracle(address));
			}
			registry.register(address, handle.query());
			info!(oracle = %name, implementation = %settings.implementation, %address, "oracle deployed");
			oracles.insert(name.clone(), handle);
		}

		let settler = Arc::new(create_settler(
			&self.config.settler,
			chain_id,
			SettlerServices {
				lock: lock.clone(),
				ledger: services.ledger.clone(),
				oracles: registry.clone(),
				verifier: services.verifier.clone(),
				caller: services.caller.clone(),
			},
			events.clone(),
		)?);

		info!(
			name = %self.config.service.name,
			chain_id,
			settler = %settler.address(),
			filler = %filler.address(),
			oracles = registry.len(),
			"deployment built"
		);

		Ok(Deployment {
			config: self.config,
			services,
			events,
			lock,
			filler,
			settler,
			registry,
			oracles,
		})
	}
}
