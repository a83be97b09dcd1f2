//! Chain collaborators a deployment is built against.

use alloy::primitives::{Address, B256, U256};
use oif_chain::implementations::call_router::CallRouter;
use oif_chain::implementations::ecdsa::EcdsaVerifier;
use oif_chain::implementations::memory_escrow::MemoryMessageEscrow;
use oif_chain::implementations::memory_ledger::MemoryLedger;
use oif_chain::implementations::memory_light_client::MemoryLightClient;
use oif_chain::{ExternalCaller, LightClient, MessageEscrow, SignatureVerifier, TokenLedger};
use oif_config::ChainSettings;
use oif_oracle::PayloadCreatorRegistry;
use oif_types::u256_to_word;
use std::sync::Arc;

/// Escrow address used when the chain section names none.
pub const DEFAULT_ESCROW: Address = Address::repeat_byte(0xe5);

#[derive(Clone)]
pub struct ChainServices {
	pub ledger: Arc<dyn TokenLedger>,
	pub verifier: Arc<dyn SignatureVerifier>,
	pub caller: Arc<dyn ExternalCaller>,
	/// Needed by relay oracles.
	pub escrow: Option<Arc<dyn MessageEscrow>>,
	/// Needed by Bitcoin oracles.
	pub light_client: Option<Arc<dyn LightClient>>,
	/// Payload creators deployed on the chain. Relay oracles only relay
	/// payloads vouched for by an entry here.
	pub payload_creators: Arc<PayloadCreatorRegistry>,
}

/// A chain simulated in memory. Keeps the concrete handles so tests and the
/// simulator can mint tokens, register callees, accept blocks and relay
/// messages. One chain hosts one deployment: the filler's address is
/// claimed in `payload_creators` when the deployment is built.
pub struct InMemoryChain {
	pub ledger: Arc<MemoryLedger>,
	pub router: Arc<CallRouter>,
	pub escrow: Arc<MemoryMessageEscrow>,
	pub light_client: Arc<MemoryLightClient>,
	pub payload_creators: Arc<PayloadCreatorRegistry>,
}

impl InMemoryChain {
	pub fn new(escrow: Address, transport_identifier: B256) -> Self {
		Self {
			ledger: Arc::new(MemoryLedger::new()),
			router: Arc::new(CallRouter::new()),
			escrow: Arc::new(MemoryMessageEscrow::new(escrow, transport_identifier)),
			light_client: Arc::new(MemoryLightClient::new()),
			payload_creators: Arc::new(PayloadCreatorRegistry::new()),
		}
	}

	/// Escrow and transport identifier from the chain section, defaulting to
	/// [`DEFAULT_ESCROW`] and the chain id as a 32-byte word.
	pub fn from_settings(settings: &ChainSettings) -> Self {
		Self::new(
			settings.escrow.unwrap_or(DEFAULT_ESCROW),
			settings
				.transport_identifier
				.unwrap_or_else(|| u256_to_word(U256::from(settings.chain_id))),
		)
	}

	pub fn services(&self) -> ChainServices {
		ChainServices {
			ledger: self.ledger.clone(),
			verifier: Arc::new(EcdsaVerifier),
			caller: self.router.clone(),
			escrow: Some(self.escrow.clone() as Arc<dyn MessageEscrow>),
			light_client: Some(self.light_client.clone() as Arc<dyn LightClient>),
			payload_creators: self.payload_creators.clone(),
		}
	}
}
