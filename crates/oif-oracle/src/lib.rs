//! Attestation oracles.
//!
//! An oracle owns an [`AttestationStore`] of proven fill payloads and decides,
//! through its own verification strategy, which facts may enter it:
//!
//! - the filler acts as the direct local oracle for fills on its own chain,
//! - [`MessageRelayOracle`] records payloads relayed from a remote oracle,
//! - [`BitcoinOracle`] records Bitcoin payments proven against a light client,
//!   with an optimistic claim/dispute fast path.
//!
//! The settler only sees the [`AttestationQuery`] capability, which hands out
//! a read-only [`AttestationView`] of the store.

use alloy::primitives::{Address, Bytes, B256, U256};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use oif_chain::{EscrowError, LedgerError};
use oif_codec::CodecError;
use oif_types::ValidationError;
use std::sync::Arc;
use thiserror::Error;

pub mod store;

pub mod implementations {
	pub mod bitcoin;
	pub mod relay;
}

pub use implementations::bitcoin::{BitcoinOracle, BitcoinOracleConfig};
pub use implementations::relay::MessageRelayOracle;
pub use store::{AttestationKey, AttestationStore, AttestationView};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
	#[error("Payload {payload_hash} from oracle {oracle} (application {application}) on chain {chain_id} is not proven")]
	NotProven {
		chain_id: U256,
		oracle: B256,
		application: B256,
		payload_hash: B256,
	},
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error(transparent)]
	Escrow(#[from] EscrowError),
	#[error(transparent)]
	Ledger(#[from] LedgerError),
	#[error("Invalid configuration: {0}")]
	Config(#[from] ValidationError),
	#[error("Caller {0} is not the configured message escrow")]
	UnauthorizedTransport(Address),
	#[error("Caller {0} is not the owner")]
	NotOwner(Address),
	#[error("Unknown transport chain identifier {0}")]
	UnknownChainIdentifier(B256),
	#[error("No transport identifier registered for chain {0}")]
	UnknownChain(u64),
	#[error("Chain identifier mapping already set")]
	ChainIdentifierAlreadySet,
	#[error("Zero value")]
	ZeroValue,
	#[error("Not all payloads are valid")]
	NotAllPayloadsValid,
	#[error("No payload creator deployed at {0}")]
	UnknownPayloadCreator(Address),
	#[error("Output targets chain {actual}, oracle serves chain {expected}")]
	WrongChain { expected: U256, actual: U256 },
	#[error("Output does not name this oracle")]
	WrongOracle,
	#[error("Token {0} is not a Bitcoin token")]
	BadTokenFormat(B256),
	#[error("Unsupported Bitcoin address type {0}")]
	UnsupportedAddressType(u8),
	#[error("No block at height {0}")]
	NoBlock(u64),
	#[error("Too few confirmations: need {required}, have {available}")]
	TooFewConfirmations { required: u64, available: u64 },
	#[error("Invalid inclusion proof: {0}")]
	InvalidProof(&'static str),
	#[error("Output script does not match")]
	ScriptMismatch,
	#[error("Bitcoin output pays {actual} sats, expected {expected}")]
	BadAmount { expected: U256, actual: u64 },
	#[error("Previous block hash does not match")]
	BlockhashMismatch,
	#[error("Output not claimed")]
	NotClaimed,
	#[error("Output already claimed")]
	AlreadyClaimed,
	#[error("Claim already resolved")]
	AlreadyResolved,
	#[error("Claim was forfeited to a disputer")]
	ClaimForfeited,
	#[error("Claim already disputed")]
	AlreadyDisputed,
	#[error("Claim is disputed")]
	Disputed,
	#[error("Claim is not disputed")]
	NotDisputed,
	#[error("Too early: allowed after {allowed_after}, now {now}")]
	TooEarly { allowed_after: u32, now: u32 },
	#[error("Too late: deadline {deadline}, now {now}")]
	TooLate { deadline: u32, now: u32 },
	#[error("Amount overflow")]
	AmountOverflow,
}

/// Read side of an oracle: is a payload proven under a given namespace.
pub trait AttestationQuery: Send + Sync {
	fn attestations(&self) -> AttestationView<'_>;

	/// Three-level lookup where the attesting application is the sender.
	fn is_proven(&self, chain_id: U256, sender: B256, payload_hash: B256) -> bool {
		self.attestations().is_proven(chain_id, sender, payload_hash)
	}

	fn require_proven(
		&self,
		chain_id: U256,
		sender: B256,
		payload_hash: B256,
	) -> Result<(), OracleError> {
		self.attestations()
			.require_proven(chain_id, sender, sender, payload_hash)
	}

	/// Checks a filler-aware (128-byte tuple) proof series.
	fn efficient_require_proven(&self, series: &[u8]) -> Result<(), OracleError> {
		self.attestations().efficient_require_proven(series)
	}
}

/// A source of payloads that can vouch for them before they are relayed.
pub trait PayloadCreator: Send + Sync {
	fn are_payloads_valid(&self, payloads: &[Bytes]) -> bool;
}

/// Payload creators deployed on one chain, by address. A relay oracle asks
/// the creator at the submitted address and records its payloads under that
/// address, so a caller cannot speak for an application it is not.
#[derive(Default)]
pub struct PayloadCreatorRegistry {
	creators: DashMap<Address, Arc<dyn PayloadCreator>>,
}

impl PayloadCreatorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds `creator` to `address`. Returns `false`, leaving the existing
	/// binding in place, if the address is taken.
	pub fn register(&self, address: Address, creator: Arc<dyn PayloadCreator>) -> bool {
		match self.creators.entry(address) {
			Entry::Occupied(_) => false,
			Entry::Vacant(slot) => {
				slot.insert(creator);
				true
			}
		}
	}

	pub fn get(&self, address: &Address) -> Option<Arc<dyn PayloadCreator>> {
		self.creators.get(address).map(|c| c.clone())
	}
}

/// Deployed oracles on one chain, by address.
#[derive(Default)]
pub struct OracleRegistry {
	oracles: DashMap<Address, Arc<dyn AttestationQuery>>,
}

impl OracleRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, address: Address, oracle: Arc<dyn AttestationQuery>) {
		self.oracles.insert(address, oracle);
	}

	pub fn get(&self, address: &Address) -> Option<Arc<dyn AttestationQuery>> {
		self.oracles.get(address).map(|o| o.clone())
	}

	pub fn len(&self) -> usize {
		self.oracles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.oracles.is_empty()
	}
}
