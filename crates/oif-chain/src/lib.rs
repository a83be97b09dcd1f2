//! Chain collaborators consumed by the settlement core.
//!
//! The filler, oracles and settler never move tokens, verify signatures or
//! talk to other chains themselves. They go through the narrow interfaces
//! defined here, so the same core runs against real chain bindings or the
//! in-memory implementations used by tests and the simulator.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use oif_types::{CallContext, Input, StandardOrder};
use thiserror::Error;

pub mod implementations {
	pub mod call_router;
	pub mod ecdsa;
	pub mod memory_escrow;
	pub mod memory_ledger;
	pub mod memory_light_client;
	pub mod memory_lock;
}

/// Errors raised by a token ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
	#[error("Insufficient balance of {token} for {owner}: needed {needed}, available {available}")]
	InsufficientBalance {
		token: Address,
		owner: Address,
		needed: U256,
		available: U256,
	},
	#[error("Insufficient allowance of {token} from {owner} to {spender}: needed {needed}, available {available}")]
	InsufficientAllowance {
		token: Address,
		owner: Address,
		spender: Address,
		needed: U256,
		available: U256,
	},
	#[error("Balance overflow")]
	Overflow,
}

/// Errors raised by a resource lock registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
	#[error("Claim expired at {expires}, now {now}")]
	Expired { expires: u32, now: u32 },
	#[error("Nonce {nonce} of {sponsor} already consumed")]
	NonceConsumed { sponsor: Address, nonce: U256 },
	#[error("Claim is neither registered nor signed by the sponsor")]
	InvalidSponsorSignature,
	#[error("Allocator did not authorize the claim")]
	InvalidAllocatorSignature,
	#[error("Claimed portions of lock {id} do not add up to the allocated amount")]
	AllocationMismatch { id: U256 },
	#[error("Lock {id} holds {available}, claim needs {needed}")]
	InsufficientLockedBalance {
		id: U256,
		needed: U256,
		available: U256,
	},
	#[error(transparent)]
	Ledger(#[from] LedgerError),
}

/// Errors raised by a message escrow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscrowError {
	#[error("Message deadline {deadline} already passed at {now}")]
	DeadlinePassed { deadline: u64, now: u64 },
	#[error("Delivery gas must be non-zero")]
	ZeroDeliveryGas,
}

/// One leg of a batch transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
	pub token: Address,
	pub from: Address,
	pub to: Address,
	pub amount: U256,
}

/// Fungible token balances across all tokens of one chain.
pub trait TokenLedger: Send + Sync {
	fn balance_of(&self, token: Address, owner: Address) -> U256;

	fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256;

	fn approve(&self, token: Address, owner: Address, spender: Address, amount: U256);

	/// Moves `owner`'s own tokens.
	fn transfer(
		&self,
		token: Address,
		owner: Address,
		to: Address,
		amount: U256,
	) -> Result<(), LedgerError>;

	/// Moves tokens `from` an owner who approved `spender`.
	fn transfer_from(&self, spender: Address, transfer: &Transfer) -> Result<(), LedgerError>;

	/// All-or-nothing batch of `transfer_from` legs.
	fn transfer_from_batch(&self, spender: Address, transfers: &[Transfer]) -> Result<(), LedgerError>;
}

/// Recipient and amount of one portion of a claimed lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
	pub claimant: Address,
	pub amount: U256,
}

/// One lock of a batch claim, split into portions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchClaimComponent {
	pub id: U256,
	pub allocated_amount: U256,
	pub portions: Vec<Component>,
}

/// A batch claim presented by an arbiter (the settler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchClaim {
	pub sponsor: Address,
	pub nonce: U256,
	pub expires: u32,
	pub witness: B256,
	pub sponsor_signature: Bytes,
	pub allocator_data: Bytes,
	pub claims: Vec<BatchClaimComponent>,
}

impl BatchClaim {
	pub fn ids_and_amounts(&self) -> Vec<[U256; 2]> {
		self.claims
			.iter()
			.map(|c| [c.id, c.allocated_amount])
			.collect()
	}
}

/// Hash a sponsor signs (or registers) to let `arbiter` release their locks.
pub fn batch_claim_hash(
	arbiter: Address,
	sponsor: Address,
	nonce: U256,
	expires: u32,
	ids_and_amounts: &[[U256; 2]],
	witness: B256,
) -> B256 {
	let mut packed = Vec::with_capacity(ids_and_amounts.len() * 64);
	for [id, amount] in ids_and_amounts {
		packed.extend_from_slice(&id.to_be_bytes::<32>());
		packed.extend_from_slice(&amount.to_be_bytes::<32>());
	}
	keccak256(
		(
			arbiter,
			sponsor,
			nonce,
			U256::from(expires),
			keccak256(&packed),
			witness,
		)
			.abi_encode(),
	)
}

/// Resource lock / deposit registry.
pub trait ResourceLock: Send + Sync {
	fn address(&self) -> Address;

	/// Pulls the listed tokens from `ctx.caller` into locks owned by `sponsor`
	/// and registers `claim_hash` as pre-authorized.
	fn deposit_and_register(
		&self,
		ctx: &CallContext,
		sponsor: Address,
		ids_and_amounts: &[[U256; 2]],
		claim_hash: B256,
	) -> Result<(), LockError>;

	/// Releases locked tokens to claimants. `ctx.caller` is the arbiter.
	/// Consumes the sponsor's nonce; a second claim on it fails.
	fn batch_claim(&self, ctx: &CallContext, claim: &BatchClaim) -> Result<B256, LockError>;

	fn locked_balance(&self, sponsor: Address, id: U256) -> U256;

	fn is_nonce_consumed(&self, sponsor: Address, nonce: U256) -> bool;
}

/// Gas and price parameters paid to relayers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncentiveDescription {
	pub max_gas_delivery: u64,
	pub max_gas_ack: u64,
	pub refund_gas_to: Address,
	pub price_of_delivery_gas: U256,
	pub price_of_ack_gas: U256,
	pub target_delta: u64,
}

/// Incentivized cross-chain message transport.
pub trait MessageEscrow: Send + Sync {
	fn address(&self) -> Address;

	/// Queues `message` for `destination_address` on the chain named by
	/// `destination_identifier`. The sender is `ctx.caller`, which the
	/// transport authenticates on delivery.
	fn submit_message(
		&self,
		ctx: &CallContext,
		destination_identifier: B256,
		destination_address: B256,
		message: Bytes,
		incentive: &IncentiveDescription,
		deadline: u64,
	) -> Result<B256, EscrowError>;
}

/// Bitcoin header chain as validated by an SPV light client.
pub trait LightClient: Send + Sync {
	fn latest_block_height(&self) -> u64;

	fn block_hash(&self, height: u64) -> Option<B256>;
}

/// Checks a signature over a typed-data digest.
pub trait SignatureVerifier: Send + Sync {
	fn is_valid_signature(&self, signer: Address, digest: B256, signature: &[u8]) -> bool;
}

/// A gas-limited call into another contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
	pub from: Address,
	pub to: Address,
	pub data: Bytes,
	pub gas_limit: u64,
}

/// Outcome of an external call. Return data is never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
	pub success: bool,
	pub gas_used: u64,
}

pub trait ExternalCaller: Send + Sync {
	fn call(&self, request: &CallRequest) -> CallOutcome;
}

/// Claim hash an order's inputs are locked under when `arbiter` settles it.
pub fn order_claim_hash(arbiter: Address, order: &StandardOrder, witness: B256) -> B256 {
	batch_claim_hash(
		arbiter,
		order.user,
		order.nonce,
		order.expires,
		&order.inputs.iter().map(Input::as_pair).collect::<Vec<_>>(),
		witness,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_claim_hash_binds_arbiter_and_nonce() {
		let pairs = [[U256::from(1), U256::from(100)]];
		let a = batch_claim_hash(Address::repeat_byte(1), Address::repeat_byte(2), U256::ZERO, 10, &pairs, B256::ZERO);
		let b = batch_claim_hash(Address::repeat_byte(3), Address::repeat_byte(2), U256::ZERO, 10, &pairs, B256::ZERO);
		let c = batch_claim_hash(Address::repeat_byte(1), Address::repeat_byte(2), U256::from(1), 10, &pairs, B256::ZERO);

		assert_ne!(a, b);
		assert_ne!(a, c);
	}
}
