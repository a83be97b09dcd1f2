//! Origin-chain settler.
//!
//! The settler opens orders into the resource lock, and releases the locked
//! inputs once the order's local oracle confirms every output was filled.
//! Solvers may sell their claim on an order to a purchaser who pays out
//! early; the governance fee is taken from released inputs.

use alloy::primitives::{Address, B256, U256};
use oif_chain::{LedgerError, LockError};
use oif_codec::CodecError;
use oif_oracle::OracleError;
use oif_types::{IdentifierError, ValidationError};
use thiserror::Error;

pub mod governance;
pub mod order_id;
pub mod purchase;
pub mod resolve;
pub mod settler;
pub mod typed_data;

pub use governance::{
	FeeSchedule, GovernanceFee, PendingFee, GOVERNANCE_FEE_CHANGE_DELAY, MAX_GOVERNANCE_FEE,
};
pub use order_id::order_identifier;
pub use purchase::{Purchase, PurchaseRecord};
pub use settler::{create_settler, ClaimSignatures, CompactSettler, SettlerSchema, SettlerServices};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlerError {
	#[error("Order originates on chain {actual}, settler runs on chain {expected}")]
	WrongChain { expected: U256, actual: U256 },
	#[error("Fill deadline {deadline} is in the past at {now}")]
	FillDeadlineInPast { deadline: u32, now: u32 },
	#[error("Expired at {expires}, now {now}")]
	Expired { expires: u32, now: u32 },
	#[error("Caller {caller} is not the order owner {owner}")]
	NotOrderOwner { caller: Address, owner: B256 },
	#[error("Invalid signer")]
	InvalidSigner,
	#[error("Expected {expected} fill timestamps, got {actual}")]
	InvalidTimestampLength { expected: usize, actual: usize },
	#[error("Expected {expected} solvers, got {actual}")]
	InvalidSolverLength { expected: usize, actual: usize },
	#[error("Output filled at {filled_at}, after the fill deadline {fill_deadline}")]
	FilledTooLate { fill_deadline: u32, filled_at: u32 },
	#[error("Local oracle {0} is not deployed")]
	UnknownOracle(Address),
	#[error("Purchaser must be non-zero")]
	InvalidPurchaser,
	#[error("Order hashes to {actual}, purchase names {expected}")]
	OrderIdMismatch { expected: B256, actual: B256 },
	#[error("Order already purchased")]
	AlreadyPurchased,
	#[error("Caller {0} is not the owner")]
	NotOwner(Address),
	#[error("Governance fee {0} exceeds the maximum")]
	GovernanceFeeTooHigh(U256),
	#[error("Governance fee change not ready until {effective_at}, now {now}")]
	GovernanceFeeChangeNotReady { effective_at: u32, now: u32 },
	#[error("No governance fee change scheduled")]
	NoPendingGovernanceFee,
	#[error("Amount overflow")]
	AmountOverflow,
	#[error(transparent)]
	Oracle(#[from] OracleError),
	#[error(transparent)]
	Lock(#[from] LockError),
	#[error(transparent)]
	Ledger(#[from] LedgerError),
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error("Invalid identifier: {0}")]
	Identifier(#[from] IdentifierError),
	#[error("Invalid configuration: {0}")]
	Config(#[from] ValidationError),
}
