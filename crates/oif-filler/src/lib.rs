//! Destination-chain output filler.
//!
//! Solvers call the filler to deliver an order's outputs. Each output is
//! filled at most once; the first solver to fill it is recorded and every
//! later fill is told who that was. The filler is also the direct local
//! oracle for its own fills: it attests every fresh fill in its own
//! namespace, and vouches for those payloads when they are relayed.

use alloy::primitives::{B256, U256};
use oif_chain::LedgerError;
use oif_codec::CodecError;
use oif_types::{IdentifierError, ValidationError};
use thiserror::Error;

pub mod filler;
pub mod pricing;

pub use filler::{create_filler, FillerSchema, OutputFiller};
pub use pricing::{dutch_auction_context, Pricing};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FillerError {
	#[error("Fill deadline {deadline} passed at {now}")]
	FillDeadlinePassed { deadline: u32, now: u32 },
	#[error("Output targets chain {actual}, filler runs on chain {expected}")]
	WrongChain { expected: U256, actual: U256 },
	#[error("Output names filler {actual}, this filler is {expected}")]
	WrongRemoteFiller { expected: B256, actual: B256 },
	#[error("Solver must be non-zero")]
	ZeroSolver,
	#[error("Output already filled by {0}")]
	AlreadyFilled(B256),
	#[error("Fulfillment context has invalid length {0}")]
	InvalidContextDataLength(usize),
	#[error("Unsupported fulfillment context selector {0:#04x}")]
	UnsupportedFulfillmentContext(u8),
	#[error("Dutch auction ended at {stop_time}, now {now}")]
	AuctionEnded { stop_time: U256, now: U256 },
	#[error("Amount overflow")]
	AmountOverflow,
	#[error("Not enough gas to execute callbacks: need {required}, can forward {available}")]
	NotEnoughGasExecution { required: u64, available: u64 },
	#[error("Invalid identifier: {0}")]
	Identifier(#[from] IdentifierError),
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error(transparent)]
	Ledger(#[from] LedgerError),
	#[error("Invalid configuration: {0}")]
	Config(#[from] ValidationError),
}

/// How a batch fill treats outputs another solver already filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
	/// Abort the whole batch.
	Throw,
	/// Leave the output as filled and continue.
	Skip,
}
