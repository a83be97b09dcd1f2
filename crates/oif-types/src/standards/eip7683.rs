//! EIP-7683 resolved order projection.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Token movement as seen by an EIP-7683 consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
	pub token: B256,
	pub amount: U256,
	pub recipient: B256,
	pub chain_id: U256,
}

/// Where and how one output must be filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillInstruction {
	pub destination_chain_id: U256,
	pub destination_settler: B256,
	/// `abi.encode(MandateOutput)`.
	pub origin_data: Bytes,
}

/// EIP-7683: Resolved order format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCrossChainOrder {
	pub user: Address,
	pub origin_chain_id: U256,
	pub open_deadline: u32,
	pub fill_deadline: u32,
	pub order_id: B256,
	pub max_spent: Vec<Output>,
	pub min_received: Vec<Output>,
	pub fill_instructions: Vec<FillInstruction>,
}
