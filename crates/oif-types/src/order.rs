//! Order and output data model.

use crate::primitives::{truncate_to_address, u256_to_word};
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// What must be delivered on a destination chain, and how to prove it.
///
/// Field order matches the Solidity `MandateOutput` struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MandateOutput {
	/// Oracle on the destination chain that attests the fill.
	pub remote_oracle: B256,
	/// Filler contract on the destination chain that must perform the fill.
	pub remote_filler: B256,
	/// Destination chain id.
	pub chain_id: U256,
	/// Token identifier. EVM tokens right-aligned, Bitcoin uses a signifier.
	pub token: B256,
	/// Amount to deliver (or the floor of a decaying amount).
	pub amount: U256,
	/// Recipient identifier.
	pub recipient: B256,
	/// Optional callback payload for the recipient.
	pub remote_call: Bytes,
	/// Pricing selector and parameters.
	pub fulfillment_context: Bytes,
}

/// One locked input: a resource lock id and the amount locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Input {
	pub resource_id: U256,
	pub amount: U256,
}

impl Input {
	pub fn new(resource_id: U256, amount: U256) -> Self {
		Self {
			resource_id,
			amount,
		}
	}

	/// The underlying token: the low 20 bytes of the resource id.
	pub fn token(&self) -> Address {
		truncate_to_address(u256_to_word(self.resource_id))
	}

	/// Resource lock id packing `lockTag(12) | token(20)`.
	pub fn resource_id_for(lock_tag: [u8; 12], token: Address) -> U256 {
		let mut word = [0u8; 32];
		word[..12].copy_from_slice(&lock_tag);
		word[12..].copy_from_slice(token.as_slice());
		U256::from_be_bytes(word)
	}

	pub fn as_pair(&self) -> [U256; 2] {
		[self.resource_id, self.amount]
	}
}

/// A user's cross-chain intent as locked in a resource lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardOrder {
	pub user: Address,
	pub nonce: U256,
	pub origin_chain_id: U256,
	pub expires: u32,
	pub fill_deadline: u32,
	pub local_oracle: Address,
	pub inputs: Vec<Input>,
	pub outputs: Vec<MandateOutput>,
}

impl StandardOrder {
	pub fn input_pairs(&self) -> Vec<[U256; 2]> {
		self.inputs.iter().map(Input::as_pair).collect()
	}
}

/// Who filled an output, and when. Written at most once per output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRecord {
	pub solver: B256,
	pub timestamp: u32,
}
