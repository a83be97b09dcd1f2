//! Order identifier.

use alloy::primitives::{keccak256, Address, B256, U256};
use oif_types::abi::encode_outputs;
use oif_types::StandardOrder;

/// `keccak256(chainId | settler | user | nonce | expires | fillDeadline |
/// localOracle | inputs | abi.encode(outputs))`, tightly packed. `chain_id`
/// and `settler` are those of the settler computing the id, so the same
/// order opened on another settler gets another id.
pub fn order_identifier(chain_id: U256, settler: Address, order: &StandardOrder) -> B256 {
	let outputs = encode_outputs(&order.outputs);
	let mut packed = Vec::with_capacity(132 + order.inputs.len() * 64 + outputs.len());
	packed.extend_from_slice(&chain_id.to_be_bytes::<32>());
	packed.extend_from_slice(settler.as_slice());
	packed.extend_from_slice(order.user.as_slice());
	packed.extend_from_slice(&order.nonce.to_be_bytes::<32>());
	packed.extend_from_slice(&order.expires.to_be_bytes());
	packed.extend_from_slice(&order.fill_deadline.to_be_bytes());
	packed.extend_from_slice(order.local_oracle.as_slice());
	for input in &order.inputs {
		packed.extend_from_slice(&input.resource_id.to_be_bytes::<32>());
		packed.extend_from_slice(&input.amount.to_be_bytes::<32>());
	}
	packed.extend_from_slice(&outputs);
	keccak256(packed)
}
