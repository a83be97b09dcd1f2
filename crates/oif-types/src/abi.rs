//! Solidity ABI bindings.
//!
//! Used for the `abi.encode(outputs)` part of the order id, the EIP-712
//! mandate witness, EIP-7683 origin data, and the callback selectors invoked
//! on recipients and destinations.

use crate::order::{MandateOutput as Output, StandardOrder};
use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::{SolStruct, SolValue};

sol! {
	#[derive(Debug, PartialEq, Eq)]
	struct MandateOutput {
		bytes32 oracle;
		bytes32 settler;
		uint256 chainId;
		bytes32 token;
		uint256 amount;
		bytes32 recipient;
		bytes call;
		bytes context;
	}

	#[derive(Debug, PartialEq, Eq)]
	struct Mandate {
		uint32 fillDeadline;
		address localOracle;
		MandateOutput[] outputs;
	}

	interface IOutputCallback {
		function outputFilled(bytes32 token, uint256 amount, bytes executionData) external;
	}

	interface IInputCallback {
		function orderFinalised(uint256[2][] inputs, bytes executionData) external;
	}
}

impl From<&Output> for MandateOutput {
	fn from(output: &Output) -> Self {
		Self {
			oracle: output.remote_oracle,
			settler: output.remote_filler,
			chainId: output.chain_id,
			token: output.token,
			amount: output.amount,
			recipient: output.recipient,
			call: output.remote_call.clone(),
			context: output.fulfillment_context.clone(),
		}
	}
}

impl From<MandateOutput> for Output {
	fn from(output: MandateOutput) -> Self {
		Self {
			remote_oracle: output.oracle,
			remote_filler: output.settler,
			chain_id: output.chainId,
			token: output.token,
			amount: output.amount,
			recipient: output.recipient,
			remote_call: output.call,
			fulfillment_context: output.context,
		}
	}
}

/// `abi.encode(outputs)` as a dynamic array of tuples.
pub fn encode_outputs(outputs: &[Output]) -> Vec<u8> {
	let outputs: Vec<MandateOutput> = outputs.iter().map(MandateOutput::from).collect();
	outputs.abi_encode()
}

/// `abi.encode(output)` for a single output, used as EIP-7683 origin data.
pub fn encode_output(output: &Output) -> Vec<u8> {
	MandateOutput::from(output).abi_encode()
}

/// EIP-712 struct hash of the order's mandate; the lock witness.
pub fn mandate_hash(order: &StandardOrder) -> B256 {
	Mandate {
		fillDeadline: order.fill_deadline,
		localOracle: order.local_oracle,
		outputs: order.outputs.iter().map(MandateOutput::from).collect(),
	}
	.eip712_hash_struct()
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{Bytes, U256};
	use alloy::sol_types::SolValue;

	fn sample() -> Output {
		Output {
			remote_oracle: B256::repeat_byte(1),
			remote_filler: B256::repeat_byte(2),
			chain_id: U256::from(10),
			token: B256::repeat_byte(3),
			amount: U256::from(1000),
			recipient: B256::repeat_byte(4),
			remote_call: Bytes::from(vec![0xde, 0xad]),
			fulfillment_context: Bytes::new(),
		}
	}

	#[test]
	fn test_output_abi_roundtrip() {
		let encoded = encode_output(&sample());
		let decoded = MandateOutput::abi_decode(&encoded).unwrap();
		assert_eq!(Output::from(decoded), sample());
	}

	#[test]
	fn test_mandate_hash_depends_on_outputs() {
		let mut order = StandardOrder {
			fill_deadline: 100,
			outputs: vec![sample()],
			..Default::default()
		};
		let first = mandate_hash(&order);
		order.outputs[0].amount = U256::from(1001);
		assert_ne!(first, mandate_hash(&order));
	}
}
