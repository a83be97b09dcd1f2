//! EIP-7683 view of a standard order.

use crate::order_id::order_identifier;
use alloy::primitives::{Address, Bytes, U256};
use oif_types::abi::encode_output;
use oif_types::{
	address_to_identifier, FillInstruction, Output, ResolvedCrossChainOrder, StandardOrder,
};

/// Projects `order` as opened on `settler` into the generic resolved format:
/// outputs are what the filler spends, inputs what it receives.
pub fn resolve(chain_id: U256, settler: Address, order: &StandardOrder) -> ResolvedCrossChainOrder {
	let max_spent = order
		.outputs
		.iter()
		.map(|output| Output {
			token: output.token,
			amount: output.amount,
			recipient: output.recipient,
			chain_id: output.chain_id,
		})
		.collect();

	let min_received = order
		.inputs
		.iter()
		.map(|input| Output {
			token: address_to_identifier(input.token()),
			amount: input.amount,
			recipient: Default::default(),
			chain_id,
		})
		.collect();

	let fill_instructions = order
		.outputs
		.iter()
		.map(|output| FillInstruction {
			destination_chain_id: output.chain_id,
			destination_settler: output.remote_filler,
			origin_data: Bytes::from(encode_output(output)),
		})
		.collect();

	ResolvedCrossChainOrder {
		user: order.user,
		origin_chain_id: order.origin_chain_id,
		open_deadline: order.expires,
		fill_deadline: order.fill_deadline,
		order_id: order_identifier(chain_id, settler, order),
		max_spent,
		min_received,
		fill_instructions,
	}
}

/// Filler data does not change how a standard order resolves.
pub fn resolve_for(
	chain_id: U256,
	settler: Address,
	order: &StandardOrder,
	_filler_data: &[u8],
) -> ResolvedCrossChainOrder {
	resolve(chain_id, settler, order)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::sol_types::SolValue;
	use oif_types::{abi, Input, MandateOutput};

	#[test]
	fn test_resolve_projects_inputs_and_outputs() {
		let token = Address::repeat_byte(0x70);
		let output = MandateOutput {
			remote_filler: alloy::primitives::B256::repeat_byte(0xf1),
			chain_id: U256::from(10),
			amount: U256::from(99),
			..Default::default()
		};
		let order = StandardOrder {
			user: Address::repeat_byte(0x11),
			origin_chain_id: U256::from(1),
			expires: 500,
			fill_deadline: 400,
			inputs: vec![Input::new(Input::resource_id_for([0xaa; 12], token), U256::from(100))],
			outputs: vec![output.clone()],
			..Default::default()
		};
		let settler = Address::repeat_byte(0x5e);

		let resolved = resolve(U256::from(1), settler, &order);

		assert_eq!(resolved.open_deadline, 500);
		assert_eq!(resolved.order_id, order_identifier(U256::from(1), settler, &order));
		assert_eq!(resolved.min_received[0].token, address_to_identifier(token));
		assert_eq!(resolved.max_spent[0].amount, U256::from(99));
		assert_eq!(resolved.fill_instructions[0].destination_settler, output.remote_filler);
		let decoded = abi::MandateOutput::abi_decode(&resolved.fill_instructions[0].origin_data).unwrap();
		assert_eq!(MandateOutput::from(decoded), output);
		assert_eq!(resolve_for(U256::from(1), settler, &order, b"ignored"), resolved);
	}
}
