//! EIP-712 messages the settler accepts signatures over.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};

sol! {
	/// Lets someone other than the order owner finalise to `destination`.
	#[derive(Debug, PartialEq, Eq)]
	struct AllowOpen {
		bytes32 orderId;
		address originSettler;
		bytes32 destination;
		bytes call;
	}

	/// A solver's offer to sell its claim on an order.
	#[derive(Debug, PartialEq, Eq)]
	struct OrderPurchase {
		bytes32 orderId;
		address originSettler;
		bytes32 destination;
		bytes call;
		uint64 discount;
		uint32 timeToBuy;
	}
}

pub const DOMAIN_VERSION: &str = "1";

pub fn settler_domain(name: &str, chain_id: U256, settler: Address) -> Eip712Domain {
	Eip712Domain::new(
		Some(name.to_string().into()),
		Some(DOMAIN_VERSION.into()),
		Some(chain_id),
		Some(settler),
		None,
	)
}

pub fn allow_open_hash(
	domain: &Eip712Domain,
	order_id: B256,
	settler: Address,
	destination: B256,
	call: &Bytes,
) -> B256 {
	AllowOpen {
		orderId: order_id,
		originSettler: settler,
		destination,
		call: call.clone(),
	}
	.eip712_signing_hash(domain)
}
