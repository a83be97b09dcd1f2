//! In-memory external call dispatch.
//!
//! Contracts are modelled as handlers registered per address. Addresses
//! without a handler behave like externally owned accounts: the call
//! succeeds and uses no gas.

use crate::{CallOutcome, CallRequest, ExternalCaller};
use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;

pub type CallHandler = Arc<dyn Fn(&CallRequest) -> CallOutcome + Send + Sync>;

#[derive(Default)]
pub struct CallRouter {
	handlers: DashMap<Address, CallHandler>,
}

impl CallRouter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, target: Address, handler: CallHandler) {
		self.handlers.insert(target, handler);
	}
}

impl ExternalCaller for CallRouter {
	fn call(&self, request: &CallRequest) -> CallOutcome {
		let handler = match self.handlers.get(&request.to) {
			Some(handler) => handler.clone(),
			None => {
				return CallOutcome {
					success: true,
					gas_used: 0,
				}
			}
		};

		let outcome = handler(request);
		if outcome.gas_used > request.gas_limit {
			// Out of gas: the callee consumed everything it was given.
			return CallOutcome {
				success: false,
				gas_used: request.gas_limit,
			};
		}
		outcome
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::Bytes;

	fn request(to: Address, gas_limit: u64) -> CallRequest {
		CallRequest {
			from: Address::ZERO,
			to,
			data: Bytes::new(),
			gas_limit,
		}
	}

	#[test]
	fn test_unknown_target_succeeds() {
		let router = CallRouter::new();
		let outcome = router.call(&request(Address::repeat_byte(1), 10));
		assert!(outcome.success);
		assert_eq!(outcome.gas_used, 0);
	}

	#[test]
	fn test_handler_exceeding_gas_fails() {
		let router = CallRouter::new();
		router.register(
			Address::repeat_byte(2),
			Arc::new(|_| CallOutcome {
				success: true,
				gas_used: 50_000,
			}),
		);

		assert!(router.call(&request(Address::repeat_byte(2), 60_000)).success);
		let starved = router.call(&request(Address::repeat_byte(2), 40_000));
		assert!(!starved.success);
		assert_eq!(starved.gas_used, 40_000);
	}
}
