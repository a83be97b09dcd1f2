//! Execution context of a single state transition.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Gas budget given to a transition when none is specified.
pub const DEFAULT_GAS_LEFT: u64 = 30_000_000;

/// Environment of one call: which chain it executes on, the block time, the
/// authenticated caller, and the gas still available for external calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
	pub chain_id: u64,
	pub timestamp: u32,
	pub caller: Address,
	pub gas_left: u64,
}

impl CallContext {
	pub fn new(chain_id: u64, timestamp: u32, caller: Address) -> Self {
		Self {
			chain_id,
			timestamp,
			caller,
			gas_left: DEFAULT_GAS_LEFT,
		}
	}

	pub fn with_gas(mut self, gas_left: u64) -> Self {
		self.gas_left = gas_left;
		self
	}

	/// Context for a nested call made by `caller` within the same block.
	pub fn with_caller(mut self, caller: Address) -> Self {
		self.caller = caller;
		self
	}

	pub fn chain_id_u256(&self) -> U256 {
		U256::from(self.chain_id)
	}

	/// Gas that can be forwarded to a sub-call (all but one 64th).
	pub fn forwardable_gas(&self) -> u64 {
		self.gas_left - self.gas_left / 64
	}
}
