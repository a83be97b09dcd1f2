//! In-memory token ledger.
//!
//! Balances and allowances for every token live behind one mutex so batch
//! transfers apply atomically.

use crate::{LedgerError, TokenLedger, Transfer};
use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
struct LedgerState {
	balances: HashMap<(Address, Address), U256>,
	allowances: HashMap<(Address, Address, Address), U256>,
}

impl LedgerState {
	fn balance(&self, token: Address, owner: Address) -> U256 {
		self.balances
			.get(&(token, owner))
			.copied()
			.unwrap_or_default()
	}

	fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
		self.allowances
			.get(&(token, owner, spender))
			.copied()
			.unwrap_or_default()
	}

	fn spend_allowance(&mut self, spender: Address, t: &Transfer) -> Result<(), LedgerError> {
		if spender == t.from {
			return Ok(());
		}
		let available = self.allowance(t.token, t.from, spender);
		if available == U256::MAX {
			return Ok(());
		}
		if available < t.amount {
			return Err(LedgerError::InsufficientAllowance {
				token: t.token,
				owner: t.from,
				spender,
				needed: t.amount,
				available,
			});
		}
		self.allowances
			.insert((t.token, t.from, spender), available - t.amount);
		Ok(())
	}

	fn move_balance(&mut self, t: &Transfer) -> Result<(), LedgerError> {
		let available = self.balance(t.token, t.from);
		if available < t.amount {
			return Err(LedgerError::InsufficientBalance {
				token: t.token,
				owner: t.from,
				needed: t.amount,
				available,
			});
		}
		self.balances.insert((t.token, t.from), available - t.amount);
		let credited = self
			.balance(t.token, t.to)
			.checked_add(t.amount)
			.ok_or(LedgerError::Overflow)?;
		self.balances.insert((t.token, t.to), credited);
		Ok(())
	}
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
	state: Mutex<LedgerState>,
}

impl MemoryLedger {
	pub fn new() -> Self {
		Self::default()
	}

	fn state(&self) -> MutexGuard<'_, LedgerState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Credits `owner` with freshly created tokens.
	pub fn mint(&self, token: Address, owner: Address, amount: U256) -> Result<(), LedgerError> {
		let mut state = self.state();
		let balance = state
			.balance(token, owner)
			.checked_add(amount)
			.ok_or(LedgerError::Overflow)?;
		state.balances.insert((token, owner), balance);
		Ok(())
	}
}

impl TokenLedger for MemoryLedger {
	fn balance_of(&self, token: Address, owner: Address) -> U256 {
		self.state().balance(token, owner)
	}

	fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
		self.state().allowance(token, owner, spender)
	}

	fn approve(&self, token: Address, owner: Address, spender: Address, amount: U256) {
		self.state()
			.allowances
			.insert((token, owner, spender), amount);
	}

	fn transfer(
		&self,
		token: Address,
		owner: Address,
		to: Address,
		amount: U256,
	) -> Result<(), LedgerError> {
		self.state().move_balance(&Transfer {
			token,
			from: owner,
			to,
			amount,
		})
	}

	fn transfer_from(&self, spender: Address, transfer: &Transfer) -> Result<(), LedgerError> {
		self.transfer_from_batch(spender, std::slice::from_ref(transfer))
	}

	fn transfer_from_batch(&self, spender: Address, transfers: &[Transfer]) -> Result<(), LedgerError> {
		let mut state = self.state();
		let mut scratch = state.clone();
		for transfer in transfers {
			scratch.spend_allowance(spender, transfer)?;
			scratch.move_balance(transfer)?;
		}
		*state = scratch;
		Ok(())
	}
}
