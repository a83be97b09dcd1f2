//! In-memory resource lock registry.
//!
//! Holds deposited tokens on its own ledger account, tracks per-sponsor
//! locked balances, registered claim hashes and consumed nonces.

use crate::{
	batch_claim_hash, BatchClaim, LockError, ResourceLock, SignatureVerifier, TokenLedger, Transfer,
};
use alloy::primitives::{Address, B256, U256};
use dashmap::{DashMap, DashSet};
use oif_types::{truncate_to_address, u256_to_word, CallContext};
use std::sync::Arc;
use tracing::debug;

pub struct MemoryResourceLock {
	address: Address,
	ledger: Arc<dyn TokenLedger>,
	verifier: Arc<dyn SignatureVerifier>,
	allocator: Option<Address>,
	balances: DashMap<(Address, U256), U256>,
	registered: DashSet<(Address, B256)>,
	consumed: DashSet<(Address, U256)>,
}

impl MemoryResourceLock {
	pub fn new(
		address: Address,
		ledger: Arc<dyn TokenLedger>,
		verifier: Arc<dyn SignatureVerifier>,
	) -> Self {
		Self {
			address,
			ledger,
			verifier,
			allocator: None,
			balances: DashMap::new(),
			registered: DashSet::new(),
			consumed: DashSet::new(),
		}
	}

	/// Requires every claim to carry the allocator's signature.
	pub fn with_allocator(mut self, allocator: Address) -> Self {
		self.allocator = Some(allocator);
		self
	}

	fn token_of(id: U256) -> Address {
		truncate_to_address(u256_to_word(id))
	}

	fn authorize(&self, claim: &BatchClaim, claim_hash: B256) -> Result<(), LockError> {
		let registered = self.registered.contains(&(claim.sponsor, claim_hash));
		if !registered
			&& !self
				.verifier
				.is_valid_signature(claim.sponsor, claim_hash, &claim.sponsor_signature)
		{
			return Err(LockError::InvalidSponsorSignature);
		}
		if let Some(allocator) = self.allocator {
			if !self
				.verifier
				.is_valid_signature(allocator, claim_hash, &claim.allocator_data)
			{
				return Err(LockError::InvalidAllocatorSignature);
			}
		}
		Ok(())
	}

	fn check_allocations(claim: &BatchClaim) -> Result<Vec<(U256, U256)>, LockError> {
		for component in &claim.claims {
			let total = component
				.portions
				.iter()
				.try_fold(U256::ZERO, |acc, p| acc.checked_add(p.amount))
				.ok_or(LockError::AllocationMismatch { id: component.id })?;
			if total != component.allocated_amount {
				return Err(LockError::AllocationMismatch { id: component.id });
			}
		}

		let mut needed: Vec<(U256, U256)> = Vec::new();
		for component in &claim.claims {
			match needed.iter_mut().find(|(id, _)| *id == component.id) {
				Some((_, amount)) => {
					*amount = amount
						.checked_add(component.allocated_amount)
						.ok_or(LockError::AllocationMismatch { id: component.id })?
				}
				None => needed.push((component.id, component.allocated_amount)),
			}
		}
		Ok(needed)
	}

	/// Checks and debits each lock under its own entry guard. Locks debited
	/// before a shortfall is found are credited back.
	fn reserve(&self, sponsor: Address, needed: &[(U256, U256)]) -> Result<(), LockError> {
		for (position, (id, amount)) in needed.iter().enumerate() {
			let mut balance = self.balances.entry((sponsor, *id)).or_default();
			if *balance < *amount {
				let available = *balance;
				drop(balance);
				for (id, amount) in &needed[..position] {
					self.credit(sponsor, *id, *amount);
				}
				return Err(LockError::InsufficientLockedBalance {
					id: *id,
					needed: *amount,
					available,
				});
			}
			*balance -= *amount;
		}
		Ok(())
	}

	fn credit(&self, sponsor: Address, id: U256, amount: U256) {
		*self.balances.entry((sponsor, id)).or_default() += amount;
	}
}

impl ResourceLock for MemoryResourceLock {
	fn address(&self) -> Address {
		self.address
	}

	fn deposit_and_register(
		&self,
		ctx: &CallContext,
		sponsor: Address,
		ids_and_amounts: &[[U256; 2]],
		claim_hash: B256,
	) -> Result<(), LockError> {
		let transfers: Vec<Transfer> = ids_and_amounts
			.iter()
			.map(|[id, amount]| Transfer {
				token: Self::token_of(*id),
				from: ctx.caller,
				to: self.address,
				amount: *amount,
			})
			.collect();
		self.ledger.transfer_from_batch(self.address, &transfers)?;

		for [id, amount] in ids_and_amounts {
			self.credit(sponsor, *id, *amount);
		}
		self.registered.insert((sponsor, claim_hash));
		debug!(%sponsor, %claim_hash, locks = ids_and_amounts.len(), "deposited and registered");
		Ok(())
	}

	fn batch_claim(&self, ctx: &CallContext, claim: &BatchClaim) -> Result<B256, LockError> {
		if ctx.timestamp > claim.expires {
			return Err(LockError::Expired {
				expires: claim.expires,
				now: ctx.timestamp,
			});
		}

		if self.is_nonce_consumed(claim.sponsor, claim.nonce) {
			return Err(LockError::NonceConsumed {
				sponsor: claim.sponsor,
				nonce: claim.nonce,
			});
		}

		let claim_hash = batch_claim_hash(
			ctx.caller,
			claim.sponsor,
			claim.nonce,
			claim.expires,
			&claim.ids_and_amounts(),
			claim.witness,
		);
		self.authorize(claim, claim_hash)?;
		let needed = Self::check_allocations(claim)?;

		if !self.consumed.insert((claim.sponsor, claim.nonce)) {
			return Err(LockError::NonceConsumed {
				sponsor: claim.sponsor,
				nonce: claim.nonce,
			});
		}

		if let Err(e) = self.reserve(claim.sponsor, &needed) {
			self.consumed.remove(&(claim.sponsor, claim.nonce));
			return Err(e);
		}

		let payouts: Vec<Transfer> = claim
			.claims
			.iter()
			.flat_map(|component| {
				let token = Self::token_of(component.id);
				component
					.portions
					.iter()
					.filter(|p| !p.amount.is_zero())
					.map(move |p| Transfer {
						token,
						from: self.address,
						to: p.claimant,
						amount: p.amount,
					})
			})
			.collect();

		if let Err(e) = self.ledger.transfer_from_batch(self.address, &payouts) {
			for (id, amount) in &needed {
				self.credit(claim.sponsor, *id, *amount);
			}
			self.consumed.remove(&(claim.sponsor, claim.nonce));
			return Err(e.into());
		}

		self.registered.remove(&(claim.sponsor, claim_hash));
		debug!(sponsor = %claim.sponsor, nonce = %claim.nonce, %claim_hash, "batch claim released");
		Ok(claim_hash)
	}

	fn locked_balance(&self, sponsor: Address, id: U256) -> U256 {
		self.balances
			.get(&(sponsor, id))
			.map(|b| *b)
			.unwrap_or_default()
	}

	fn is_nonce_consumed(&self, sponsor: Address, nonce: U256) -> bool {
		self.consumed.contains(&(sponsor, nonce))
	}
}
