//! Timelocked governance fee.
//!
//! The fee is a fraction of every released input, in 18-decimal fixed point.
//! Changes are scheduled by the owner and only take effect once
//! [`GOVERNANCE_FEE_CHANGE_DELAY`] has passed.

use crate::SettlerError;
use alloy::primitives::{Address, U256};
use arc_swap::ArcSwap;
use oif_types::{CallContext, EventBus, ProtocolEvent, SettlerEvent};
use std::sync::Arc;
use tracing::info;

/// Fixed-point denominator, `10^18`.
pub const FEE_DENOMINATOR: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// 10%.
pub const MAX_GOVERNANCE_FEE: U256 = U256::from_limbs([100_000_000_000_000_000, 0, 0, 0]);

/// Seven days.
pub const GOVERNANCE_FEE_CHANGE_DELAY: u32 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFee {
	pub fee: U256,
	pub effective_at: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSchedule {
	pub fee: U256,
	pub pending: Option<PendingFee>,
}

pub struct GovernanceFee {
	owner: Address,
	recipient: Address,
	schedule: ArcSwap<FeeSchedule>,
	events: EventBus,
}

impl GovernanceFee {
	pub fn new(
		owner: Address,
		recipient: Address,
		initial_fee: U256,
		events: EventBus,
	) -> Result<Self, SettlerError> {
		if initial_fee > MAX_GOVERNANCE_FEE {
			return Err(SettlerError::GovernanceFeeTooHigh(initial_fee));
		}
		Ok(Self {
			owner,
			recipient,
			schedule: ArcSwap::from_pointee(FeeSchedule {
				fee: initial_fee,
				pending: None,
			}),
			events,
		})
	}

	pub fn owner(&self) -> Address {
		self.owner
	}

	pub fn recipient(&self) -> Address {
		self.recipient
	}

	pub fn current(&self) -> U256 {
		self.schedule.load().fee
	}

	pub fn pending(&self) -> Option<PendingFee> {
		self.schedule.load().pending
	}

	/// Schedules `fee` to become effective after the change delay. Replaces
	/// any change already scheduled.
	pub fn set_governance_fee(&self, ctx: &CallContext, fee: U256) -> Result<u32, SettlerError> {
		if ctx.caller != self.owner {
			return Err(SettlerError::NotOwner(ctx.caller));
		}
		if fee > MAX_GOVERNANCE_FEE {
			return Err(SettlerError::GovernanceFeeTooHigh(fee));
		}
		let effective_at = ctx.timestamp.saturating_add(GOVERNANCE_FEE_CHANGE_DELAY);
		self.schedule.rcu(|schedule| FeeSchedule {
			fee: schedule.fee,
			pending: Some(PendingFee { fee, effective_at }),
		});

		info!(%fee, effective_at, "governance fee change scheduled");
		self.events
			.publish(ProtocolEvent::Settler(SettlerEvent::GovernanceFeeScheduled {
				fee,
				effective_at,
			}))
			.ok();
		Ok(effective_at)
	}

	/// Applies the scheduled change once it is due. Anyone may call this.
	pub fn apply_governance_fee(&self, ctx: &CallContext) -> Result<U256, SettlerError> {
		loop {
			let current = self.schedule.load_full();
			let pending = current.pending.ok_or(SettlerError::NoPendingGovernanceFee)?;
			if ctx.timestamp < pending.effective_at {
				return Err(SettlerError::GovernanceFeeChangeNotReady {
					effective_at: pending.effective_at,
					now: ctx.timestamp,
				});
			}

			let next = Arc::new(FeeSchedule {
				fee: pending.fee,
				pending: None,
			});
			let previous = self.schedule.compare_and_swap(&current, next);
			if Arc::ptr_eq(&previous, &current) {
				info!(old_fee = %current.fee, new_fee = %pending.fee, "governance fee changed");
				self.events
					.publish(ProtocolEvent::Settler(SettlerEvent::GovernanceFeeChanged {
						old_fee: current.fee,
						new_fee: pending.fee,
					}))
					.ok();
				return Ok(pending.fee);
			}
		}
	}

	/// `amount × fee / 10^18`, rounded down.
	pub fn calculate_fee(&self, amount: U256) -> U256 {
		let fee = self.current();
		match amount.checked_mul(fee) {
			Some(product) => product / FEE_DENOMINATOR,
			None => amount / FEE_DENOMINATOR * fee,
		}
	}
}
