//! Order purchases.
//!
//! A solver that filled an order can sell its claim on the inputs: the
//! purchaser pays the inputs less a discount right away and takes over the
//! claim. A purchase only counts for fills that happened at least
//! `time_to_buy` seconds before it, so a purchaser has time to check the
//! fills it pays for.

use crate::governance::FEE_DENOMINATOR;
use crate::typed_data;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};

/// Terms of a purchase, as signed by the solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
	pub order_id: B256,
	/// Receives the purchaser's payment.
	pub destination: B256,
	/// Optional `orderFinalised` callback on the destination.
	pub call: Bytes,
	/// Fraction of each input kept by the purchaser, 18-decimal fixed point.
	pub discount: u64,
	pub time_to_buy: u32,
}

impl Purchase {
	pub fn signing_hash(&self, domain: &Eip712Domain, settler: Address) -> B256 {
		typed_data::OrderPurchase {
			orderId: self.order_id,
			originSettler: settler,
			destination: self.destination,
			call: self.call.clone(),
			discount: self.discount,
			timeToBuy: self.time_to_buy,
		}
		.eip712_signing_hash(domain)
	}

	/// `amount - amount × discount / 10^18`.
	pub fn discounted(&self, amount: U256) -> U256 {
		let discount = U256::from(self.discount);
		let kept = match amount.checked_mul(discount) {
			Some(product) => product / FEE_DENOMINATOR,
			None => amount / FEE_DENOMINATOR * discount,
		};
		amount.saturating_sub(kept)
	}
}

/// A completed purchase of `(solver, order_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseRecord {
	/// Fills strictly before this instant belong to the purchaser.
	pub cutoff: u32,
	pub purchaser: B256,
}

/// Who may claim an order `solver` filled at `timestamps`.
pub fn order_owner(record: Option<PurchaseRecord>, solver: B256, timestamps: &[u32]) -> B256 {
	match (record, timestamps.iter().min()) {
		(Some(record), Some(&earliest)) if earliest < record.cutoff => record.purchaser,
		_ => solver,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_purchase_cutoff_decides_owner() {
		let solver = B256::repeat_byte(0x50);
		let purchaser = B256::repeat_byte(0x9a);
		let record = Some(PurchaseRecord {
			cutoff: 10_000 - 1_000,
			purchaser,
		});

		assert_eq!(order_owner(record, solver, &[9_500]), solver);
		assert_eq!(order_owner(record, solver, &[8_500]), purchaser);
		assert_eq!(order_owner(record, solver, &[9_500, 8_500]), purchaser);
		assert_eq!(order_owner(record, solver, &[9_000]), solver);
		assert_eq!(order_owner(None, solver, &[1]), solver);
		assert_eq!(order_owner(record, solver, &[]), solver);
	}

	#[test]
	fn test_discount_is_floored() {
		let purchase = Purchase {
			order_id: B256::ZERO,
			destination: B256::ZERO,
			call: Bytes::new(),
			discount: 100_000_000_000_000_000,
			time_to_buy: 0,
		};
		assert_eq!(purchase.discounted(U256::from(1000)), U256::from(900));
		assert_eq!(purchase.discounted(U256::from(9)), U256::from(9));
	}
}
