//! Output pricing selected by the fulfillment context.
//!
//! - empty or `0x00`: the output amount as written,
//! - `0x01 | slope(32) | stopTime(32)`: a Dutch auction paying
//!   `amount + slope * (stopTime - now)`, which decays to `amount` at
//!   `stopTime` and cannot be filled afterwards.

use crate::FillerError;
use alloy::primitives::U256;

pub const FIXED_PRICE: u8 = 0x00;
pub const DUTCH_AUCTION: u8 = 0x01;

const DUTCH_AUCTION_CONTEXT_LEN: usize = 1 + 32 + 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pricing {
	Fixed,
	DutchAuction { slope: U256, stop_time: U256 },
}

impl Pricing {
	pub fn parse(context: &[u8]) -> Result<Self, FillerError> {
		let Some(&selector) = context.first() else {
			return Ok(Pricing::Fixed);
		};
		match selector {
			FIXED_PRICE if context.len() == 1 => Ok(Pricing::Fixed),
			FIXED_PRICE => Err(FillerError::InvalidContextDataLength(context.len())),
			DUTCH_AUCTION if context.len() == DUTCH_AUCTION_CONTEXT_LEN => Ok(Pricing::DutchAuction {
				slope: U256::from_be_slice(&context[1..33]),
				stop_time: U256::from_be_slice(&context[33..65]),
			}),
			DUTCH_AUCTION => Err(FillerError::InvalidContextDataLength(context.len())),
			other => Err(FillerError::UnsupportedFulfillmentContext(other)),
		}
	}

	/// Amount a fill at `now` must deliver.
	pub fn effective_amount(&self, amount: U256, now: u32) -> Result<U256, FillerError> {
		match *self {
			Pricing::Fixed => Ok(amount),
			Pricing::DutchAuction { slope, stop_time } => {
				let now = U256::from(now);
				if now > stop_time {
					return Err(FillerError::AuctionEnded { stop_time, now });
				}
				slope
					.checked_mul(stop_time - now)
					.and_then(|premium| premium.checked_add(amount))
					.ok_or(FillerError::AmountOverflow)
			}
		}
	}
}

/// Encodes a Dutch auction fulfillment context.
pub fn dutch_auction_context(slope: U256, stop_time: u32) -> Vec<u8> {
	let mut context = Vec::with_capacity(DUTCH_AUCTION_CONTEXT_LEN);
	context.push(DUTCH_AUCTION);
	context.extend_from_slice(&slope.to_be_bytes::<32>());
	context.extend_from_slice(&U256::from(stop_time).to_be_bytes::<32>());
	context
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_fixed_contexts() {
		assert_eq!(Pricing::parse(&[]).unwrap(), Pricing::Fixed);
		assert_eq!(Pricing::parse(&[0x00]).unwrap(), Pricing::Fixed);
		assert_eq!(
			Pricing::parse(&[0x00, 0x01]),
			Err(FillerError::InvalidContextDataLength(2))
		);
		assert_eq!(
			Pricing::Fixed.effective_amount(U256::from(7), u32::MAX).unwrap(),
			U256::from(7)
		);
	}

	#[test]
	fn test_dutch_auction_decays_until_stop_time() {
		let pricing = Pricing::parse(&dutch_auction_context(U256::from(10), 1000)).unwrap();
		let base = U256::from(500);

		let mut previous = pricing.effective_amount(base, 900).unwrap();
		assert_eq!(previous, U256::from(1500));
		for now in [901, 950, 999, 1000] {
			let amount = pricing.effective_amount(base, now).unwrap();
			assert!(amount < previous);
			previous = amount;
		}
		assert_eq!(previous, base);
		assert!(matches!(
			pricing.effective_amount(base, 1001),
			Err(FillerError::AuctionEnded { .. })
		));
	}

	#[test]
	fn test_malformed_and_unknown_contexts() {
		let mut context = dutch_auction_context(U256::from(1), 10);
		context.pop();
		assert_eq!(
			Pricing::parse(&context),
			Err(FillerError::InvalidContextDataLength(64))
		);
		assert_eq!(
			Pricing::parse(&[0x07]),
			Err(FillerError::UnsupportedFulfillmentContext(0x07))
		);
	}

	#[test]
	fn test_premium_overflow_is_an_error() {
		let pricing = Pricing::parse(&dutch_auction_context(U256::MAX, 10)).unwrap();
		assert_eq!(
			pricing.effective_amount(U256::from(1), 0),
			Err(FillerError::AmountOverflow)
		);
	}
}
