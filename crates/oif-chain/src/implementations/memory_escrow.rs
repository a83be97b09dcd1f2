//! In-memory incentivized message escrow.
//!
//! Submitted messages are queued with the authenticated sender attached; a
//! relayer drains the queue and delivers each message on the destination
//! side, passing the recorded sender as `from_application`.

use crate::{EscrowError, IncentiveDescription, MessageEscrow};
use alloy::primitives::{keccak256, Address, Bytes, B256};
use oif_types::{address_to_identifier, CallContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
	pub message_id: B256,
	pub source_identifier: B256,
	pub destination_identifier: B256,
	pub destination_address: B256,
	/// Identifier of the contract that submitted the message.
	pub sender: B256,
	pub message: Bytes,
	pub incentive: IncentiveDescription,
	pub deadline: u64,
}

pub struct MemoryMessageEscrow {
	address: Address,
	chain_identifier: B256,
	nonce: AtomicU64,
	pending: Mutex<Vec<PendingMessage>>,
}

impl MemoryMessageEscrow {
	/// `chain_identifier` names this escrow's chain in the transport's own
	/// namespace.
	pub fn new(address: Address, chain_identifier: B256) -> Self {
		Self {
			address,
			chain_identifier,
			nonce: AtomicU64::new(0),
			pending: Mutex::new(Vec::new()),
		}
	}

	pub fn chain_identifier(&self) -> B256 {
		self.chain_identifier
	}

	/// Removes and returns every queued message.
	pub fn drain_pending(&self) -> Vec<PendingMessage> {
		let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
		std::mem::take(&mut *pending)
	}
}

impl MessageEscrow for MemoryMessageEscrow {
	fn address(&self) -> Address {
		self.address
	}

	fn submit_message(
		&self,
		ctx: &CallContext,
		destination_identifier: B256,
		destination_address: B256,
		message: Bytes,
		incentive: &IncentiveDescription,
		deadline: u64,
	) -> Result<B256, EscrowError> {
		let now = u64::from(ctx.timestamp);
		if deadline != 0 && deadline < now {
			return Err(EscrowError::DeadlinePassed { deadline, now });
		}
		if incentive.max_gas_delivery == 0 {
			return Err(EscrowError::ZeroDeliveryGas);
		}

		let sender = address_to_identifier(ctx.caller);
		let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
		let mut preimage = Vec::with_capacity(32 * 3 + 8 + message.len());
		preimage.extend_from_slice(self.chain_identifier.as_slice());
		preimage.extend_from_slice(destination_identifier.as_slice());
		preimage.extend_from_slice(sender.as_slice());
		preimage.extend_from_slice(&nonce.to_be_bytes());
		preimage.extend_from_slice(&message);
		let message_id = keccak256(&preimage);

		debug!(%message_id, %destination_identifier, bytes = message.len(), "message queued");
		self.pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(PendingMessage {
				message_id,
				source_identifier: self.chain_identifier,
				destination_identifier,
				destination_address,
				sender,
				message,
				incentive: *incentive,
				deadline,
			});
		Ok(message_id)
	}
}
