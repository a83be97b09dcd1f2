//! Protocol events and the broadcast bus components publish them on.

use crate::order::{MandateOutput, StandardOrder};
use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProtocolEvent {
	Settler(SettlerEvent),
	Filler(FillerEvent),
	Oracle(OracleEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettlerEvent {
	Open {
		order_id: B256,
		order: StandardOrder,
	},
	Finalised {
		order_id: B256,
		solver: B256,
		destination: B256,
	},
	OrderPurchased {
		order_id: B256,
		solver: B256,
		purchaser: B256,
	},
	GovernanceFeeScheduled {
		fee: U256,
		effective_at: u32,
	},
	GovernanceFeeChanged {
		old_fee: U256,
		new_fee: U256,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FillerEvent {
	OutputFilled {
		order_id: B256,
		solver: B256,
		timestamp: u32,
		output: MandateOutput,
		final_amount: U256,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OracleEvent {
	OutputProven {
		chain_id: U256,
		oracle: B256,
		application: B256,
		payload_hash: B256,
	},
	OutputClaimed {
		order_id: B256,
		output_id: B256,
		solver: B256,
		sponsor: Address,
	},
	OutputDisputed {
		order_id: B256,
		output_id: B256,
		disputer: Address,
	},
	OutputOptimisticallyVerified {
		order_id: B256,
		output_id: B256,
	},
	DisputeFinalised {
		order_id: B256,
		output_id: B256,
		disputer: Address,
	},
	MessageSubmitted {
		message_id: B256,
		destination_chain_id: u64,
		payload_count: usize,
	},
}

pub struct EventBus {
	sender: broadcast::Sender<ProtocolEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: ProtocolEvent,
	) -> Result<(), broadcast::error::SendError<ProtocolEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}
