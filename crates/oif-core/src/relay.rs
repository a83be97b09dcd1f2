//! Off-chain relaying between in-memory deployments.

use crate::{Deployment, DeploymentError};
use oif_chain::implementations::memory_escrow::MemoryMessageEscrow;
use oif_types::CallContext;
use tracing::debug;

/// Delivers every message queued on `source` to the relay oracle of
/// `destination` it is addressed to, the way the transport would: the
/// destination escrow is the caller and the queued sender is passed through
/// as the authenticated remote application.
///
/// Returns the number of messages delivered. The queue is drained up front,
/// so messages after a failing one are dropped.
pub fn deliver_pending(
	source: &MemoryMessageEscrow,
	destination: &Deployment,
	timestamp: u32,
) -> Result<usize, DeploymentError> {
	let escrow = destination
		.services()
		.escrow
		.as_ref()
		.ok_or_else(|| DeploymentError::MissingService {
			implementation: "relay".to_string(),
			service: "message escrow",
		})?;
	let ctx = CallContext::new(destination.chain_id(), timestamp, escrow.address());

	let mut delivered = 0;
	for message in source.drain_pending() {
		let oracle = destination
			.relay_oracles()
			.find(|oracle| oracle.identifier() == message.destination_address)
			.ok_or(DeploymentError::UnknownRelayDestination(message.destination_address))?;
		oracle.receive_message(
			&ctx,
			message.source_identifier,
			message.message_id,
			message.sender,
			&message.message,
		)?;
		debug!(message_id = %message.message_id, "message delivered");
		delivered += 1;
	}
	Ok(delivered)
}
