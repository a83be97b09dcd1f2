//! Message-relay oracle.
//!
//! On the chain where outputs are filled, [`MessageRelayOracle::submit`]
//! bundles payloads into one message and hands it to the incentivized
//! escrow. The payloads must be vouched for by the
//! [`PayloadCreator`](crate::PayloadCreator) deployed at the source address,
//! and that address is the application they are attested under. On the
//! origin chain the escrow calls [`MessageRelayOracle::receive_message`],
//! which records every payload under the source chain and the authenticated
//! remote sender.

use crate::{
	AttestationKey, AttestationQuery, AttestationStore, AttestationView, OracleError,
	PayloadCreatorRegistry,
};
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use oif_chain::{IncentiveDescription, MessageEscrow};
use oif_codec::{decode_message, encode_message};
use oif_types::{
	address_to_identifier, get_address, get_bytes32, get_u64, CallContext, ConfigSchema, EventBus,
	Field, FieldType, OracleEvent, ProtocolEvent, Schema, ValidationError,
};
use std::sync::Arc;
use tracing::{debug, info};

pub struct MessageRelayOracle {
	address: Address,
	identifier: B256,
	owner: Address,
	escrow: Arc<dyn MessageEscrow>,
	sources: Arc<PayloadCreatorRegistry>,
	store: AttestationStore,
	/// Transport chain identifier to chain id.
	chain_ids: DashMap<B256, u64>,
	/// Chain id to transport chain identifier.
	transport_ids: DashMap<u64, B256>,
	events: EventBus,
}

impl MessageRelayOracle {
	pub fn new(
		address: Address,
		owner: Address,
		escrow: Arc<dyn MessageEscrow>,
		sources: Arc<PayloadCreatorRegistry>,
		events: EventBus,
	) -> Self {
		Self {
			address,
			identifier: address_to_identifier(address),
			owner,
			escrow,
			sources,
			store: AttestationStore::new(),
			chain_ids: DashMap::new(),
			transport_ids: DashMap::new(),
			events,
		}
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn identifier(&self) -> B256 {
		self.identifier
	}

	pub fn chain_id_of(&self, transport_identifier: &B256) -> Option<u64> {
		self.chain_ids.get(transport_identifier).map(|c| *c)
	}

	/// Binds a transport chain identifier to a chain id, in both directions.
	/// Owner only; each side can be bound once.
	pub fn set_chain_map(
		&self,
		ctx: &CallContext,
		transport_identifier: B256,
		chain_id: u64,
	) -> Result<(), OracleError> {
		if ctx.caller != self.owner {
			return Err(OracleError::NotOwner(ctx.caller));
		}
		if transport_identifier.is_zero() || chain_id == 0 {
			return Err(OracleError::ZeroValue);
		}

		match self.chain_ids.entry(transport_identifier) {
			Entry::Occupied(_) => return Err(OracleError::ChainIdentifierAlreadySet),
			Entry::Vacant(slot) => {
				slot.insert(chain_id);
			}
		}
		match self.transport_ids.entry(chain_id) {
			Entry::Occupied(_) => {
				self.chain_ids.remove(&transport_identifier);
				return Err(OracleError::ChainIdentifierAlreadySet);
			}
			Entry::Vacant(slot) => {
				slot.insert(transport_identifier);
			}
		}

		info!(%transport_identifier, chain_id, "chain identifier mapped");
		Ok(())
	}

	/// Relays payloads the creator deployed at `source` vouches for to
	/// `destination_oracle` on `destination_chain_id`. The message carries
	/// `source` as the application. Returns the transport's message id.
	#[allow(clippy::too_many_arguments)]
	pub fn submit(
		&self,
		ctx: &CallContext,
		source: Address,
		destination_chain_id: u64,
		destination_oracle: B256,
		payloads: &[Bytes],
		incentive: &IncentiveDescription,
		deadline: u64,
	) -> Result<B256, OracleError> {
		let creator = self
			.sources
			.get(&source)
			.ok_or(OracleError::UnknownPayloadCreator(source))?;
		if !creator.are_payloads_valid(payloads) {
			return Err(OracleError::NotAllPayloadsValid);
		}
		let destination_identifier = self
			.transport_ids
			.get(&destination_chain_id)
			.map(|id| *id)
			.ok_or(OracleError::UnknownChain(destination_chain_id))?;

		let message = encode_message(address_to_identifier(source), payloads)?;
		let message_id = self.escrow.submit_message(
			&ctx.with_caller(self.address),
			destination_identifier,
			destination_oracle,
			message,
			incentive,
			deadline,
		)?;

		info!(%message_id, %source, destination_chain_id, payloads = payloads.len(), "payloads submitted");
		self.events
			.publish(ProtocolEvent::Oracle(OracleEvent::MessageSubmitted {
				message_id,
				destination_chain_id,
				payload_count: payloads.len(),
			}))
			.ok();
		Ok(message_id)
	}

	/// Entry point for the escrow. `from_application` is the sender the
	/// transport authenticated on the source chain; it is the only sender
	/// identity attestations are recorded under.
	pub fn receive_message(
		&self,
		ctx: &CallContext,
		source_identifier: B256,
		message_id: B256,
		from_application: B256,
		message: &[u8],
	) -> Result<Bytes, OracleError> {
		if ctx.caller != self.escrow.address() {
			return Err(OracleError::UnauthorizedTransport(ctx.caller));
		}
		let source_chain = self
			.chain_id_of(&source_identifier)
			.ok_or(OracleError::UnknownChainIdentifier(source_identifier))?;
		let (application, payloads) = decode_message(message)?;

		let chain_id = U256::from(source_chain);
		for payload in payloads {
			let payload_hash = keccak256(payload);
			self.store.record(AttestationKey {
				chain_id,
				oracle: from_application,
				application,
				payload_hash,
			});
			self.events
				.publish(ProtocolEvent::Oracle(OracleEvent::OutputProven {
					chain_id,
					oracle: from_application,
					application,
					payload_hash,
				}))
				.ok();
		}

		debug!(%message_id, source_chain, %from_application, "message received");
		Ok(Bytes::new())
	}
}

impl AttestationQuery for MessageRelayOracle {
	fn attestations(&self) -> AttestationView<'_> {
		self.store.view()
	}
}

pub struct RelayOracleSchema;

impl ConfigSchema for RelayOracleSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let chain_entry = Schema::new(
			vec![
				Field::new("identifier", FieldType::Bytes32),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![],
		);
		let schema = Schema::new(
			vec![
				Field::new("address", FieldType::Address),
				Field::new("owner", FieldType::Address),
			],
			vec![Field::new("chains", FieldType::Table(Schema::new(vec![], vec![])))
				.with_validator(move |value| {
					let table = value.as_table().ok_or("chains must be a table")?;
					for (name, entry) in table {
						chain_entry
							.validate(entry)
							.map_err(|e| format!("chains.{}: {}", name, e))?;
					}
					Ok(())
				})],
		);
		schema.validate(config)
	}
}

/// Factory function to create a relay oracle from configuration.
///
/// Required configuration parameters:
/// - `address`: Address the oracle is deployed at
/// - `owner`: Account allowed to bind chain identifiers
///
/// Optional configuration parameters:
/// - `chains.<name>`: `{ identifier, chain_id }` bindings applied at construction
///
/// `sources` is the chain's registry of deployed payload creators.
pub fn create_relay_oracle(
	config: &toml::Value,
	escrow: Arc<dyn MessageEscrow>,
	sources: Arc<PayloadCreatorRegistry>,
	events: EventBus,
) -> Result<MessageRelayOracle, OracleError> {
	RelayOracleSchema.validate(config)?;
	let address = get_address(config, "address")?;
	let owner = get_address(config, "owner")?;
	let oracle = MessageRelayOracle::new(address, owner, escrow, sources, events);

	if let Some(chains) = config.get("chains").and_then(|v| v.as_table()) {
		let ctx = CallContext::new(0, 0, owner);
		for entry in chains.values() {
			let identifier = get_bytes32(entry, "identifier")?;
			let chain_id = get_u64(entry, "chain_id", None)?;
			oracle.set_chain_map(&ctx, identifier, chain_id)?;
		}
	}
	Ok(oracle)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::PayloadCreator;
	use oif_chain::implementations::memory_escrow::MemoryMessageEscrow;
	use std::collections::HashSet;

	const OWNER: Address = Address::repeat_byte(0x0e);
	const ESCROW: Address = Address::repeat_byte(0xe5);

	const CREATOR: Address = Address::repeat_byte(0xf1);

	struct FixedCreator {
		valid: HashSet<Bytes>,
	}

	impl PayloadCreator for FixedCreator {
		fn are_payloads_valid(&self, payloads: &[Bytes]) -> bool {
			payloads.iter().all(|p| self.valid.contains(p))
		}
	}

	fn oracle(escrow: Arc<MemoryMessageEscrow>, address: Address) -> MessageRelayOracle {
		oracle_with_sources(escrow, address, Arc::new(PayloadCreatorRegistry::new()))
	}

	fn oracle_with_sources(
		escrow: Arc<MemoryMessageEscrow>,
		address: Address,
		sources: Arc<PayloadCreatorRegistry>,
	) -> MessageRelayOracle {
		MessageRelayOracle::new(address, OWNER, escrow, sources, EventBus::new(16))
	}

	fn sources_with(valid: HashSet<Bytes>) -> Arc<PayloadCreatorRegistry> {
		let sources = Arc::new(PayloadCreatorRegistry::new());
		assert!(sources.register(CREATOR, Arc::new(FixedCreator { valid })));
		sources
	}

	fn incentive() -> IncentiveDescription {
		IncentiveDescription {
			max_gas_delivery: 100_000,
			..Default::default()
		}
	}

	#[test]
	fn test_chain_map_is_owner_only_and_set_once() {
		let escrow = Arc::new(MemoryMessageEscrow::new(ESCROW, B256::repeat_byte(1)));
		let oracle = oracle(escrow, Address::repeat_byte(0x01));
		let owner = CallContext::new(1, 0, OWNER);

		assert_eq!(
			oracle.set_chain_map(&CallContext::new(1, 0, Address::repeat_byte(9)), B256::repeat_byte(2), 10),
			Err(OracleError::NotOwner(Address::repeat_byte(9)))
		);
		assert_eq!(oracle.set_chain_map(&owner, B256::ZERO, 10), Err(OracleError::ZeroValue));
		oracle.set_chain_map(&owner, B256::repeat_byte(2), 10).unwrap();
		assert_eq!(
			oracle.set_chain_map(&owner, B256::repeat_byte(2), 11),
			Err(OracleError::ChainIdentifierAlreadySet)
		);
		assert_eq!(
			oracle.set_chain_map(&owner, B256::repeat_byte(3), 10),
			Err(OracleError::ChainIdentifierAlreadySet)
		);
		assert_eq!(oracle.chain_id_of(&B256::repeat_byte(3)), None);
	}

	#[test]
	fn test_submit_and_receive_records_under_sender() {
		let source_escrow = Arc::new(MemoryMessageEscrow::new(ESCROW, B256::repeat_byte(0xd1)));
		let destination_escrow = Arc::new(MemoryMessageEscrow::new(ESCROW, B256::repeat_byte(0x01)));
		let payload = Bytes::from(vec![1, 2, 3]);
		let remote = oracle_with_sources(
			source_escrow.clone(),
			Address::repeat_byte(0x0d),
			sources_with(HashSet::from([payload.clone()])),
		);
		let local = oracle(destination_escrow, Address::repeat_byte(0x0a));

		remote
			.set_chain_map(&CallContext::new(10, 0, OWNER), B256::repeat_byte(0x01), 1)
			.unwrap();
		local
			.set_chain_map(&CallContext::new(1, 0, OWNER), B256::repeat_byte(0xd1), 10)
			.unwrap();

		remote
			.submit(
				&CallContext::new(10, 50, Address::repeat_byte(0x50)),
				CREATOR,
				1,
				local.identifier(),
				&[payload.clone()],
				&incentive(),
				0,
			)
			.unwrap();

		let message = source_escrow.drain_pending().remove(0);
		assert_eq!(message.sender, remote.identifier());
		local
			.receive_message(
				&CallContext::new(1, 60, ESCROW),
				message.source_identifier,
				message.message_id,
				message.sender,
				&message.message,
			)
			.unwrap();

		assert!(local.attestations().is_proven_by(
			U256::from(10),
			remote.identifier(),
			address_to_identifier(CREATOR),
			keccak256(&payload)
		));
	}

	#[test]
	fn test_invalid_payloads_are_not_submitted() {
		let escrow = Arc::new(MemoryMessageEscrow::new(ESCROW, B256::repeat_byte(1)));
		let remote =
			oracle_with_sources(escrow.clone(), Address::repeat_byte(0x0d), sources_with(HashSet::new()));
		remote
			.set_chain_map(&CallContext::new(10, 0, OWNER), B256::repeat_byte(2), 1)
			.unwrap();

		assert_eq!(
			remote.submit(
				&CallContext::new(10, 0, OWNER),
				CREATOR,
				1,
				B256::ZERO,
				&[Bytes::from(vec![1])],
				&incentive(),
				0
			),
			Err(OracleError::NotAllPayloadsValid)
		);
		assert!(escrow.drain_pending().is_empty());
	}

	#[test]
	fn test_submit_only_speaks_for_the_creator_at_the_source_address() {
		let escrow = Arc::new(MemoryMessageEscrow::new(ESCROW, B256::repeat_byte(0xd1)));
		let payload = Bytes::from(vec![7, 7]);
		let sources = sources_with(HashSet::new());
		let remote = oracle_with_sources(escrow.clone(), Address::repeat_byte(0x0d), sources.clone());
		remote
			.set_chain_map(&CallContext::new(10, 0, OWNER), B256::repeat_byte(2), 1)
			.unwrap();

		// An accommodating creator cannot take over an address already bound.
		let impostor: Arc<dyn PayloadCreator> = Arc::new(FixedCreator {
			valid: HashSet::from([payload.clone()]),
		});
		assert!(!sources.register(CREATOR, impostor.clone()));
		let ctx = CallContext::new(10, 0, Address::repeat_byte(0x66));
		assert_eq!(
			remote.submit(&ctx, CREATOR, 1, B256::ZERO, &[payload.clone()], &incentive(), 0),
			Err(OracleError::NotAllPayloadsValid)
		);

		// Nothing is deployed at the caller's own address yet.
		let elsewhere = Address::repeat_byte(0x66);
		assert_eq!(
			remote.submit(&ctx, elsewhere, 1, B256::ZERO, &[payload.clone()], &incentive(), 0),
			Err(OracleError::UnknownPayloadCreator(elsewhere))
		);
		assert!(escrow.drain_pending().is_empty());

		// Once deployed there, its payloads travel under its own address only.
		assert!(sources.register(elsewhere, impostor));
		remote
			.submit(&ctx, elsewhere, 1, B256::ZERO, &[payload.clone()], &incentive(), 0)
			.unwrap();
		let message = escrow.drain_pending().remove(0);
		let (application, _) = decode_message(&message.message).unwrap();
		assert_eq!(application, address_to_identifier(elsewhere));
	}

	#[test]
	fn test_receive_rejects_other_callers_and_unknown_chains() {
		let escrow = Arc::new(MemoryMessageEscrow::new(ESCROW, B256::repeat_byte(1)));
		let local = oracle(escrow, Address::repeat_byte(0x0a));
		let message = encode_message(B256::ZERO, &[]).unwrap();

		assert_eq!(
			local.receive_message(&CallContext::new(1, 0, OWNER), B256::repeat_byte(5), B256::ZERO, B256::ZERO, &message),
			Err(OracleError::UnauthorizedTransport(OWNER))
		);
		assert_eq!(
			local.receive_message(&CallContext::new(1, 0, ESCROW), B256::repeat_byte(5), B256::ZERO, B256::ZERO, &message),
			Err(OracleError::UnknownChainIdentifier(B256::repeat_byte(5)))
		);
	}

	#[test]
	fn test_factory_applies_chain_bindings() {
		let config = toml::Value::Table(
			r#"
			address = "0x00000000000000000000000000000000000000aa"
			owner = "0x00000000000000000000000000000000000000bb"
			[chains.optimism]
			identifier = "0x000000000000000000000000000000000000000000000000000000000000000a"
			chain_id = 10
			"#
			.parse::<toml::Table>()
			.unwrap(),
		);
		let escrow = Arc::new(MemoryMessageEscrow::new(ESCROW, B256::repeat_byte(1)));
		let oracle = create_relay_oracle(
			&config,
			escrow,
			Arc::new(PayloadCreatorRegistry::new()),
			EventBus::new(4),
		)
		.unwrap();

		let mut identifier = B256::ZERO;
		identifier[31] = 0x0a;
		assert_eq!(oracle.chain_id_of(&identifier), Some(10));
	}
}
