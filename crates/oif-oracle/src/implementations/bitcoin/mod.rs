//! Bitcoin light-client oracle.
//!
//! Bitcoin outputs are proven by SPV: the transaction paying the output is
//! shown to be included in a block the light client accepted, with enough
//! confirmations. Because a Bitcoin payment cannot name a solver, a sponsor
//! first claims the output for a solver and posts collateral. The claim either
//! stands unchallenged through the dispute window, or a disputer posts a
//! larger stake and the claimant must produce the proof before the proof
//! window closes.

pub mod proof;
pub mod script;

use crate::{AttestationKey, AttestationQuery, AttestationStore, AttestationView, OracleError};
use alloy::primitives::{Address, B256, U256};
use dashmap::DashMap;
use oif_chain::{LightClient, TokenLedger, Transfer};
use oif_codec::{fill_payload_hash, output_identifier};
use oif_types::{
	address_to_identifier, get_address, get_u64, get_uint, parse_uint, CallContext, ConfigSchema,
	EventBus, Field, FieldType, MandateOutput, OracleEvent, ProtocolEvent, Schema, ValidationError,
};
use proof::{parse_outputs, verify_inclusion, BlockHeader, InclusionProof};
use script::{op_return_script, output_script, BitcoinToken};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use proof::sha256d;
pub use script::{AddressType, BITCOIN_TOKEN_PREFIX};

/// Lowest accepted `challenger_collateral_factor`.
pub const MIN_CHALLENGER_COLLATERAL_FACTOR: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoinOracleConfig {
	pub address: Address,
	/// Chain id Bitcoin outputs name in `MandateOutput::chain_id`.
	pub chain_id: U256,
	pub collateral_token: Address,
	/// Collateral per satoshi of the claimed output.
	pub collateral_multiplier: U256,
	/// Seconds after a claim during which it can be disputed.
	pub dispute_period: u32,
	/// Seconds after a dispute during which the claimant can still prove.
	pub proof_period: u32,
	/// Disputer stake as a multiple of the claim collateral.
	pub challenger_collateral_factor: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
	Open,
	Verified,
	Forfeited,
}

/// Optimistic claim on one Bitcoin output of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedOrder {
	pub solver: B256,
	pub claim_timestamp: u32,
	pub sponsor: Address,
	pub collateral_amount: U256,
	pub collateral_token: Address,
	pub disputer: Address,
	pub dispute_timestamp: u32,
	pub status: ClaimStatus,
}

impl ClaimedOrder {
	fn is_disputed(&self) -> bool {
		!self.disputer.is_zero()
	}
}

pub struct BitcoinOracle {
	config: BitcoinOracleConfig,
	identifier: B256,
	light_client: Arc<dyn LightClient>,
	ledger: Arc<dyn TokenLedger>,
	store: AttestationStore,
	/// Keyed by `(order_id, output_identifier)`.
	claims: DashMap<(B256, B256), ClaimedOrder>,
	events: EventBus,
}

impl BitcoinOracle {
	pub fn new(
		config: BitcoinOracleConfig,
		light_client: Arc<dyn LightClient>,
		ledger: Arc<dyn TokenLedger>,
		events: EventBus,
	) -> Result<Self, OracleError> {
		if config.challenger_collateral_factor < U256::from(MIN_CHALLENGER_COLLATERAL_FACTOR) {
			return Err(ValidationError::InvalidValue {
				field: "challenger_collateral_factor".to_string(),
				message: format!("must be at least {}", MIN_CHALLENGER_COLLATERAL_FACTOR),
			}
			.into());
		}
		Ok(Self {
			identifier: address_to_identifier(config.address),
			config,
			light_client,
			ledger,
			store: AttestationStore::new(),
			claims: DashMap::new(),
			events,
		})
	}

	pub fn address(&self) -> Address {
		self.config.address
	}

	pub fn identifier(&self) -> B256 {
		self.identifier
	}

	pub fn config(&self) -> &BitcoinOracleConfig {
		&self.config
	}

	pub fn claimed_order(&self, order_id: B256, output: &MandateOutput) -> Option<ClaimedOrder> {
		let output_id = output_identifier(output).ok()?;
		self.claims.get(&(order_id, output_id)).map(|c| *c)
	}

	fn check_output(&self, output: &MandateOutput) -> Result<(), OracleError> {
		if output.chain_id != self.config.chain_id {
			return Err(OracleError::WrongChain {
				expected: self.config.chain_id,
				actual: output.chain_id,
			});
		}
		if output.remote_oracle != self.identifier || output.remote_filler != self.identifier {
			return Err(OracleError::WrongOracle);
		}
		Ok(())
	}

	fn stake_of(&self, collateral: U256) -> Result<U256, OracleError> {
		collateral
			.checked_mul(self.config.challenger_collateral_factor)
			.ok_or(OracleError::AmountOverflow)
	}

	fn pay_out(&self, token: Address, to: Address, amount: U256) -> Result<(), OracleError> {
		self.ledger.transfer(token, self.config.address, to, amount)?;
		Ok(())
	}

	fn pull(&self, token: Address, from: Address, amount: U256) -> Result<(), OracleError> {
		self.ledger.transfer_from(
			self.config.address,
			&Transfer {
				token,
				from,
				to: self.config.address,
				amount,
			},
		)?;
		Ok(())
	}

	fn attest(
		&self,
		solver: B256,
		order_id: B256,
		timestamp: u32,
		output: &MandateOutput,
	) -> Result<(), OracleError> {
		let payload_hash = fill_payload_hash(solver, order_id, timestamp, output)?;
		let key = AttestationKey {
			chain_id: self.config.chain_id,
			oracle: self.identifier,
			application: self.identifier,
			payload_hash,
		};
		if self.store.record(key) {
			self.events
				.publish(ProtocolEvent::Oracle(OracleEvent::OutputProven {
					chain_id: key.chain_id,
					oracle: key.oracle,
					application: key.application,
					payload_hash,
				}))
				.ok();
		}
		Ok(())
	}

	/// Claims `output` of `order_id` for `solver`. The caller is the sponsor
	/// and posts `amount × collateral_multiplier` of the collateral token.
	pub fn claim(
		&self,
		ctx: &CallContext,
		solver: B256,
		order_id: B256,
		output: &MandateOutput,
	) -> Result<(), OracleError> {
		self.check_output(output)?;
		let output_id = output_identifier(output)?;
		let collateral = output
			.amount
			.checked_mul(self.config.collateral_multiplier)
			.ok_or(OracleError::AmountOverflow)?;

		let slot = match self.claims.entry((order_id, output_id)) {
			dashmap::mapref::entry::Entry::Occupied(_) => return Err(OracleError::AlreadyClaimed),
			dashmap::mapref::entry::Entry::Vacant(slot) => slot,
		};
		// The vacant slot stays locked until the collateral arrives.
		self.pull(self.config.collateral_token, ctx.caller, collateral)?;
		slot.insert(ClaimedOrder {
			solver,
			claim_timestamp: ctx.timestamp,
			sponsor: ctx.caller,
			collateral_amount: collateral,
			collateral_token: self.config.collateral_token,
			disputer: Address::ZERO,
			dispute_timestamp: 0,
			status: ClaimStatus::Open,
		});

		info!(%order_id, %output_id, %solver, sponsor = %ctx.caller, "output claimed");
		self.events
			.publish(ProtocolEvent::Oracle(OracleEvent::OutputClaimed {
				order_id,
				output_id,
				solver,
				sponsor: ctx.caller,
			}))
			.ok();
		Ok(())
	}

	/// Challenges an open claim. The caller posts
	/// `collateral × challenger_collateral_factor`.
	pub fn dispute(
		&self,
		ctx: &CallContext,
		order_id: B256,
		output: &MandateOutput,
	) -> Result<(), OracleError> {
		let output_id = output_identifier(output)?;
		let mut claim = self
			.claims
			.get_mut(&(order_id, output_id))
			.ok_or(OracleError::NotClaimed)?;
		if claim.status != ClaimStatus::Open {
			return Err(OracleError::AlreadyResolved);
		}
		if claim.is_disputed() {
			return Err(OracleError::AlreadyDisputed);
		}
		let deadline = claim.claim_timestamp.saturating_add(self.config.dispute_period);
		if ctx.timestamp > deadline {
			return Err(OracleError::TooLate {
				deadline,
				now: ctx.timestamp,
			});
		}

		let stake = self.stake_of(claim.collateral_amount)?;
		self.pull(claim.collateral_token, ctx.caller, stake)?;
		claim.disputer = ctx.caller;
		claim.dispute_timestamp = ctx.timestamp;
		drop(claim);

		info!(%order_id, %output_id, disputer = %ctx.caller, "claim disputed");
		self.events
			.publish(ProtocolEvent::Oracle(OracleEvent::OutputDisputed {
				order_id,
				output_id,
				disputer: ctx.caller,
			}))
			.ok();
		Ok(())
	}

	/// Accepts an undisputed claim once its dispute window has closed. The fill
	/// is attested with the claim timestamp and the sponsor gets the
	/// collateral back.
	pub fn optimistically_verify(
		&self,
		ctx: &CallContext,
		order_id: B256,
		output: &MandateOutput,
	) -> Result<(), OracleError> {
		self.check_output(output)?;
		let output_id = output_identifier(output)?;
		let mut claim = self
			.claims
			.get_mut(&(order_id, output_id))
			.ok_or(OracleError::NotClaimed)?;
		if claim.status != ClaimStatus::Open {
			return Err(OracleError::AlreadyResolved);
		}
		if claim.is_disputed() {
			return Err(OracleError::Disputed);
		}
		let allowed_after = claim.claim_timestamp.saturating_add(self.config.dispute_period);
		if ctx.timestamp <= allowed_after {
			return Err(OracleError::TooEarly {
				allowed_after,
				now: ctx.timestamp,
			});
		}

		claim.status = ClaimStatus::Verified;
		if let Err(e) = self.pay_out(claim.collateral_token, claim.sponsor, claim.collateral_amount) {
			claim.status = ClaimStatus::Open;
			return Err(e);
		}
		let resolved = *claim;
		drop(claim);

		self.attest(resolved.solver, order_id, resolved.claim_timestamp, output)?;
		info!(%order_id, %output_id, "claim optimistically verified");
		self.events
			.publish(ProtocolEvent::Oracle(OracleEvent::OutputOptimisticallyVerified {
				order_id,
				output_id,
			}))
			.ok();
		Ok(())
	}

	/// Forfeits a disputed claim whose proof window closed without a proof.
	/// The disputer receives the claim collateral and their own stake.
	pub fn finalise_dispute(
		&self,
		ctx: &CallContext,
		order_id: B256,
		output: &MandateOutput,
	) -> Result<(), OracleError> {
		let output_id = output_identifier(output)?;
		let mut claim = self
			.claims
			.get_mut(&(order_id, output_id))
			.ok_or(OracleError::NotClaimed)?;
		if claim.status != ClaimStatus::Open {
			return Err(OracleError::AlreadyResolved);
		}
		if !claim.is_disputed() {
			return Err(OracleError::NotDisputed);
		}
		let allowed_after = claim.dispute_timestamp.saturating_add(self.config.proof_period);
		if ctx.timestamp <= allowed_after {
			return Err(OracleError::TooEarly {
				allowed_after,
				now: ctx.timestamp,
			});
		}

		let payout = self
			.stake_of(claim.collateral_amount)?
			.checked_add(claim.collateral_amount)
			.ok_or(OracleError::AmountOverflow)?;
		claim.status = ClaimStatus::Forfeited;
		if let Err(e) = self.pay_out(claim.collateral_token, claim.disputer, payout) {
			claim.status = ClaimStatus::Open;
			return Err(e);
		}
		let disputer = claim.disputer;
		drop(claim);

		warn!(%order_id, %output_id, %disputer, "claim forfeited");
		self.events
			.publish(ProtocolEvent::Oracle(OracleEvent::DisputeFinalised {
				order_id,
				output_id,
				disputer,
			}))
			.ok();
		Ok(())
	}

	/// Proves that `output` was paid on Bitcoin and attests the fill for the
	/// claimed solver. Returns that solver.
	///
	/// `output_index` is the position of the paying output in the transaction.
	/// With `previous_header`, the fill timestamp is taken from the block
	/// before the proven one.
	#[allow(clippy::too_many_arguments)]
	pub fn verify(
		&self,
		ctx: &CallContext,
		order_id: B256,
		output: &MandateOutput,
		block_number: u64,
		inclusion: &InclusionProof,
		output_index: usize,
		previous_header: Option<&[u8]>,
	) -> Result<B256, OracleError> {
		self.check_output(output)?;
		let token = BitcoinToken::parse(output.token)?;
		let expected_script = output_script(token.address_type, &output.recipient);

		let block_hash = self
			.light_client
			.block_hash(block_number)
			.ok_or(OracleError::NoBlock(block_number))?;
		let available = self
			.light_client
			.latest_block_height()
			.saturating_sub(block_number)
			+ 1;
		if available < u64::from(token.confirmations) {
			return Err(OracleError::TooFewConfirmations {
				required: u64::from(token.confirmations),
				available,
			});
		}

		let header = verify_inclusion(inclusion, block_hash)?;
		let outputs = parse_outputs(&inclusion.raw_tx)?;
		let paid = outputs.get(output_index).ok_or(OracleError::ScriptMismatch)?;
		if paid.script != expected_script.as_slice() {
			return Err(OracleError::ScriptMismatch);
		}
		if !output.remote_call.is_empty() {
			let embedded = outputs
				.get(output_index + 1)
				.ok_or(OracleError::ScriptMismatch)?;
			if embedded.script != op_return_script(&output.remote_call).as_slice() {
				return Err(OracleError::ScriptMismatch);
			}
		}
		if U256::from(paid.value) != output.amount {
			return Err(OracleError::BadAmount {
				expected: output.amount,
				actual: paid.value,
			});
		}

		let timestamp = match previous_header {
			Some(bytes) => {
				let previous = BlockHeader::parse(bytes)?;
				if previous.hash() != header.previous_block_hash() {
					return Err(OracleError::BlockhashMismatch);
				}
				previous.timestamp()
			}
			None => header.timestamp(),
		};

		let output_id = output_identifier(output)?;
		let solver = self.resolve_claim(order_id, output_id)?;
		self.attest(solver, order_id, timestamp, output)?;

		info!(
			%order_id,
			%output_id,
			block_number,
			tx_id = %inclusion.tx_id,
			caller = %ctx.caller,
			"bitcoin output verified"
		);
		Ok(solver)
	}

	/// Settles the claim behind a successful proof. An open claim returns the
	/// sponsor's collateral, plus the disputer's stake if it was challenged.
	fn resolve_claim(&self, order_id: B256, output_id: B256) -> Result<B256, OracleError> {
		let mut claim = self
			.claims
			.get_mut(&(order_id, output_id))
			.ok_or(OracleError::NotClaimed)?;
		match claim.status {
			ClaimStatus::Forfeited => Err(OracleError::ClaimForfeited),
			ClaimStatus::Verified => {
				debug!(%order_id, %output_id, "claim already verified");
				Ok(claim.solver)
			}
			ClaimStatus::Open => {
				let refund = if claim.is_disputed() {
					self.stake_of(claim.collateral_amount)?
						.checked_add(claim.collateral_amount)
						.ok_or(OracleError::AmountOverflow)?
				} else {
					claim.collateral_amount
				};
				claim.status = ClaimStatus::Verified;
				if let Err(e) = self.pay_out(claim.collateral_token, claim.sponsor, refund) {
					claim.status = ClaimStatus::Open;
					return Err(e);
				}
				Ok(claim.solver)
			}
		}
	}
}

impl AttestationQuery for BitcoinOracle {
	fn attestations(&self) -> AttestationView<'_> {
		self.store.view()
	}
}

pub struct BitcoinOracleSchema;

impl ConfigSchema for BitcoinOracleSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let period = || FieldType::Integer {
			min: Some(1),
			max: Some(i64::from(u32::MAX)),
		};
		let schema = Schema::new(
			vec![
				Field::new("address", FieldType::Address),
				Field::new("chain_id", FieldType::Uint),
				Field::new("collateral_token", FieldType::Address),
				Field::new("collateral_multiplier", FieldType::Uint),
				Field::new("dispute_period", period()),
				Field::new("proof_period", period()),
			],
			vec![Field::new("challenger_collateral_factor", FieldType::Uint).with_validator(
				|value| match parse_uint(value) {
					Some(factor) if factor >= U256::from(MIN_CHALLENGER_COLLATERAL_FACTOR) => Ok(()),
					_ => Err(format!("must be at least {}", MIN_CHALLENGER_COLLATERAL_FACTOR)),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a Bitcoin oracle from configuration.
///
/// Required configuration parameters:
/// - `address`: Address the oracle is deployed at
/// - `chain_id`: Chain id Bitcoin outputs are tagged with
/// - `collateral_token`: Token claims and disputes are collateralized in
/// - `collateral_multiplier`: Collateral per satoshi
/// - `dispute_period`: Seconds a claim stays open to disputes
/// - `proof_period`: Seconds a disputed claimant has to prove
///
/// Optional configuration parameters:
/// - `challenger_collateral_factor`: Disputer stake multiple (default: 2)
pub fn create_bitcoin_oracle(
	config: &toml::Value,
	light_client: Arc<dyn LightClient>,
	ledger: Arc<dyn TokenLedger>,
	events: EventBus,
) -> Result<BitcoinOracle, OracleError> {
	BitcoinOracleSchema.validate(config)?;
	let period = |field: &str| -> Result<u32, ValidationError> {
		let value = get_u64(config, field, None)?;
		u32::try_from(value).map_err(|_| ValidationError::InvalidValue {
			field: field.to_string(),
			message: "does not fit 32 bits".to_string(),
		})
	};
	let oracle_config = BitcoinOracleConfig {
		address: get_address(config, "address")?,
		chain_id: get_uint(config, "chain_id", None)?,
		collateral_token: get_address(config, "collateral_token")?,
		collateral_multiplier: get_uint(config, "collateral_multiplier", None)?,
		dispute_period: period("dispute_period")?,
		proof_period: period("proof_period")?,
		challenger_collateral_factor: get_uint(
			config,
			"challenger_collateral_factor",
			Some(U256::from(MIN_CHALLENGER_COLLATERAL_FACTOR)),
		)?,
	};
	BitcoinOracle::new(oracle_config, light_client, ledger, events)
}

#[cfg(test)]
mod tests {
	use super::proof::tests::{header, raw_tx};
	use super::*;
	use alloy::primitives::Bytes;
	use oif_chain::implementations::memory_ledger::MemoryLedger;
	use oif_chain::implementations::memory_light_client::MemoryLightClient;

	const ORACLE: Address = Address::repeat_byte(0xb0);
	const COLLATERAL: Address = Address::repeat_byte(0xc0);
	const SPONSOR: Address = Address::repeat_byte(0x5a);
	const DISPUTER: Address = Address::repeat_byte(0xd1);
	const BTC_CHAIN: u64 = 0x0b7c;
	const BLOCK_TIME: u32 = 1_700_000_000;
	const DISPUTE_PERIOD: u32 = 3600;
	const PROOF_PERIOD: u32 = 7200;

	struct Harness {
		oracle: BitcoinOracle,
		ledger: Arc<MemoryLedger>,
		light_client: Arc<MemoryLightClient>,
	}

	fn harness() -> Harness {
		let ledger = Arc::new(MemoryLedger::new());
		let light_client = Arc::new(MemoryLightClient::new());
		for account in [SPONSOR, DISPUTER] {
			ledger.mint(COLLATERAL, account, U256::from(1_000_000)).unwrap();
			ledger.approve(COLLATERAL, account, ORACLE, U256::MAX);
		}
		let oracle = BitcoinOracle::new(
			BitcoinOracleConfig {
				address: ORACLE,
				chain_id: U256::from(BTC_CHAIN),
				collateral_token: COLLATERAL,
				collateral_multiplier: U256::from(2),
				dispute_period: DISPUTE_PERIOD,
				proof_period: PROOF_PERIOD,
				challenger_collateral_factor: U256::from(2),
			},
			light_client.clone(),
			ledger.clone(),
			EventBus::new(16),
		)
		.unwrap();
		Harness {
			oracle,
			ledger,
			light_client,
		}
	}

	fn recipient() -> B256 {
		let mut recipient = B256::ZERO;
		recipient[..20].copy_from_slice(&[0x42; 20]);
		recipient
	}

	fn output(confirmations: u8, remote_call: &[u8]) -> MandateOutput {
		MandateOutput {
			remote_oracle: address_to_identifier(ORACLE),
			remote_filler: address_to_identifier(ORACLE),
			chain_id: U256::from(BTC_CHAIN),
			token: BitcoinToken::encode(confirmations, AddressType::P2wpkh),
			amount: U256::from(5000),
			recipient: recipient(),
			remote_call: Bytes::copy_from_slice(remote_call),
			fulfillment_context: Bytes::new(),
		}
	}

	/// Mines a single-transaction block at `height` paying `outputs`.
	fn mine(h: &Harness, height: u64, previous: B256, outputs: &[(u64, Vec<u8>)]) -> InclusionProof {
		let tx = raw_tx(outputs);
		let tx_id = sha256d(&tx);
		let block_header = header(previous, tx_id, BLOCK_TIME);
		h.light_client.accept_block(height, sha256d(&block_header));
		InclusionProof {
			block_header: block_header.into(),
			tx_id,
			tx_index: 0,
			merkle_siblings: vec![],
			raw_tx: tx.into(),
		}
	}

	fn payment(sats: u64) -> (u64, Vec<u8>) {
		(sats, output_script(AddressType::P2wpkh, &recipient()))
	}

	fn ctx(timestamp: u32, caller: Address) -> CallContext {
		CallContext::new(1, timestamp, caller)
	}

	fn balance(h: &Harness, account: Address) -> U256 {
		h.ledger.balance_of(COLLATERAL, account)
	}

	#[test]
	fn test_verify_claimed_output_refunds_sponsor_and_attests() {
		let h = harness();
		let order_id = B256::repeat_byte(0x01);
		let solver = B256::repeat_byte(0x77);
		let out = output(1, &[]);

		h.oracle.claim(&ctx(100, SPONSOR), solver, order_id, &out).unwrap();
		assert_eq!(balance(&h, SPONSOR), U256::from(1_000_000 - 10_000));

		let proof = mine(&h, 100, B256::ZERO, &[payment(5000)]);
		let attributed = h
			.oracle
			.verify(&ctx(200, DISPUTER), order_id, &out, 100, &proof, 0, None)
			.unwrap();

		assert_eq!(attributed, solver);
		assert_eq!(balance(&h, SPONSOR), U256::from(1_000_000));
		let payload_hash = fill_payload_hash(solver, order_id, BLOCK_TIME, &out).unwrap();
		assert!(h
			.oracle
			.is_proven(U256::from(BTC_CHAIN), h.oracle.identifier(), payload_hash));
	}

	#[test]
	fn test_amount_must_match_exactly() {
		let h = harness();
		let order_id = B256::repeat_byte(0x02);
		let out = output(1, &[]);
		h.oracle
			.claim(&ctx(100, SPONSOR), B256::repeat_byte(0x77), order_id, &out)
			.unwrap();

		for sats in [4999, 5001] {
			let proof = mine(&h, 100, B256::ZERO, &[payment(sats)]);
			assert_eq!(
				h.oracle.verify(&ctx(200, SPONSOR), order_id, &out, 100, &proof, 0, None),
				Err(OracleError::BadAmount {
					expected: U256::from(5000),
					actual: sats
				})
			);
		}
		assert_eq!(h.oracle.claimed_order(order_id, &out).unwrap().status, ClaimStatus::Open);
	}

	#[test]
	fn test_unclaimed_output_cannot_be_verified() {
		let h = harness();
		let out = output(1, &[]);
		let proof = mine(&h, 100, B256::ZERO, &[payment(5000)]);
		assert_eq!(
			h.oracle
				.verify(&ctx(200, SPONSOR), B256::repeat_byte(3), &out, 100, &proof, 0, None),
			Err(OracleError::NotClaimed)
		);
	}

	#[test]
	fn test_confirmations_and_unknown_blocks() {
		let h = harness();
		let order_id = B256::repeat_byte(0x04);
		let out = output(3, &[]);
		h.oracle
			.claim(&ctx(100, SPONSOR), B256::repeat_byte(0x77), order_id, &out)
			.unwrap();
		let proof = mine(&h, 100, B256::ZERO, &[payment(5000)]);

		assert_eq!(
			h.oracle.verify(&ctx(200, SPONSOR), order_id, &out, 100, &proof, 0, None),
			Err(OracleError::TooFewConfirmations {
				required: 3,
				available: 1
			})
		);
		assert_eq!(
			h.oracle.verify(&ctx(200, SPONSOR), order_id, &out, 99, &proof, 0, None),
			Err(OracleError::NoBlock(99))
		);

		h.light_client.accept_block(102, B256::repeat_byte(0xee));
		assert!(h
			.oracle
			.verify(&ctx(200, SPONSOR), order_id, &out, 100, &proof, 0, None)
			.is_ok());
	}

	#[test]
	fn test_remote_call_requires_op_return_output() {
		let h = harness();
		let order_id = B256::repeat_byte(0x05);
		let out = output(1, b"hello");
		h.oracle
			.claim(&ctx(100, SPONSOR), B256::repeat_byte(0x77), order_id, &out)
			.unwrap();

		let bare = mine(&h, 100, B256::ZERO, &[payment(5000)]);
		assert_eq!(
			h.oracle.verify(&ctx(200, SPONSOR), order_id, &out, 100, &bare, 0, None),
			Err(OracleError::ScriptMismatch)
		);

		let with_data = mine(&h, 101, B256::ZERO, &[payment(5000), (0, op_return_script(b"hello"))]);
		assert!(h
			.oracle
			.verify(&ctx(200, SPONSOR), order_id, &out, 101, &with_data, 0, None)
			.is_ok());
	}

	#[test]
	fn test_previous_header_supplies_timestamp() {
		let h = harness();
		let order_id = B256::repeat_byte(0x06);
		let solver = B256::repeat_byte(0x77);
		let out = output(1, &[]);
		h.oracle.claim(&ctx(100, SPONSOR), solver, order_id, &out).unwrap();

		let previous = header(B256::ZERO, B256::repeat_byte(9), BLOCK_TIME - 600);
		let proof = mine(&h, 100, sha256d(&previous), &[payment(5000)]);

		let unrelated = header(B256::repeat_byte(1), B256::repeat_byte(9), BLOCK_TIME - 600);
		assert_eq!(
			h.oracle
				.verify(&ctx(200, SPONSOR), order_id, &out, 100, &proof, 0, Some(unrelated.as_slice())),
			Err(OracleError::BlockhashMismatch)
		);

		h.oracle
			.verify(&ctx(200, SPONSOR), order_id, &out, 100, &proof, 0, Some(previous.as_slice()))
			.unwrap();
		let payload_hash = fill_payload_hash(solver, order_id, BLOCK_TIME - 600, &out).unwrap();
		assert!(h
			.oracle
			.is_proven(U256::from(BTC_CHAIN), h.oracle.identifier(), payload_hash));
	}

	#[test]
	fn test_undisputed_claim_resolves_optimistically() {
		let h = harness();
		let order_id = B256::repeat_byte(0x07);
		let solver = B256::repeat_byte(0x77);
		let out = output(1, &[]);

		h.oracle.claim(&ctx(1000, SPONSOR), solver, order_id, &out).unwrap();
		assert_eq!(
			h.oracle.claim(&ctx(1001, DISPUTER), solver, order_id, &out),
			Err(OracleError::AlreadyClaimed)
		);
		assert_eq!(
			h.oracle
				.optimistically_verify(&ctx(1000 + DISPUTE_PERIOD, SPONSOR), order_id, &out),
			Err(OracleError::TooEarly {
				allowed_after: 1000 + DISPUTE_PERIOD,
				now: 1000 + DISPUTE_PERIOD
			})
		);

		h.oracle
			.optimistically_verify(&ctx(1001 + DISPUTE_PERIOD, DISPUTER), order_id, &out)
			.unwrap();
		assert_eq!(balance(&h, SPONSOR), U256::from(1_000_000));
		let payload_hash = fill_payload_hash(solver, order_id, 1000, &out).unwrap();
		assert!(h
			.oracle
			.is_proven(U256::from(BTC_CHAIN), h.oracle.identifier(), payload_hash));
		assert_eq!(
			h.oracle
				.optimistically_verify(&ctx(2000 + DISPUTE_PERIOD, SPONSOR), order_id, &out),
			Err(OracleError::AlreadyResolved)
		);
	}

	#[test]
	fn test_unproven_dispute_forfeits_to_disputer() {
		let h = harness();
		let order_id = B256::repeat_byte(0x08);
		let out = output(1, &[]);
		h.oracle
			.claim(&ctx(1000, SPONSOR), B256::repeat_byte(0x77), order_id, &out)
			.unwrap();

		assert_eq!(
			h.oracle.dispute(&ctx(1001 + DISPUTE_PERIOD, DISPUTER), order_id, &out),
			Err(OracleError::TooLate {
				deadline: 1000 + DISPUTE_PERIOD,
				now: 1001 + DISPUTE_PERIOD
			})
		);
		h.oracle.dispute(&ctx(1500, DISPUTER), order_id, &out).unwrap();
		assert_eq!(balance(&h, DISPUTER), U256::from(1_000_000 - 20_000));
		assert_eq!(
			h.oracle.dispute(&ctx(1600, SPONSOR), order_id, &out),
			Err(OracleError::AlreadyDisputed)
		);
		assert_eq!(
			h.oracle
				.optimistically_verify(&ctx(1001 + DISPUTE_PERIOD, SPONSOR), order_id, &out),
			Err(OracleError::Disputed)
		);
		assert!(matches!(
			h.oracle.finalise_dispute(&ctx(1500 + PROOF_PERIOD, DISPUTER), order_id, &out),
			Err(OracleError::TooEarly { .. })
		));

		h.oracle
			.finalise_dispute(&ctx(1501 + PROOF_PERIOD, SPONSOR), order_id, &out)
			.unwrap();
		assert_eq!(balance(&h, DISPUTER), U256::from(1_000_000 + 10_000));
		assert_eq!(balance(&h, ORACLE), U256::ZERO);

		let proof = mine(&h, 100, B256::ZERO, &[payment(5000)]);
		assert_eq!(
			h.oracle.verify(&ctx(9999, SPONSOR), order_id, &out, 100, &proof, 0, None),
			Err(OracleError::ClaimForfeited)
		);
	}

	#[test]
	fn test_disputed_claim_proven_in_time_pays_sponsor_both_stakes() {
		let h = harness();
		let order_id = B256::repeat_byte(0x09);
		let out = output(1, &[]);
		h.oracle
			.claim(&ctx(1000, SPONSOR), B256::repeat_byte(0x77), order_id, &out)
			.unwrap();
		h.oracle.dispute(&ctx(1100, DISPUTER), order_id, &out).unwrap();

		let proof = mine(&h, 100, B256::ZERO, &[payment(5000)]);
		h.oracle
			.verify(&ctx(1200, SPONSOR), order_id, &out, 100, &proof, 0, None)
			.unwrap();

		assert_eq!(balance(&h, SPONSOR), U256::from(1_000_000 + 20_000));
		assert_eq!(
			h.oracle.finalise_dispute(&ctx(1100 + PROOF_PERIOD + 1, DISPUTER), order_id, &out),
			Err(OracleError::AlreadyResolved)
		);
	}

	#[test]
	fn test_failed_collateral_pull_leaves_output_unclaimed() {
		let h = harness();
		let poor = Address::repeat_byte(0x99);
		let order_id = B256::repeat_byte(0x0a);
		let out = output(1, &[]);

		assert!(matches!(
			h.oracle.claim(&ctx(10, poor), B256::repeat_byte(1), order_id, &out),
			Err(OracleError::Ledger(_))
		));
		assert!(h.oracle.claimed_order(order_id, &out).is_none());
		h.oracle
			.claim(&ctx(11, SPONSOR), B256::repeat_byte(1), order_id, &out)
			.unwrap();
	}

	#[test]
	fn test_output_must_name_this_oracle() {
		let h = harness();
		let mut out = output(1, &[]);
		out.remote_filler = B256::repeat_byte(0x12);
		assert_eq!(
			h.oracle
				.claim(&ctx(10, SPONSOR), B256::repeat_byte(1), B256::ZERO, &out),
			Err(OracleError::WrongOracle)
		);
		let mut out = output(1, &[]);
		out.chain_id = U256::from(1);
		assert!(matches!(
			h.oracle
				.claim(&ctx(10, SPONSOR), B256::repeat_byte(1), B256::ZERO, &out),
			Err(OracleError::WrongChain { .. })
		));
	}

	#[test]
	fn test_factory_reads_config_and_rejects_weak_challenger_factor() {
		let config = |factor: &str| {
			toml::Value::Table(
				format!(
					r#"
					address = "0x00000000000000000000000000000000000000b0"
					chain_id = 3004
					collateral_token = "0x00000000000000000000000000000000000000c0"
					collateral_multiplier = "1000"
					dispute_period = 3600
					proof_period = 7200
					challenger_collateral_factor = "{}"
					"#,
					factor
				)
				.parse::<toml::Table>()
				.unwrap(),
			)
		};
		let oracle = create_bitcoin_oracle(
			&config("3"),
			Arc::new(MemoryLightClient::new()),
			Arc::new(MemoryLedger::new()),
			EventBus::new(4),
		)
		.unwrap();
		assert_eq!(oracle.config().chain_id, U256::from(3004));
		assert_eq!(oracle.config().challenger_collateral_factor, U256::from(3));

		assert!(create_bitcoin_oracle(
			&config("1"),
			Arc::new(MemoryLightClient::new()),
			Arc::new(MemoryLedger::new()),
			EventBus::new(4),
		)
		.is_err());
	}
}
