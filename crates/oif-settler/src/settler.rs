//! Resource-lock settler.
//!
//! Opening an order deposits its inputs into the lock and registers the
//! order's claim hash with the settler as arbiter. Finalising proves every
//! output through the order's local oracle and claims the inputs out of the
//! lock for the order owner, less the governance fee.

use crate::governance::GovernanceFee;
use crate::purchase::{order_owner, Purchase, PurchaseRecord};
use crate::typed_data::{allow_open_hash, settler_domain};
use crate::{order_id, resolve, SettlerError, MAX_GOVERNANCE_FEE};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{Eip712Domain, SolCall};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use oif_chain::{
	order_claim_hash, BatchClaim, BatchClaimComponent, CallRequest, Component, ExternalCaller,
	ResourceLock, SignatureVerifier, TokenLedger, Transfer,
};
use oif_codec::{fill_payload_hash, ProofSeries, ProofTuple, SeriesLayout};
use oif_oracle::OracleRegistry;
use oif_types::abi::{mandate_hash, IInputCallback};
use oif_types::{
	address_to_identifier, get_address, get_u64, get_uint, identifier_to_address,
	truncate_to_address, CallContext, ConfigSchema, EventBus, Field, FieldType, ProtocolEvent,
	ResolvedCrossChainOrder, Schema, SettlerEvent, StandardOrder, ValidationError,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_DOMAIN_NAME: &str = "CompactSettler";

/// Gas forwarded to an `orderFinalised` callback when none is configured.
pub const DEFAULT_CALLBACK_GAS_LIMIT: u64 = 100_000;

/// Signatures passed through to the resource lock when claiming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSignatures {
	pub sponsor_signature: Bytes,
	pub allocator_data: Bytes,
}

/// Chain collaborators a settler is wired to.
#[derive(Clone)]
pub struct SettlerServices {
	pub lock: Arc<dyn ResourceLock>,
	pub ledger: Arc<dyn TokenLedger>,
	pub oracles: Arc<OracleRegistry>,
	pub verifier: Arc<dyn SignatureVerifier>,
	pub caller: Arc<dyn ExternalCaller>,
}

pub struct CompactSettler {
	address: Address,
	chain_id: U256,
	domain: Eip712Domain,
	services: SettlerServices,
	governance: GovernanceFee,
	/// Keyed by `(solver, order_id)`.
	purchases: DashMap<(B256, B256), PurchaseRecord>,
	callback_gas_limit: u64,
	events: EventBus,
}

impl CompactSettler {
	pub fn new(
		address: Address,
		chain_id: u64,
		domain_name: &str,
		services: SettlerServices,
		governance: GovernanceFee,
		events: EventBus,
	) -> Self {
		let chain_id = U256::from(chain_id);
		Self {
			address,
			chain_id,
			domain: settler_domain(domain_name, chain_id, address),
			services,
			governance,
			purchases: DashMap::new(),
			callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
			events,
		}
	}

	pub fn with_callback_gas_limit(mut self, gas: u64) -> Self {
		self.callback_gas_limit = gas;
		self
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn chain_id(&self) -> U256 {
		self.chain_id
	}

	pub fn domain(&self) -> &Eip712Domain {
		&self.domain
	}

	pub fn governance(&self) -> &GovernanceFee {
		&self.governance
	}

	pub fn order_identifier(&self, order: &StandardOrder) -> B256 {
		order_id::order_identifier(self.chain_id, self.address, order)
	}

	pub fn purchase_record(&self, solver: B256, order_id: B256) -> Option<PurchaseRecord> {
		self.purchases.get(&(solver, order_id)).map(|r| *r)
	}

	/// Locks the order's inputs, pulled from the caller, for `order.user` and
	/// registers this settler as the arbiter allowed to release them.
	pub fn open(&self, ctx: &CallContext, order: &StandardOrder) -> Result<B256, SettlerError> {
		self.check_origin(order)?;
		if ctx.timestamp > order.fill_deadline {
			return Err(SettlerError::FillDeadlineInPast {
				deadline: order.fill_deadline,
				now: ctx.timestamp,
			});
		}

		let order_id = self.order_identifier(order);
		let claim_hash = order_claim_hash(self.address, order, mandate_hash(order));
		self.services
			.lock
			.deposit_and_register(ctx, order.user, &order.input_pairs(), claim_hash)?;

		info!(%order_id, user = %order.user, inputs = order.inputs.len(), "order opened");
		self.events
			.publish(ProtocolEvent::Settler(SettlerEvent::Open {
				order_id,
				order: order.clone(),
			}))
			.ok();
		Ok(order_id)
	}

	/// The purchaser if `solver` sold the order before its earliest fill
	/// could be seen, otherwise the solver.
	pub fn purchase_get_order_owner(&self, order_id: B256, solver: B256, timestamps: &[u32]) -> B256 {
		order_owner(self.purchase_record(solver, order_id), solver, timestamps)
	}

	/// Finalises to the order owner, who must be the caller.
	pub fn finalise_self(
		&self,
		ctx: &CallContext,
		order: &StandardOrder,
		signatures: &ClaimSignatures,
		timestamps: &[u32],
		solver: B256,
	) -> Result<B256, SettlerError> {
		let order_id = self.order_identifier(order);
		let owner = self.purchase_get_order_owner(order_id, solver, timestamps);
		self.require_caller(ctx, owner)?;
		let solvers = vec![solver; order.outputs.len()];
		self.finalise(ctx, order, order_id, signatures, timestamps, &solvers, owner, &Bytes::new())?;
		Ok(order_id)
	}

	/// Finalises to `destination`, optionally calling it back. The caller must
	/// be the order owner.
	#[allow(clippy::too_many_arguments)]
	pub fn finalise_to(
		&self,
		ctx: &CallContext,
		order: &StandardOrder,
		signatures: &ClaimSignatures,
		timestamps: &[u32],
		solver: B256,
		destination: B256,
		call: &Bytes,
	) -> Result<B256, SettlerError> {
		let order_id = self.order_identifier(order);
		let owner = self.purchase_get_order_owner(order_id, solver, timestamps);
		self.require_caller(ctx, owner)?;
		let solvers = vec![solver; order.outputs.len()];
		self.finalise(ctx, order, order_id, signatures, timestamps, &solvers, destination, call)?;
		Ok(order_id)
	}

	/// Finalises on behalf of the order owner, who signed an `AllowOpen` for
	/// this destination and call. Anyone may submit it.
	#[allow(clippy::too_many_arguments)]
	pub fn finalise_for(
		&self,
		ctx: &CallContext,
		order: &StandardOrder,
		signatures: &ClaimSignatures,
		timestamps: &[u32],
		solver: B256,
		destination: B256,
		call: &Bytes,
		owner_signature: &[u8],
	) -> Result<B256, SettlerError> {
		let order_id = self.order_identifier(order);
		let owner = self.purchase_get_order_owner(order_id, solver, timestamps);
		let signer = identifier_to_address(owner).map_err(|_| SettlerError::InvalidSigner)?;
		let digest = allow_open_hash(&self.domain, order_id, self.address, destination, call);
		if !self
			.services
			.verifier
			.is_valid_signature(signer, digest, owner_signature)
		{
			return Err(SettlerError::InvalidSigner);
		}
		let solvers = vec![solver; order.outputs.len()];
		self.finalise(ctx, order, order_id, signatures, timestamps, &solvers, destination, call)?;
		Ok(order_id)
	}

	/// Finalises an order whose outputs were filled by different solvers.
	/// Ownership follows the solver of the first output.
	#[allow(clippy::too_many_arguments)]
	pub fn finalise_with_solvers(
		&self,
		ctx: &CallContext,
		order: &StandardOrder,
		signatures: &ClaimSignatures,
		timestamps: &[u32],
		solvers: &[B256],
		destination: B256,
		call: &Bytes,
	) -> Result<B256, SettlerError> {
		let first = *solvers.first().ok_or(SettlerError::InvalidSolverLength {
			expected: order.outputs.len(),
			actual: 0,
		})?;
		let order_id = self.order_identifier(order);
		let owner = self.purchase_get_order_owner(order_id, first, timestamps);
		self.require_caller(ctx, owner)?;
		self.finalise(ctx, order, order_id, signatures, timestamps, solvers, destination, call)?;
		Ok(order_id)
	}

	/// Buys `order_solved_by`'s claim on an order. The caller pays each input
	/// less the discount to the solver's destination, and `purchaser` owns
	/// every fill made before `now - time_to_buy`.
	#[allow(clippy::too_many_arguments)]
	pub fn purchase_order(
		&self,
		ctx: &CallContext,
		purchase: &Purchase,
		order: &StandardOrder,
		order_solved_by: B256,
		purchaser: B256,
		expiry: u32,
		solver_signature: &[u8],
	) -> Result<(), SettlerError> {
		if purchaser.is_zero() {
			return Err(SettlerError::InvalidPurchaser);
		}
		if ctx.timestamp > expiry {
			return Err(SettlerError::Expired {
				expires: expiry,
				now: ctx.timestamp,
			});
		}
		let order_id = self.order_identifier(order);
		if order_id != purchase.order_id {
			return Err(SettlerError::OrderIdMismatch {
				expected: purchase.order_id,
				actual: order_id,
			});
		}

		let key = (order_solved_by, order_id);
		let slot = match self.purchases.entry(key) {
			Entry::Occupied(_) => return Err(SettlerError::AlreadyPurchased),
			Entry::Vacant(slot) => slot,
		};
		let signer = identifier_to_address(order_solved_by).map_err(|_| SettlerError::InvalidSigner)?;
		let digest = purchase.signing_hash(&self.domain, self.address);
		if !self
			.services
			.verifier
			.is_valid_signature(signer, digest, solver_signature)
		{
			return Err(SettlerError::InvalidSigner);
		}
		slot.insert(PurchaseRecord {
			cutoff: ctx.timestamp.saturating_sub(purchase.time_to_buy),
			purchaser,
		});

		let destination = truncate_to_address(purchase.destination);
		let paid: Vec<[U256; 2]> = order
			.inputs
			.iter()
			.map(|input| [input.resource_id, purchase.discounted(input.amount)])
			.collect();
		let transfers: Vec<Transfer> = order
			.inputs
			.iter()
			.zip(&paid)
			.filter(|(_, [_, amount])| !amount.is_zero())
			.map(|(input, [_, amount])| Transfer {
				token: input.token(),
				from: ctx.caller,
				to: destination,
				amount: *amount,
			})
			.collect();
		if let Err(e) = self.services.ledger.transfer_from_batch(self.address, &transfers) {
			self.purchases.remove(&key);
			return Err(e.into());
		}

		if !purchase.call.is_empty() {
			self.notify_destination(order_id, destination, paid, &purchase.call);
		}
		info!(%order_id, solver = %order_solved_by, %purchaser, "order purchased");
		self.events
			.publish(ProtocolEvent::Settler(SettlerEvent::OrderPurchased {
				order_id,
				solver: order_solved_by,
				purchaser,
			}))
			.ok();
		Ok(())
	}

	pub fn set_governance_fee(&self, ctx: &CallContext, fee: U256) -> Result<u32, SettlerError> {
		self.governance.set_governance_fee(ctx, fee)
	}

	pub fn apply_governance_fee(&self, ctx: &CallContext) -> Result<U256, SettlerError> {
		self.governance.apply_governance_fee(ctx)
	}

	pub fn resolve(&self, order: &StandardOrder) -> ResolvedCrossChainOrder {
		resolve::resolve(self.chain_id, self.address, order)
	}

	pub fn resolve_for(&self, order: &StandardOrder, filler_data: &[u8]) -> ResolvedCrossChainOrder {
		resolve::resolve_for(self.chain_id, self.address, order, filler_data)
	}

	fn check_origin(&self, order: &StandardOrder) -> Result<(), SettlerError> {
		if order.origin_chain_id != self.chain_id {
			return Err(SettlerError::WrongChain {
				expected: self.chain_id,
				actual: order.origin_chain_id,
			});
		}
		Ok(())
	}

	fn require_caller(&self, ctx: &CallContext, owner: B256) -> Result<(), SettlerError> {
		if address_to_identifier(ctx.caller) != owner {
			return Err(SettlerError::NotOrderOwner {
				caller: ctx.caller,
				owner,
			});
		}
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	fn finalise(
		&self,
		ctx: &CallContext,
		order: &StandardOrder,
		order_id: B256,
		signatures: &ClaimSignatures,
		timestamps: &[u32],
		solvers: &[B256],
		destination: B256,
		call: &Bytes,
	) -> Result<(), SettlerError> {
		self.check_origin(order)?;
		if ctx.timestamp > order.expires {
			return Err(SettlerError::Expired {
				expires: order.expires,
				now: ctx.timestamp,
			});
		}
		let outputs = order.outputs.len();
		if timestamps.len() != outputs {
			return Err(SettlerError::InvalidTimestampLength {
				expected: outputs,
				actual: timestamps.len(),
			});
		}
		if solvers.len() != outputs {
			return Err(SettlerError::InvalidSolverLength {
				expected: outputs,
				actual: solvers.len(),
			});
		}
		if let Some(&late) = timestamps.iter().find(|&&ts| ts > order.fill_deadline) {
			return Err(SettlerError::FilledTooLate {
				fill_deadline: order.fill_deadline,
				filled_at: late,
			});
		}

		self.require_fills_proven(order, order_id, timestamps, solvers)?;
		let destination_address = truncate_to_address(destination);
		self.release(ctx, order, signatures, destination_address)?;

		if !call.is_empty() {
			self.notify_destination(order_id, destination_address, order.input_pairs(), call);
		}
		info!(%order_id, solver = %solvers[0], %destination, "order finalised");
		self.events
			.publish(ProtocolEvent::Settler(SettlerEvent::Finalised {
				order_id,
				solver: solvers[0],
				destination,
			}))
			.ok();
		Ok(())
	}

	fn require_fills_proven(
		&self,
		order: &StandardOrder,
		order_id: B256,
		timestamps: &[u32],
		solvers: &[B256],
	) -> Result<(), SettlerError> {
		let mut series = ProofSeries::with_capacity(SeriesLayout::FillerAware, order.outputs.len());
		for ((output, &timestamp), &solver) in order.outputs.iter().zip(timestamps).zip(solvers) {
			series.push(&ProofTuple {
				chain_id: output.chain_id,
				oracle: output.remote_oracle,
				application: output.remote_filler,
				payload_hash: fill_payload_hash(solver, order_id, timestamp, output)?,
			});
		}
		let oracle = self
			.services
			.oracles
			.get(&order.local_oracle)
			.ok_or(SettlerError::UnknownOracle(order.local_oracle))?;
		oracle.efficient_require_proven(series.as_bytes())?;
		debug!(%order_id, outputs = series.len(), "fills proven");
		Ok(())
	}

	/// Claims the inputs out of the lock: the governance fee to the fee
	/// recipient and the rest to `destination`.
	fn release(
		&self,
		ctx: &CallContext,
		order: &StandardOrder,
		signatures: &ClaimSignatures,
		destination: Address,
	) -> Result<(), SettlerError> {
		let recipient = self.governance.recipient();
		let claims = order
			.inputs
			.iter()
			.map(|input| {
				let fee = self.governance.calculate_fee(input.amount);
				let mut portions = Vec::with_capacity(2);
				if !fee.is_zero() {
					portions.push(Component {
						claimant: recipient,
						amount: fee,
					});
				}
				portions.push(Component {
					claimant: destination,
					amount: input.amount - fee,
				});
				BatchClaimComponent {
					id: input.resource_id,
					allocated_amount: input.amount,
					portions,
				}
			})
			.collect();

		let claim = BatchClaim {
			sponsor: order.user,
			nonce: order.nonce,
			expires: order.expires,
			witness: mandate_hash(order),
			sponsor_signature: signatures.sponsor_signature.clone(),
			allocator_data: signatures.allocator_data.clone(),
			claims,
		};
		self.services
			.lock
			.batch_claim(&ctx.with_caller(self.address), &claim)?;
		Ok(())
	}

	/// Best effort: a failing destination does not undo the release.
	fn notify_destination(&self, order_id: B256, destination: Address, inputs: Vec<[U256; 2]>, call: &Bytes) {
		let data = IInputCallback::orderFinalisedCall {
			inputs,
			executionData: call.clone(),
		}
		.abi_encode();
		let outcome = self.services.caller.call(&CallRequest {
			from: self.address,
			to: destination,
			data: data.into(),
			gas_limit: self.callback_gas_limit,
		});
		if !outcome.success {
			warn!(%order_id, %destination, gas_used = outcome.gas_used, "input callback failed");
		}
	}
}

pub struct SettlerSchema;

impl ConfigSchema for SettlerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("address", FieldType::Address),
				Field::new("owner", FieldType::Address),
			],
			vec![
				Field::new("fee_recipient", FieldType::Address),
				Field::new("governance_fee", FieldType::Uint).with_validator(|value| {
					match oif_types::parse_uint(value) {
						Some(fee) if fee <= MAX_GOVERNANCE_FEE => Ok(()),
						_ => Err(format!("must not exceed {}", MAX_GOVERNANCE_FEE)),
					}
				}),
				Field::new("domain_name", FieldType::String),
				Field::new(
					"callback_gas_limit",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a settler from configuration.
///
/// Required configuration parameters:
/// - `address`: Address the settler is deployed at
/// - `owner`: Governance owner allowed to schedule fee changes
///
/// Optional configuration parameters:
/// - `fee_recipient`: Receives the governance fee (default: `owner`)
/// - `governance_fee`: Initial fee, 18-decimal fixed point, at most 10% (default: 0)
/// - `domain_name`: EIP-712 domain name (default: "CompactSettler")
/// - `callback_gas_limit`: Gas forwarded to `orderFinalised` callbacks (default: 100000)
pub fn create_settler(
	config: &toml::Value,
	chain_id: u64,
	services: SettlerServices,
	events: EventBus,
) -> Result<CompactSettler, SettlerError> {
	SettlerSchema.validate(config)?;
	let address = get_address(config, "address")?;
	let owner = get_address(config, "owner")?;
	let fee_recipient = match config.get("fee_recipient") {
		Some(_) => get_address(config, "fee_recipient")?,
		None => owner,
	};
	let fee = get_uint(config, "governance_fee", Some(U256::ZERO))?;
	let domain_name = config
		.get("domain_name")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_DOMAIN_NAME);
	let callback_gas_limit = get_u64(config, "callback_gas_limit", Some(DEFAULT_CALLBACK_GAS_LIMIT))?;

	let governance = GovernanceFee::new(owner, fee_recipient, fee, events.clone())?;
	Ok(
		CompactSettler::new(address, chain_id, domain_name, services, governance, events)
			.with_callback_gas_limit(callback_gas_limit),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::signers::{local::PrivateKeySigner, SignerSync};
	use oif_chain::implementations::call_router::CallRouter;
	use oif_chain::implementations::ecdsa::EcdsaVerifier;
	use oif_chain::implementations::memory_ledger::MemoryLedger;
	use oif_chain::implementations::memory_lock::MemoryResourceLock;
	use oif_chain::{CallOutcome, LockError};
	use oif_oracle::{
		AttestationKey, AttestationQuery, AttestationStore, AttestationView, OracleError,
	};
	use oif_types::{Input, MandateOutput};
	use std::sync::Mutex;

	const CHAIN: u64 = 1;
	const SETTLER: Address = Address::repeat_byte(0x5e);
	const LOCK: Address = Address::repeat_byte(0x10);
	const ORACLE: Address = Address::repeat_byte(0x0c);
	const OWNER: Address = Address::repeat_byte(0x0e);
	const FEE_RECIPIENT: Address = Address::repeat_byte(0xfe);
	const TOKEN: Address = Address::repeat_byte(0x0a);
	const USER: Address = Address::repeat_byte(0x11);
	const PURCHASER: Address = Address::repeat_byte(0x9a);
	const DESTINATION: Address = Address::repeat_byte(0xde);

	#[derive(Default)]
	struct StubOracle {
		store: AttestationStore,
	}

	impl AttestationQuery for StubOracle {
		fn attestations(&self) -> AttestationView<'_> {
			self.store.view()
		}
	}

	struct Harness {
		settler: CompactSettler,
		ledger: Arc<MemoryLedger>,
		lock: Arc<MemoryResourceLock>,
		oracle: Arc<StubOracle>,
		router: Arc<CallRouter>,
		solver: PrivateKeySigner,
	}

	impl Harness {
		fn solver_id(&self) -> B256 {
			address_to_identifier(self.solver.address())
		}

		fn prove(&self, order: &StandardOrder, solver: B256, timestamp: u32) {
			let order_id = self.settler.order_identifier(order);
			for output in &order.outputs {
				self.oracle.store.record(AttestationKey {
					chain_id: output.chain_id,
					oracle: output.remote_oracle,
					application: output.remote_filler,
					payload_hash: fill_payload_hash(solver, order_id, timestamp, output).unwrap(),
				});
			}
		}

		fn balance(&self, owner: Address) -> U256 {
			self.ledger.balance_of(TOKEN, owner)
		}
	}

	fn harness_with_fee(fee: U256) -> Harness {
		let ledger = Arc::new(MemoryLedger::new());
		ledger.mint(TOKEN, USER, U256::from(10_000)).unwrap();
		ledger.approve(TOKEN, USER, LOCK, U256::MAX);
		ledger.mint(TOKEN, PURCHASER, U256::from(10_000)).unwrap();
		ledger.approve(TOKEN, PURCHASER, SETTLER, U256::MAX);

		let lock = Arc::new(MemoryResourceLock::new(LOCK, ledger.clone(), Arc::new(EcdsaVerifier)));
		let oracle = Arc::new(StubOracle::default());
		let oracles = Arc::new(OracleRegistry::new());
		oracles.register(ORACLE, oracle.clone());
		let router = Arc::new(CallRouter::new());

		let events = EventBus::new(64);
		let governance = GovernanceFee::new(OWNER, FEE_RECIPIENT, fee, events.clone()).unwrap();
		let services = SettlerServices {
			lock: lock.clone(),
			ledger: ledger.clone(),
			oracles,
			verifier: Arc::new(EcdsaVerifier),
			caller: router.clone(),
		};
		Harness {
			settler: CompactSettler::new(SETTLER, CHAIN, DEFAULT_DOMAIN_NAME, services, governance, events),
			ledger,
			lock,
			oracle,
			router,
			solver: PrivateKeySigner::random(),
		}
	}

	fn harness() -> Harness {
		harness_with_fee(U256::ZERO)
	}

	fn output(amount: u64) -> MandateOutput {
		MandateOutput {
			remote_oracle: B256::repeat_byte(0x0c),
			remote_filler: B256::repeat_byte(0xf1),
			chain_id: U256::from(10),
			token: address_to_identifier(Address::repeat_byte(0x0b)),
			amount: U256::from(amount),
			recipient: address_to_identifier(Address::repeat_byte(0x4e)),
			remote_call: Bytes::new(),
			fulfillment_context: Bytes::new(),
		}
	}

	fn order() -> StandardOrder {
		StandardOrder {
			user: USER,
			nonce: U256::from(1),
			origin_chain_id: U256::from(CHAIN),
			expires: 20_000,
			fill_deadline: 15_000,
			local_oracle: ORACLE,
			inputs: vec![Input::new(Input::resource_id_for([0; 12], TOKEN), U256::from(1000))],
			outputs: vec![output(500)],
		}
	}

	fn ctx(timestamp: u32, caller: Address) -> CallContext {
		CallContext::new(CHAIN, timestamp, caller)
	}

	fn no_signatures() -> ClaimSignatures {
		ClaimSignatures::default()
	}

	#[test]
	fn test_proven_order_releases_inputs_once() {
		let h = harness();
		let order = order();
		let order_id = h.settler.open(&ctx(100, USER), &order).unwrap();
		assert_eq!(h.lock.locked_balance(USER, order.inputs[0].resource_id), U256::from(1000));
		h.prove(&order, h.solver_id(), 9000);

		let solver_ctx = ctx(10_000, h.solver.address());
		assert_eq!(
			h.settler
				.finalise_self(&solver_ctx, &order, &no_signatures(), &[9000], h.solver_id())
				.unwrap(),
			order_id
		);
		assert_eq!(h.balance(h.solver.address()), U256::from(1000));
		assert!(h.lock.is_nonce_consumed(USER, order.nonce));

		assert!(matches!(
			h.settler
				.finalise_self(&solver_ctx, &order, &no_signatures(), &[9000], h.solver_id()),
			Err(SettlerError::Lock(LockError::NonceConsumed { .. }))
		));
	}

	#[test]
	fn test_unproven_order_stays_locked() {
		let h = harness();
		let order = order();
		h.settler.open(&ctx(100, USER), &order).unwrap();
		h.prove(&order, h.solver_id(), 8000);

		let result = h.settler.finalise_self(
			&ctx(10_000, h.solver.address()),
			&order,
			&no_signatures(),
			&[9000],
			h.solver_id(),
		);
		assert!(matches!(result, Err(SettlerError::Oracle(OracleError::NotProven { .. }))));
		assert_eq!(h.lock.locked_balance(USER, order.inputs[0].resource_id), U256::from(1000));
		assert!(!h.lock.is_nonce_consumed(USER, order.nonce));
	}

	#[test]
	fn test_only_owner_may_finalise() {
		let h = harness();
		let order = order();
		h.settler.open(&ctx(100, USER), &order).unwrap();
		h.prove(&order, h.solver_id(), 9000);

		let stranger = Address::repeat_byte(0x66);
		assert_eq!(
			h.settler
				.finalise_self(&ctx(10_000, stranger), &order, &no_signatures(), &[9000], h.solver_id()),
			Err(SettlerError::NotOrderOwner {
				caller: stranger,
				owner: h.solver_id()
			})
		);
	}

	#[test]
	fn test_finalise_validation() {
		let h = harness();
		let order = order();
		h.settler.open(&ctx(100, USER), &order).unwrap();
		let solver_id = h.solver_id();
		let at = |t| ctx(t, h.solver.address());

		assert_eq!(
			h.settler
				.finalise_self(&at(20_001), &order, &no_signatures(), &[9000], solver_id),
			Err(SettlerError::Expired {
				expires: 20_000,
				now: 20_001
			})
		);
		assert_eq!(
			h.settler
				.finalise_self(&at(10_000), &order, &no_signatures(), &[9000, 9001], solver_id),
			Err(SettlerError::InvalidTimestampLength {
				expected: 1,
				actual: 2
			})
		);
		assert_eq!(
			h.settler
				.finalise_self(&at(16_000), &order, &no_signatures(), &[15_001], solver_id),
			Err(SettlerError::FilledTooLate {
				fill_deadline: 15_000,
				filled_at: 15_001
			})
		);

		let mut foreign = order.clone();
		foreign.origin_chain_id = U256::from(2);
		assert!(matches!(
			h.settler.open(&ctx(100, USER), &foreign),
			Err(SettlerError::WrongChain { .. })
		));
		assert!(matches!(
			h.settler.open(&ctx(15_001, USER), &order),
			Err(SettlerError::FillDeadlineInPast { .. })
		));
	}

	#[test]
	fn test_finalise_for_needs_owner_signature() {
		let h = harness();
		let order = order();
		let order_id = h.settler.open(&ctx(100, USER), &order).unwrap();
		h.prove(&order, h.solver_id(), 9000);

		let destination = address_to_identifier(DESTINATION);
		let call = Bytes::new();
		let digest = allow_open_hash(h.settler.domain(), order_id, SETTLER, destination, &call);
		let signature = h.solver.sign_hash_sync(&digest).unwrap().as_bytes();
		let relayer = ctx(10_000, Address::repeat_byte(0x77));

		let other_destination = address_to_identifier(Address::repeat_byte(0x01));
		assert_eq!(
			h.settler.finalise_for(
				&relayer,
				&order,
				&no_signatures(),
				&[9000],
				h.solver_id(),
				other_destination,
				&call,
				&signature
			),
			Err(SettlerError::InvalidSigner)
		);

		h.settler
			.finalise_for(
				&relayer,
				&order,
				&no_signatures(),
				&[9000],
				h.solver_id(),
				destination,
				&call,
				&signature,
			)
			.unwrap();
		assert_eq!(h.balance(DESTINATION), U256::from(1000));
	}

	#[test]
	fn test_governance_fee_is_split_off() {
		let h = harness_with_fee(MAX_GOVERNANCE_FEE);
		let order = order();
		h.settler.open(&ctx(100, USER), &order).unwrap();
		h.prove(&order, h.solver_id(), 9000);

		h.settler
			.finalise_self(
				&ctx(10_000, h.solver.address()),
				&order,
				&no_signatures(),
				&[9000],
				h.solver_id(),
			)
			.unwrap();
		assert_eq!(h.balance(FEE_RECIPIENT), U256::from(100));
		assert_eq!(h.balance(h.solver.address()), U256::from(900));
	}

	#[test]
	fn test_callback_sees_released_inputs() {
		let h = harness();
		let order = order();
		h.settler.open(&ctx(100, USER), &order).unwrap();
		h.prove(&order, h.solver_id(), 9000);

		let seen = Arc::new(Mutex::new(None));
		let (ledger, record) = (h.ledger.clone(), seen.clone());
		h.router.register(
			DESTINATION,
			Arc::new(move |request: &CallRequest| {
				*record.lock().unwrap() = Some((request.gas_limit, ledger.balance_of(TOKEN, DESTINATION)));
				CallOutcome {
					success: false,
					gas_used: 50_000,
				}
			}),
		);

		h.settler
			.finalise_to(
				&ctx(10_000, h.solver.address()),
				&order,
				&no_signatures(),
				&[9000],
				h.solver_id(),
				address_to_identifier(DESTINATION),
				&Bytes::from_static(b"hook"),
			)
			.unwrap();
		assert_eq!(
			*seen.lock().unwrap(),
			Some((DEFAULT_CALLBACK_GAS_LIMIT, U256::from(1000)))
		);
	}

	#[test]
	fn test_mixed_solvers_follow_first_output() {
		let h = harness();
		let mut order = order();
		order.outputs.push(output(700));
		h.settler.open(&ctx(100, USER), &order).unwrap();

		let other = address_to_identifier(Address::repeat_byte(0xb2));
		let order_id = h.settler.order_identifier(&order);
		for (output, solver) in order.outputs.iter().zip([h.solver_id(), other]) {
			h.oracle.store.record(AttestationKey {
				chain_id: output.chain_id,
				oracle: output.remote_oracle,
				application: output.remote_filler,
				payload_hash: fill_payload_hash(solver, order_id, 9000, output).unwrap(),
			});
		}

		let solvers = [h.solver_id(), other];
		assert!(matches!(
			h.settler.finalise_with_solvers(
				&ctx(10_000, h.solver.address()),
				&order,
				&no_signatures(),
				&[9000, 9000],
				&solvers[..1],
				h.solver_id(),
				&Bytes::new()
			),
			Err(SettlerError::InvalidSolverLength { .. })
		));
		h.settler
			.finalise_with_solvers(
				&ctx(10_000, h.solver.address()),
				&order,
				&no_signatures(),
				&[9000, 9000],
				&solvers,
				h.solver_id(),
				&Bytes::new(),
			)
			.unwrap();
		assert_eq!(h.balance(h.solver.address()), U256::from(1000));
	}

	#[test]
	fn test_purchase_moves_ownership_of_early_fills() {
		let h = harness();
		let order = order();
		let order_id = h.settler.open(&ctx(100, USER), &order).unwrap();
		let purchase = Purchase {
			order_id,
			destination: address_to_identifier(DESTINATION),
			call: Bytes::new(),
			discount: 100_000_000_000_000_000,
			time_to_buy: 1000,
		};
		let signature = h
			.solver
			.sign_hash_sync(&purchase.signing_hash(h.settler.domain(), SETTLER))
			.unwrap()
			.as_bytes();
		let purchaser = address_to_identifier(PURCHASER);
		let buy = ctx(10_000, PURCHASER);

		assert_eq!(
			h.settler
				.purchase_order(&buy, &purchase, &order, h.solver_id(), purchaser, 9_999, &signature),
			Err(SettlerError::Expired {
				expires: 9_999,
				now: 10_000
			})
		);
		let forged = [0u8; 65];
		assert_eq!(
			h.settler
				.purchase_order(&buy, &purchase, &order, h.solver_id(), purchaser, 11_000, &forged),
			Err(SettlerError::InvalidSigner)
		);

		h.settler
			.purchase_order(&buy, &purchase, &order, h.solver_id(), purchaser, 11_000, &signature)
			.unwrap();
		assert_eq!(h.balance(DESTINATION), U256::from(900));
		assert_eq!(
			h.settler
				.purchase_order(&buy, &purchase, &order, h.solver_id(), purchaser, 11_000, &signature),
			Err(SettlerError::AlreadyPurchased)
		);

		assert_eq!(h.settler.purchase_get_order_owner(order_id, h.solver_id(), &[9_500]), h.solver_id());
		assert_eq!(h.settler.purchase_get_order_owner(order_id, h.solver_id(), &[8_500]), purchaser);

		h.prove(&order, h.solver_id(), 8_500);
		h.settler
			.finalise_self(&ctx(10_500, PURCHASER), &order, &no_signatures(), &[8_500], h.solver_id())
			.unwrap();
		assert_eq!(h.balance(PURCHASER), U256::from(10_000 - 900 + 1000));
	}

	#[test]
	fn test_failed_purchase_payment_is_rolled_back() {
		let h = harness();
		let order = order();
		let order_id = h.settler.open(&ctx(100, USER), &order).unwrap();
		let purchase = Purchase {
			order_id,
			destination: address_to_identifier(DESTINATION),
			call: Bytes::new(),
			discount: 0,
			time_to_buy: 0,
		};
		let signature = h
			.solver
			.sign_hash_sync(&purchase.signing_hash(h.settler.domain(), SETTLER))
			.unwrap()
			.as_bytes();
		let broke = Address::repeat_byte(0x42);

		assert!(matches!(
			h.settler.purchase_order(
				&ctx(10_000, broke),
				&purchase,
				&order,
				h.solver_id(),
				address_to_identifier(broke),
				11_000,
				&signature
			),
			Err(SettlerError::Ledger(_))
		));
		assert!(h.settler.purchase_record(h.solver_id(), order_id).is_none());
	}

	#[test]
	fn test_factory_defaults_fee_recipient_to_owner() {
		let config = toml::Value::Table(
			r#"
			address = "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e"
			owner = "0x0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e"
			governance_fee = "50000000000000000"
			"#
			.parse::<toml::Table>()
			.unwrap(),
		);
		let h = harness();
		let settler = create_settler(&config, CHAIN, h.settler.services.clone(), EventBus::new(4)).unwrap();
		assert_eq!(settler.address(), SETTLER);
		assert_eq!(settler.governance().recipient(), OWNER);
		assert_eq!(settler.governance().current(), U256::from(50_000_000_000_000_000u64));

		let too_high = toml::Value::Table(
			r#"
			address = "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e"
			owner = "0x0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e"
			governance_fee = "100000000000000001"
			"#
			.parse::<toml::Table>()
			.unwrap(),
		);
		assert!(matches!(
			create_settler(&too_high, CHAIN, h.settler.services.clone(), EventBus::new(4)),
			Err(SettlerError::Config(_))
		));
	}
}
