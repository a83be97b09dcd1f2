use crate::{FillMode, FillerError, Pricing};
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use oif_chain::{CallRequest, ExternalCaller, TokenLedger, Transfer};
use oif_codec::{fill_payload_hash, output_hash};
use oif_oracle::{
	AttestationKey, AttestationQuery, AttestationStore, AttestationView, PayloadCreator,
};
use oif_types::abi::IOutputCallback;
use oif_types::{
	address_to_identifier, get_address, get_u64, identifier_to_address, CallContext, ConfigSchema,
	EventBus, Field, FieldType, FillRecord, FillerEvent, MandateOutput, OracleEvent, ProtocolEvent,
	Schema, ValidationError,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Gas forwarded to a recipient callback when none is configured.
pub const DEFAULT_CALLBACK_GAS_LIMIT: u64 = 100_000;

/// An output that passed validation, with everything its fill needs.
struct PreparedFill<'a> {
	output: &'a MandateOutput,
	output_hash: B256,
	payload_hash: B256,
	token: Address,
	recipient: Address,
	amount: U256,
}

pub struct OutputFiller {
	address: Address,
	identifier: B256,
	chain_id: u64,
	callback_gas_limit: u64,
	ledger: Arc<dyn TokenLedger>,
	caller: Arc<dyn ExternalCaller>,
	store: AttestationStore,
	/// Keyed by `(order_id, output_hash)`.
	filled: DashMap<(B256, B256), FillRecord>,
	events: EventBus,
}

impl OutputFiller {
	pub fn new(
		address: Address,
		chain_id: u64,
		ledger: Arc<dyn TokenLedger>,
		caller: Arc<dyn ExternalCaller>,
		events: EventBus,
	) -> Self {
		Self {
			address,
			identifier: address_to_identifier(address),
			chain_id,
			callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
			ledger,
			caller,
			store: AttestationStore::new(),
			filled: DashMap::new(),
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

	pub fn identifier(&self) -> B256 {
		self.identifier
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn filled_output(&self, order_id: B256, output_hash: B256) -> Option<FillRecord> {
		self.filled.get(&(order_id, output_hash)).map(|r| *r)
	}

	/// Fills one output for `proposed_solver` and returns the solver the
	/// output is attributed to: `proposed_solver` for a fresh fill, otherwise
	/// whoever filled it first.
	pub fn fill(
		&self,
		ctx: &CallContext,
		fill_deadline: u32,
		order_id: B256,
		output: &MandateOutput,
		proposed_solver: B256,
	) -> Result<B256, FillerError> {
		let attributed = self.fill_order_outputs(
			ctx,
			fill_deadline,
			order_id,
			std::slice::from_ref(output),
			proposed_solver,
			FillMode::Skip,
		)?;
		Ok(attributed[0])
	}

	/// Fills every output or none: fails if any output was filled by another solver.
	pub fn fill_throw(
		&self,
		ctx: &CallContext,
		fill_deadline: u32,
		order_id: B256,
		outputs: &[MandateOutput],
		proposed_solver: B256,
	) -> Result<Vec<B256>, FillerError> {
		self.fill_order_outputs(ctx, fill_deadline, order_id, outputs, proposed_solver, FillMode::Throw)
	}

	/// Fills the outputs nobody has filled yet and skips the rest.
	pub fn fill_skip(
		&self,
		ctx: &CallContext,
		fill_deadline: u32,
		order_id: B256,
		outputs: &[MandateOutput],
		proposed_solver: B256,
	) -> Result<Vec<B256>, FillerError> {
		self.fill_order_outputs(ctx, fill_deadline, order_id, outputs, proposed_solver, FillMode::Skip)
	}

	/// Fills `outputs` of one order. Records are written before the tokens
	/// move, as one ledger batch from the caller, and removed again if the
	/// batch fails.
	pub fn fill_order_outputs(
		&self,
		ctx: &CallContext,
		fill_deadline: u32,
		order_id: B256,
		outputs: &[MandateOutput],
		proposed_solver: B256,
		mode: FillMode,
	) -> Result<Vec<B256>, FillerError> {
		if ctx.timestamp > fill_deadline {
			return Err(FillerError::FillDeadlinePassed {
				deadline: fill_deadline,
				now: ctx.timestamp,
			});
		}
		for output in outputs {
			self.check_destination(output)?;
		}
		if proposed_solver.is_zero() {
			return Err(FillerError::ZeroSolver);
		}

		let prepared = outputs
			.iter()
			.map(|output| self.prepare(ctx, order_id, output, proposed_solver))
			.collect::<Result<Vec<_>, _>>()?;

		let mut attributed = Vec::with_capacity(prepared.len());
		let mut fresh = Vec::new();
		for (index, fill) in prepared.iter().enumerate() {
			match self.filled.entry((order_id, fill.output_hash)) {
				Entry::Occupied(entry) => {
					let existing = entry.get().solver;
					drop(entry);
					if existing != proposed_solver {
						if mode == FillMode::Throw {
							self.rollback(order_id, &prepared, &fresh);
							return Err(FillerError::AlreadyFilled(existing));
						}
						warn!(%order_id, output_hash = %fill.output_hash, %existing, "output filled by another solver");
					} else {
						debug!(%order_id, output_hash = %fill.output_hash, "output already filled by this solver");
					}
					attributed.push(existing);
				}
				Entry::Vacant(slot) => {
					slot.insert(FillRecord {
						solver: proposed_solver,
						timestamp: ctx.timestamp,
					});
					fresh.push(index);
					attributed.push(proposed_solver);
				}
			}
		}

		if let Err(e) = self.check_callback_gas(ctx, &prepared, &fresh) {
			self.rollback(order_id, &prepared, &fresh);
			return Err(e);
		}

		let transfers: Vec<Transfer> = fresh
			.iter()
			.map(|&i| Transfer {
				token: prepared[i].token,
				from: ctx.caller,
				to: prepared[i].recipient,
				amount: prepared[i].amount,
			})
			.collect();
		if !transfers.is_empty() {
			if let Err(e) = self.ledger.transfer_from_batch(self.address, &transfers) {
				self.rollback(order_id, &prepared, &fresh);
				return Err(e.into());
			}
		}

		for &i in &fresh {
			let fill = &prepared[i];
			self.attest(fill.payload_hash);
			if !fill.output.remote_call.is_empty() {
				self.notify_recipient(order_id, fill);
			}
			info!(
				%order_id,
				solver = %proposed_solver,
				recipient = %fill.recipient,
				amount = %fill.amount,
				"output filled"
			);
			self.events
				.publish(ProtocolEvent::Filler(FillerEvent::OutputFilled {
					order_id,
					solver: proposed_solver,
					timestamp: ctx.timestamp,
					output: fill.output.clone(),
					final_amount: fill.amount,
				}))
				.ok();
		}

		Ok(attributed)
	}

	fn check_destination(&self, output: &MandateOutput) -> Result<(), FillerError> {
		let chain_id = U256::from(self.chain_id);
		if output.chain_id != chain_id {
			return Err(FillerError::WrongChain {
				expected: chain_id,
				actual: output.chain_id,
			});
		}
		if output.remote_filler != self.identifier {
			return Err(FillerError::WrongRemoteFiller {
				expected: self.identifier,
				actual: output.remote_filler,
			});
		}
		Ok(())
	}

	fn prepare<'a>(
		&self,
		ctx: &CallContext,
		order_id: B256,
		output: &'a MandateOutput,
		solver: B256,
	) -> Result<PreparedFill<'a>, FillerError> {
		let amount = Pricing::parse(&output.fulfillment_context)?.effective_amount(output.amount, ctx.timestamp)?;
		Ok(PreparedFill {
			output,
			output_hash: output_hash(output),
			payload_hash: fill_payload_hash(solver, order_id, ctx.timestamp, output)?,
			token: identifier_to_address(output.token)?,
			recipient: identifier_to_address(output.recipient)?,
			amount,
		})
	}

	/// Every callback is promised `callback_gas_limit`; the caller must be
	/// able to forward all of it.
	/// Only fresh fills run their callback, so only they need gas.
	fn check_callback_gas(
		&self,
		ctx: &CallContext,
		prepared: &[PreparedFill<'_>],
		fresh: &[usize],
	) -> Result<(), FillerError> {
		let callbacks = fresh
			.iter()
			.filter(|&&i| !prepared[i].output.remote_call.is_empty())
			.count() as u64;
		let required = self.callback_gas_limit.saturating_mul(callbacks);
		let available = ctx.forwardable_gas();
		if available < required {
			return Err(FillerError::NotEnoughGasExecution { required, available });
		}
		Ok(())
	}

	fn rollback(&self, order_id: B256, prepared: &[PreparedFill<'_>], fresh: &[usize]) {
		for &i in fresh {
			self.filled.remove(&(order_id, prepared[i].output_hash));
		}
	}

	fn attest(&self, payload_hash: B256) {
		let key = AttestationKey {
			chain_id: U256::from(self.chain_id),
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
	}

	/// Best effort: a failing recipient does not undo the fill.
	fn notify_recipient(&self, order_id: B256, fill: &PreparedFill<'_>) {
		let data = IOutputCallback::outputFilledCall {
			token: fill.output.token,
			amount: fill.amount,
			executionData: fill.output.remote_call.clone(),
		}
		.abi_encode();
		let outcome = self.caller.call(&CallRequest {
			from: self.address,
			to: fill.recipient,
			data: data.into(),
			gas_limit: self.callback_gas_limit,
		});
		if !outcome.success {
			warn!(%order_id, recipient = %fill.recipient, gas_used = outcome.gas_used, "output callback failed");
		}
	}
}

impl AttestationQuery for OutputFiller {
	fn attestations(&self) -> AttestationView<'_> {
		self.store.view()
	}
}

impl PayloadCreator for OutputFiller {
	fn are_payloads_valid(&self, payloads: &[Bytes]) -> bool {
		let chain_id = U256::from(self.chain_id);
		payloads
			.iter()
			.all(|payload| self.store.is_proven(chain_id, self.identifier, keccak256(payload)))
	}
}

pub struct FillerSchema;

impl ConfigSchema for FillerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("address", FieldType::Address)],
			vec![Field::new(
				"callback_gas_limit",
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a filler from configuration.
///
/// Required configuration parameters:
/// - `address`: Address the filler is deployed at
///
/// Optional configuration parameters:
/// - `callback_gas_limit`: Gas forwarded to recipient callbacks (default: 100000)
pub fn create_filler(
	config: &toml::Value,
	chain_id: u64,
	ledger: Arc<dyn TokenLedger>,
	caller: Arc<dyn ExternalCaller>,
	events: EventBus,
) -> Result<OutputFiller, FillerError> {
	FillerSchema.validate(config)?;
	let address = get_address(config, "address")?;
	let callback_gas_limit = get_u64(config, "callback_gas_limit", Some(DEFAULT_CALLBACK_GAS_LIMIT))?;
	Ok(OutputFiller::new(address, chain_id, ledger, caller, events).with_callback_gas_limit(callback_gas_limit))
}
