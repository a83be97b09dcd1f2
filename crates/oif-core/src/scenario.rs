//! Same-chain settlement walkthrough.
//!
//! A user locks inputs, a solver fills the output through the local filler
//! and claims the inputs back through the settler, with the filler acting as
//! the order's oracle.

use crate::{Deployment, DeploymentError};
use alloy::primitives::{Address, B256, U256};
use oif_chain::implementations::memory_ledger::MemoryLedger;
use oif_chain::{ResourceLock, TokenLedger};
use oif_codec::encode_fill_description;
use oif_settler::ClaimSignatures;
use oif_types::{address_to_identifier, CallContext, Input, MandateOutput, StandardOrder};
use serde::Serialize;
use tracing::info;

pub const USER: Address = Address::repeat_byte(0x11);
pub const SOLVER: Address = Address::repeat_byte(0x50);
pub const RECIPIENT: Address = Address::repeat_byte(0x4e);
pub const INPUT_TOKEN: Address = Address::repeat_byte(0x0a);
pub const OUTPUT_TOKEN: Address = Address::repeat_byte(0x0b);

#[derive(Debug, Clone)]
pub struct ScenarioParams {
	pub input_amount: U256,
	pub output_amount: U256,
	pub nonce: U256,
	pub start_time: u32,
}

impl Default for ScenarioParams {
	fn default() -> Self {
		Self {
			input_amount: U256::from(1_000_000),
			output_amount: U256::from(990_000),
			nonce: U256::from(1),
			start_time: 1_700_000_000,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
	pub order_id: B256,
	pub solver: B256,
	pub fill_timestamp: u32,
	/// Hex-encoded fill description the filler attested.
	pub fill_payload: String,
	pub recipient_received: U256,
	pub solver_received: U256,
	pub governance_fee: U256,
	pub events: usize,
}

pub fn run_local_settlement(
	deployment: &Deployment,
	ledger: &MemoryLedger,
	params: &ScenarioParams,
) -> Result<SettlementReport, DeploymentError> {
	let mut events = deployment.events().subscribe();
	let chain_id = deployment.chain_id();
	let settler = deployment.settler();
	let filler = deployment.filler();

	ledger.mint(INPUT_TOKEN, USER, params.input_amount)?;
	ledger.approve(INPUT_TOKEN, USER, deployment.lock().address(), params.input_amount);
	ledger.mint(OUTPUT_TOKEN, SOLVER, params.output_amount)?;
	ledger.approve(OUTPUT_TOKEN, SOLVER, filler.address(), params.output_amount);
	let fees_before = ledger.balance_of(INPUT_TOKEN, settler.governance().recipient());

	let output = MandateOutput {
		remote_oracle: filler.identifier(),
		remote_filler: filler.identifier(),
		chain_id: U256::from(chain_id),
		token: address_to_identifier(OUTPUT_TOKEN),
		amount: params.output_amount,
		recipient: address_to_identifier(RECIPIENT),
		..Default::default()
	};
	let order = StandardOrder {
		user: USER,
		nonce: params.nonce,
		origin_chain_id: U256::from(chain_id),
		expires: params.start_time + 3600,
		fill_deadline: params.start_time + 1800,
		local_oracle: filler.address(),
		inputs: vec![Input::new(
			Input::resource_id_for([0; 12], INPUT_TOKEN),
			params.input_amount,
		)],
		outputs: vec![output.clone()],
	};

	let order_id = settler.open(&CallContext::new(chain_id, params.start_time, USER), &order)?;

	let solver = address_to_identifier(SOLVER);
	let fill_timestamp = params.start_time + 60;
	let filled_by = filler.fill(
		&CallContext::new(chain_id, fill_timestamp, SOLVER),
		order.fill_deadline,
		order_id,
		&output,
		solver,
	)?;

	settler.finalise_self(
		&CallContext::new(chain_id, params.start_time + 120, SOLVER),
		&order,
		&ClaimSignatures::default(),
		&[fill_timestamp],
		filled_by,
	)?;

	let payload = encode_fill_description(filled_by, order_id, fill_timestamp, &output)?;
	let mut observed = 0;
	while events.try_recv().is_ok() {
		observed += 1;
	}

	let report = SettlementReport {
		order_id,
		solver: filled_by,
		fill_timestamp,
		fill_payload: format!("0x{}", hex::encode(&payload)),
		recipient_received: ledger.balance_of(OUTPUT_TOKEN, RECIPIENT),
		solver_received: ledger.balance_of(INPUT_TOKEN, SOLVER),
		governance_fee: ledger.balance_of(INPUT_TOKEN, settler.governance().recipient()) - fees_before,
		events: observed,
	};
	info!(%order_id, solver_received = %report.solver_received, "local settlement completed");
	Ok(report)
}
