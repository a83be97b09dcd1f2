//! Fill description payloads: the fact oracles attest to.
//!
//! Layout: `solver(32) | orderId(32) | timestamp(4) | token(32) | amount(32)
//! | recipient(32) | len16 | remoteCall | len16 | fulfillmentContext`.
//! Oracle, filler and chain identifiers are not part of the payload; they
//! travel beside its hash in the proof series.

use crate::{output::write_delivery, reader::Reader, CodecError, OutputFields};
use alloy::primitives::{keccak256, Bytes, B256, U256};

/// A decoded fill description borrowing its variable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillDescription<'a> {
	pub solver: B256,
	pub order_id: B256,
	pub timestamp: u32,
	pub token: B256,
	pub amount: U256,
	pub recipient: B256,
	pub remote_call: &'a [u8],
	pub fulfillment_context: &'a [u8],
}

pub fn encode_fill_description<O: OutputFields + ?Sized>(
	solver: B256,
	order_id: B256,
	timestamp: u32,
	output: &O,
) -> Result<Bytes, CodecError> {
	let mut out = Vec::with_capacity(
		32 * 5 + 4 + 4 + output.remote_call().len() + output.fulfillment_context().len(),
	);
	out.extend_from_slice(solver.as_slice());
	out.extend_from_slice(order_id.as_slice());
	out.extend_from_slice(&timestamp.to_be_bytes());
	write_delivery(&mut out, output)?;
	Ok(out.into())
}

pub fn decode_fill_description(bytes: &[u8]) -> Result<FillDescription<'_>, CodecError> {
	let mut reader = Reader::new(bytes);
	let fill = FillDescription {
		solver: reader.b256()?,
		order_id: reader.b256()?,
		timestamp: reader.u32()?,
		token: reader.b256()?,
		amount: reader.u256()?,
		recipient: reader.b256()?,
		remote_call: reader.prefixed()?,
		fulfillment_context: reader.prefixed()?,
	};
	reader.finish()?;
	Ok(fill)
}

/// keccak256 of the encoded fill description.
pub fn fill_payload_hash<O: OutputFields + ?Sized>(
	solver: B256,
	order_id: B256,
	timestamp: u32,
	output: &O,
) -> Result<B256, CodecError> {
	Ok(keccak256(encode_fill_description(solver, order_id, timestamp, output)?))
}
