//! Output description encoding.
//!
//! Layout: `remoteOracle | remoteFiller | chainId | token | amount | recipient
//! | len16(remoteCall) | remoteCall | len16(fulfillmentContext) |
//! fulfillmentContext`, all fixed fields 32 bytes big-endian.

use crate::{reader::Reader, CodecError, MAX_VARIABLE_LENGTH};
use alloy::primitives::{keccak256, Bytes, B256, U256};
use oif_types::MandateOutput;

/// Read access to an output's fields, whether owned or borrowed from an
/// encoded buffer. Encoders are generic over this so both representations
/// hash identically.
pub trait OutputFields {
	fn remote_oracle(&self) -> B256;
	fn remote_filler(&self) -> B256;
	fn chain_id(&self) -> U256;
	fn token(&self) -> B256;
	fn amount(&self) -> U256;
	fn recipient(&self) -> B256;
	fn remote_call(&self) -> &[u8];
	fn fulfillment_context(&self) -> &[u8];
}

impl OutputFields for MandateOutput {
	fn remote_oracle(&self) -> B256 {
		self.remote_oracle
	}
	fn remote_filler(&self) -> B256 {
		self.remote_filler
	}
	fn chain_id(&self) -> U256 {
		self.chain_id
	}
	fn token(&self) -> B256 {
		self.token
	}
	fn amount(&self) -> U256 {
		self.amount
	}
	fn recipient(&self) -> B256 {
		self.recipient
	}
	fn remote_call(&self) -> &[u8] {
		&self.remote_call
	}
	fn fulfillment_context(&self) -> &[u8] {
		&self.fulfillment_context
	}
}

/// An output decoded in place; variable fields borrow from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MandateOutputView<'a> {
	pub remote_oracle: B256,
	pub remote_filler: B256,
	pub chain_id: U256,
	pub token: B256,
	pub amount: U256,
	pub recipient: B256,
	pub remote_call: &'a [u8],
	pub fulfillment_context: &'a [u8],
}

impl MandateOutputView<'_> {
	pub fn to_owned_output(&self) -> MandateOutput {
		MandateOutput {
			remote_oracle: self.remote_oracle,
			remote_filler: self.remote_filler,
			chain_id: self.chain_id,
			token: self.token,
			amount: self.amount,
			recipient: self.recipient,
			remote_call: Bytes::copy_from_slice(self.remote_call),
			fulfillment_context: Bytes::copy_from_slice(self.fulfillment_context),
		}
	}
}

impl OutputFields for MandateOutputView<'_> {
	fn remote_oracle(&self) -> B256 {
		self.remote_oracle
	}
	fn remote_filler(&self) -> B256 {
		self.remote_filler
	}
	fn chain_id(&self) -> U256 {
		self.chain_id
	}
	fn token(&self) -> B256 {
		self.token
	}
	fn amount(&self) -> U256 {
		self.amount
	}
	fn recipient(&self) -> B256 {
		self.recipient
	}
	fn remote_call(&self) -> &[u8] {
		self.remote_call
	}
	fn fulfillment_context(&self) -> &[u8] {
		self.fulfillment_context
	}
}

/// Length prefix for `remoteCall`, or `RemoteCallOutOfRange`.
pub(crate) fn remote_call_len(call: &[u8]) -> Result<[u8; 2], CodecError> {
	if call.len() > MAX_VARIABLE_LENGTH {
		return Err(CodecError::RemoteCallOutOfRange(call.len()));
	}
	Ok((call.len() as u16).to_be_bytes())
}

/// Length prefix for `fulfillmentContext`, or `FulfillmentContextOutOfRange`.
pub(crate) fn context_len(context: &[u8]) -> Result<[u8; 2], CodecError> {
	if context.len() > MAX_VARIABLE_LENGTH {
		return Err(CodecError::FulfillmentContextOutOfRange(context.len()));
	}
	Ok((context.len() as u16).to_be_bytes())
}

/// Appends `token | amount | recipient | len16 | call | len16 | context`.
pub(crate) fn write_delivery<O: OutputFields + ?Sized>(
	out: &mut Vec<u8>,
	output: &O,
) -> Result<(), CodecError> {
	let call_len = remote_call_len(output.remote_call())?;
	let ctx_len = context_len(output.fulfillment_context())?;
	out.extend_from_slice(output.token().as_slice());
	out.extend_from_slice(&output.amount().to_be_bytes::<32>());
	out.extend_from_slice(output.recipient().as_slice());
	out.extend_from_slice(&call_len);
	out.extend_from_slice(output.remote_call());
	out.extend_from_slice(&ctx_len);
	out.extend_from_slice(output.fulfillment_context());
	Ok(())
}

pub fn encode_output_description<O: OutputFields + ?Sized>(output: &O) -> Result<Bytes, CodecError> {
	let mut out = Vec::with_capacity(
		32 * 6 + 4 + output.remote_call().len() + output.fulfillment_context().len(),
	);
	out.extend_from_slice(output.remote_oracle().as_slice());
	out.extend_from_slice(output.remote_filler().as_slice());
	out.extend_from_slice(&output.chain_id().to_be_bytes::<32>());
	write_delivery(&mut out, output)?;
	Ok(out.into())
}

pub fn decode_output_description(bytes: &[u8]) -> Result<MandateOutputView<'_>, CodecError> {
	let mut reader = Reader::new(bytes);
	let view = MandateOutputView {
		remote_oracle: reader.b256()?,
		remote_filler: reader.b256()?,
		chain_id: reader.u256()?,
		token: reader.b256()?,
		amount: reader.u256()?,
		recipient: reader.b256()?,
		remote_call: reader.prefixed()?,
		fulfillment_context: reader.prefixed()?,
	};
	reader.finish()?;
	Ok(view)
}

/// Filler deduplication key: keccak256 over `token | amount | recipient | remoteCall`.
///
/// Oracle, filler, chain and pricing context are not part of the key.
pub fn output_hash<O: OutputFields + ?Sized>(output: &O) -> B256 {
	let mut buf = Vec::with_capacity(96 + output.remote_call().len());
	buf.extend_from_slice(output.token().as_slice());
	buf.extend_from_slice(&output.amount().to_be_bytes::<32>());
	buf.extend_from_slice(output.recipient().as_slice());
	buf.extend_from_slice(output.remote_call());
	keccak256(&buf)
}

/// keccak256 of the full output description; distinguishes every field.
pub fn output_identifier<O: OutputFields + ?Sized>(output: &O) -> Result<B256, CodecError> {
	Ok(keccak256(encode_output_description(output)?))
}
