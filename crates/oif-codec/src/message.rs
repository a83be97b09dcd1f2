//! Relay message encoding: `application(32) | count(2) | [len16 | payload]*`.

use crate::{reader::Reader, CodecError, MAX_VARIABLE_LENGTH};
use alloy::primitives::{Bytes, B256};

pub fn encode_message(application: B256, payloads: &[Bytes]) -> Result<Bytes, CodecError> {
	if payloads.len() > MAX_VARIABLE_LENGTH {
		return Err(CodecError::TooManyPayloads(payloads.len()));
	}

	let body: usize = payloads.iter().map(|p| p.len() + 2).sum();
	let mut out = Vec::with_capacity(34 + body);
	out.extend_from_slice(application.as_slice());
	out.extend_from_slice(&(payloads.len() as u16).to_be_bytes());
	for payload in payloads {
		if payload.len() > MAX_VARIABLE_LENGTH {
			return Err(CodecError::PayloadOutOfRange(payload.len()));
		}
		out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
		out.extend_from_slice(payload);
	}
	Ok(out.into())
}

/// Returns the application identifier and borrowed payloads.
pub fn decode_message(message: &[u8]) -> Result<(B256, Vec<&[u8]>), CodecError> {
	let mut reader = Reader::new(message);
	let application = reader.b256()?;
	let count = reader.u16()? as usize;
	let mut payloads = Vec::with_capacity(count);
	for _ in 0..count {
		payloads.push(reader.prefixed()?);
	}
	reader.finish()?;
	Ok((application, payloads))
}
