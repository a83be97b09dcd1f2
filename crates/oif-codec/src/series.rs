//! Packed proof series.
//!
//! A proof series is a concatenation of fixed-width tuples naming attested
//! facts. Two layouts exist:
//!
//! - compact, 96 bytes: `chainId | sender | payloadHash`
//! - filler-aware, 128 bytes: `chainId | remoteOracle | remoteFiller | payloadHash`
//!
//! The compact layout is the filler-aware one with `remoteFiller == sender`.

use crate::CodecError;
use alloy::primitives::{B256, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesLayout {
	Compact,
	FillerAware,
}

impl SeriesLayout {
	pub const fn tuple_len(self) -> usize {
		match self {
			SeriesLayout::Compact => 96,
			SeriesLayout::FillerAware => 128,
		}
	}
}

/// One attested fact named by a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProofTuple {
	pub chain_id: U256,
	pub oracle: B256,
	pub application: B256,
	pub payload_hash: B256,
}

/// Builder for a packed series.
#[derive(Debug, Clone)]
pub struct ProofSeries {
	layout: SeriesLayout,
	bytes: Vec<u8>,
}

impl ProofSeries {
	pub fn new(layout: SeriesLayout) -> Self {
		Self {
			layout,
			bytes: Vec::new(),
		}
	}

	pub fn with_capacity(layout: SeriesLayout, tuples: usize) -> Self {
		Self {
			layout,
			bytes: Vec::with_capacity(tuples * layout.tuple_len()),
		}
	}

	/// Appends a tuple. In the compact layout `application` is dropped.
	pub fn push(&mut self, tuple: &ProofTuple) {
		self.bytes.extend_from_slice(&tuple.chain_id.to_be_bytes::<32>());
		self.bytes.extend_from_slice(tuple.oracle.as_slice());
		if self.layout == SeriesLayout::FillerAware {
			self.bytes.extend_from_slice(tuple.application.as_slice());
		}
		self.bytes.extend_from_slice(tuple.payload_hash.as_slice());
	}

	pub fn len(&self) -> usize {
		self.bytes.len() / self.layout.tuple_len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}
}

/// Splits a series into tuples after checking divisibility.
///
/// Nothing is yielded for a malformed series, so a caller can never act on a
/// prefix of it.
pub fn parse_series(
	layout: SeriesLayout,
	series: &[u8],
) -> Result<impl Iterator<Item = ProofTuple> + '_, CodecError> {
	let tuple_len = layout.tuple_len();
	if series.len() % tuple_len != 0 {
		return Err(CodecError::NotDivisible {
			length: series.len(),
			tuple_len,
		});
	}

	Ok(series.chunks_exact(tuple_len).map(move |chunk| {
		let chain_id = U256::from_be_slice(&chunk[0..32]);
		let oracle = B256::from_slice(&chunk[32..64]);
		match layout {
			SeriesLayout::Compact => ProofTuple {
				chain_id,
				oracle,
				application: oracle,
				payload_hash: B256::from_slice(&chunk[64..96]),
			},
			SeriesLayout::FillerAware => ProofTuple {
				chain_id,
				oracle,
				application: B256::from_slice(&chunk[64..96]),
				payload_hash: B256::from_slice(&chunk[96..128]),
			},
		}
	}))
}
