//! Canonical byte encodings of the settlement protocol.
//!
//! The bytes produced here are what oracles attest to and what the settler
//! recomputes, so every encoder is deterministic and every decoder is the
//! exact, bounds-checked inverse.

use thiserror::Error;

pub mod fill;
pub mod message;
pub mod output;
mod reader;
pub mod series;

pub use fill::*;
pub use message::*;
pub use output::*;
pub use series::*;

/// Largest length a 16-bit length prefix can carry.
pub const MAX_VARIABLE_LENGTH: usize = u16::MAX as usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
	#[error("Remote call of {0} bytes does not fit a 16-bit length")]
	RemoteCallOutOfRange(usize),
	#[error("Fulfillment context of {0} bytes does not fit a 16-bit length")]
	FulfillmentContextOutOfRange(usize),
	#[error("Payload of {0} bytes does not fit a 16-bit length")]
	PayloadOutOfRange(usize),
	#[error("{0} payloads do not fit a 16-bit count")]
	TooManyPayloads(usize),
	#[error("Unexpected end of input: needed {needed} bytes, {remaining} remaining")]
	UnexpectedEnd { needed: usize, remaining: usize },
	#[error("{0} trailing bytes after encoding")]
	TrailingBytes(usize),
	#[error("Proof series of {length} bytes is not divisible into {tuple_len}-byte tuples")]
	NotDivisible { length: usize, tuple_len: usize },
}
