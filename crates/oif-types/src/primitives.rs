//! 32-byte identifier conventions.
//!
//! Every cross-chain reference (oracle, filler, token, recipient, solver) is a
//! 32-byte identifier. EVM addresses occupy the low 20 bytes with 12 leading
//! zero bytes; non-EVM chains may use all 32 bytes.

pub use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use thiserror::Error;

/// Identifier conversion failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
	#[error("Invalid EVM address in bytes32: {0}")]
	NotAnAddress(B256),
}

/// Right-aligns an EVM address into a 32-byte identifier.
pub fn address_to_identifier(addr: Address) -> B256 {
	addr.into_word()
}

/// Converts an identifier back to an address, rejecting non-zero high bytes.
pub fn identifier_to_address(identifier: B256) -> Result<Address, IdentifierError> {
	if identifier[..12].iter().any(|&b| b != 0) {
		return Err(IdentifierError::NotAnAddress(identifier));
	}
	Ok(Address::from_word(identifier))
}

/// Takes the low 20 bytes, the way `address(uint160(uint256(x)))` does.
pub fn truncate_to_address(identifier: B256) -> Address {
	Address::from_word(identifier)
}

/// Big-endian 32-byte word of an unsigned integer.
pub fn u256_to_word(value: U256) -> B256 {
	B256::from(value.to_be_bytes::<32>())
}
