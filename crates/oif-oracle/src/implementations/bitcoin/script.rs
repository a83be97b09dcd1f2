//! Bitcoin token identifiers and output scripts.
//!
//! A Bitcoin output is described by a token identifier whose first 30 bytes
//! are a fixed signifier, byte 30 the required confirmations and byte 31 the
//! address type. The recipient carries the script hash: 20-byte hashes in the
//! high bytes, 32-byte witness programs in full.

use crate::OracleError;
use alloy::primitives::B256;

/// `0x000000000000000000000000BC` followed by zeros, 30 bytes.
pub const BITCOIN_TOKEN_PREFIX: [u8; 30] = {
	let mut prefix = [0u8; 30];
	prefix[12] = 0xbc;
	prefix
};

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_EQUAL: u8 = 0x87;
const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_RETURN: u8 = 0x6a;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AddressType {
	P2pkh = 1,
	P2sh = 2,
	P2wpkh = 3,
	P2wsh = 4,
	P2tr = 5,
}

impl TryFrom<u8> for AddressType {
	type Error = OracleError;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			1 => Ok(AddressType::P2pkh),
			2 => Ok(AddressType::P2sh),
			3 => Ok(AddressType::P2wpkh),
			4 => Ok(AddressType::P2wsh),
			5 => Ok(AddressType::P2tr),
			other => Err(OracleError::UnsupportedAddressType(other)),
		}
	}
}

/// Parsed Bitcoin token identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitcoinToken {
	/// Required confirmations, at least 1.
	pub confirmations: u8,
	pub address_type: AddressType,
}

impl BitcoinToken {
	pub fn parse(token: B256) -> Result<Self, OracleError> {
		if token[..30] != BITCOIN_TOKEN_PREFIX {
			return Err(OracleError::BadTokenFormat(token));
		}
		Ok(Self {
			confirmations: token[30].max(1),
			address_type: AddressType::try_from(token[31])?,
		})
	}

	pub fn encode(confirmations: u8, address_type: AddressType) -> B256 {
		let mut token = [0u8; 32];
		token[..30].copy_from_slice(&BITCOIN_TOKEN_PREFIX);
		token[30] = confirmations;
		token[31] = address_type as u8;
		B256::from(token)
	}
}

/// The locking script an output to `recipient` must carry.
pub fn output_script(address_type: AddressType, recipient: &B256) -> Vec<u8> {
	let hash20 = &recipient[..20];
	match address_type {
		AddressType::P2pkh => {
			let mut script = vec![OP_DUP, OP_HASH160, 20];
			script.extend_from_slice(hash20);
			script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
			script
		}
		AddressType::P2sh => {
			let mut script = vec![OP_HASH160, 20];
			script.extend_from_slice(hash20);
			script.push(OP_EQUAL);
			script
		}
		AddressType::P2wpkh => {
			let mut script = vec![OP_0, 20];
			script.extend_from_slice(hash20);
			script
		}
		AddressType::P2wsh => {
			let mut script = vec![OP_0, 32];
			script.extend_from_slice(recipient.as_slice());
			script
		}
		AddressType::P2tr => {
			let mut script = vec![OP_1, 32];
			script.extend_from_slice(recipient.as_slice());
			script
		}
	}
}

/// `OP_RETURN <data>` with the smallest push opcode for the length.
pub fn op_return_script(data: &[u8]) -> Vec<u8> {
	let mut script = Vec::with_capacity(data.len() + 4);
	script.push(OP_RETURN);
	match data.len() {
		len if len <= 75 => script.push(len as u8),
		len if len <= 0xff => {
			script.push(OP_PUSHDATA1);
			script.push(len as u8);
		}
		len => {
			script.push(OP_PUSHDATA2);
			script.extend_from_slice(&(len as u16).to_le_bytes());
		}
	}
	script.extend_from_slice(data);
	script
}
