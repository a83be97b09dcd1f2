//! SPV inclusion proofs: block headers, Merkle paths, legacy transactions.
//!
//! Hashes are kept in Bitcoin's internal byte order throughout (the raw
//! double-SHA256 digest), which is also how the light client reports them.

use crate::OracleError;
use alloy::primitives::{Bytes, B256};
use sha2::{Digest, Sha256};

pub const HEADER_LEN: usize = 80;

pub fn sha256d(data: &[u8]) -> B256 {
	let first = Sha256::digest(data);
	B256::from_slice(&Sha256::digest(first))
}

/// Evidence that a transaction is part of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
	/// The 80-byte block header.
	pub block_header: Bytes,
	pub tx_id: B256,
	/// Position of the transaction in the block.
	pub tx_index: u64,
	/// Sibling hashes from the leaf up to the root.
	pub merkle_siblings: Vec<B256>,
	/// Transaction serialized without witness data.
	pub raw_tx: Bytes,
}

/// A validated 80-byte header.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader<'a> {
	bytes: &'a [u8],
}

impl<'a> BlockHeader<'a> {
	pub fn parse(bytes: &'a [u8]) -> Result<Self, OracleError> {
		if bytes.len() != HEADER_LEN {
			return Err(OracleError::InvalidProof("block header must be 80 bytes"));
		}
		Ok(Self { bytes })
	}

	pub fn hash(&self) -> B256 {
		sha256d(self.bytes)
	}

	pub fn previous_block_hash(&self) -> B256 {
		B256::from_slice(&self.bytes[4..36])
	}

	pub fn merkle_root(&self) -> B256 {
		B256::from_slice(&self.bytes[36..68])
	}

	pub fn timestamp(&self) -> u32 {
		u32::from_le_bytes([self.bytes[68], self.bytes[69], self.bytes[70], self.bytes[71]])
	}
}

/// Folds a Merkle path from a leaf up to the root.
pub fn compute_merkle_root(leaf: B256, mut index: u64, siblings: &[B256]) -> B256 {
	let mut node = leaf;
	let mut buf = [0u8; 64];
	for sibling in siblings {
		if index & 1 == 0 {
			buf[..32].copy_from_slice(node.as_slice());
			buf[32..].copy_from_slice(sibling.as_slice());
		} else {
			buf[..32].copy_from_slice(sibling.as_slice());
			buf[32..].copy_from_slice(node.as_slice());
		}
		node = sha256d(&buf);
		index >>= 1;
	}
	node
}

/// One transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutput<'a> {
	pub value: u64,
	pub script: &'a [u8],
}

struct TxReader<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> TxReader<'a> {
	fn take(&mut self, len: usize) -> Result<&'a [u8], OracleError> {
		let end = self
			.pos
			.checked_add(len)
			.filter(|end| *end <= self.data.len())
			.ok_or(OracleError::InvalidProof("transaction truncated"))?;
		let slice = &self.data[self.pos..end];
		self.pos = end;
		Ok(slice)
	}

	fn le_u64(&mut self, len: usize) -> Result<u64, OracleError> {
		let mut word = [0u8; 8];
		word[..len].copy_from_slice(self.take(len)?);
		Ok(u64::from_le_bytes(word))
	}

	fn compact_size(&mut self) -> Result<u64, OracleError> {
		match self.take(1)?[0] {
			0xfd => self.le_u64(2),
			0xfe => self.le_u64(4),
			0xff => self.le_u64(8),
			n => Ok(u64::from(n)),
		}
	}

	fn var_bytes(&mut self) -> Result<&'a [u8], OracleError> {
		let len = self.compact_size()?;
		let len = usize::try_from(len).map_err(|_| OracleError::InvalidProof("length overflow"))?;
		self.take(len)
	}
}

/// Parses the outputs of a legacy-serialized transaction.
pub fn parse_outputs(raw_tx: &[u8]) -> Result<Vec<TxOutput<'_>>, OracleError> {
	let mut reader = TxReader { data: raw_tx, pos: 0 };
	reader.take(4)?;

	let inputs = reader.compact_size()?;
	if inputs == 0 {
		return Err(OracleError::InvalidProof(
			"witness serialization; supply the transaction without witness data",
		));
	}
	for _ in 0..inputs {
		reader.take(36)?;
		reader.var_bytes()?;
		reader.take(4)?;
	}

	let count = reader.compact_size()?;
	let mut outputs = Vec::new();
	for _ in 0..count {
		let value = reader.le_u64(8)?;
		let script = reader.var_bytes()?;
		outputs.push(TxOutput { value, script });
	}

	reader.take(4)?;
	if reader.pos != raw_tx.len() {
		return Err(OracleError::InvalidProof("trailing bytes after transaction"));
	}
	Ok(outputs)
}

/// Checks that the proof's header is `block_hash` and that its transaction
/// is included under the header's Merkle root.
pub fn verify_inclusion<'a>(
	proof: &'a InclusionProof,
	block_hash: B256,
) -> Result<BlockHeader<'a>, OracleError> {
	let header = BlockHeader::parse(&proof.block_header)?;
	if header.hash() != block_hash {
		return Err(OracleError::InvalidProof("header does not hash to the block"));
	}
	if sha256d(&proof.raw_tx) != proof.tx_id {
		return Err(OracleError::InvalidProof("transaction id does not match"));
	}
	// Bits of the index above the proof depth would otherwise be ignored.
	let depth = proof.merkle_siblings.len() as u32;
	if proof.tx_index.checked_shr(depth).unwrap_or(0) != 0 {
		return Err(OracleError::InvalidProof("transaction index exceeds the tree depth"));
	}
	if compute_merkle_root(proof.tx_id, proof.tx_index, &proof.merkle_siblings) != header.merkle_root() {
		return Err(OracleError::InvalidProof("transaction not included in block"));
	}
	Ok(header)
}
