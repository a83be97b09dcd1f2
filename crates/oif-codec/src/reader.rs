use crate::CodecError;
use alloy::primitives::{B256, U256};

/// Forward-only cursor that refuses to read past the end.
pub(crate) struct Reader<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	pub(crate) fn new(data: &'a [u8]) -> Self {
		Self { data, pos: 0 }
	}

	pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
		let remaining = self.data.len() - self.pos;
		if len > remaining {
			return Err(CodecError::UnexpectedEnd {
				needed: len,
				remaining,
			});
		}
		let slice = &self.data[self.pos..self.pos + len];
		self.pos += len;
		Ok(slice)
	}

	pub(crate) fn b256(&mut self) -> Result<B256, CodecError> {
		Ok(B256::from_slice(self.take(32)?))
	}

	pub(crate) fn u256(&mut self) -> Result<U256, CodecError> {
		Ok(U256::from_be_slice(self.take(32)?))
	}

	pub(crate) fn u32(&mut self) -> Result<u32, CodecError> {
		let bytes = self.take(4)?;
		Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	pub(crate) fn u16(&mut self) -> Result<u16, CodecError> {
		let bytes = self.take(2)?;
		Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
	}

	/// `len16 | bytes`
	pub(crate) fn prefixed(&mut self) -> Result<&'a [u8], CodecError> {
		let len = self.u16()? as usize;
		self.take(len)
	}

	pub(crate) fn finish(self) -> Result<(), CodecError> {
		match self.data.len() - self.pos {
			0 => Ok(()),
			trailing => Err(CodecError::TrailingBytes(trailing)),
		}
	}
}
