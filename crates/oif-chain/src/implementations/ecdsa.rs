//! secp256k1 signature verification over pre-hashed typed-data digests.

use crate::SignatureVerifier;
use alloy::primitives::{Address, Signature, B256};

/// Recovers the signer of a 65-byte `r | s | v` signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl SignatureVerifier for EcdsaVerifier {
	fn is_valid_signature(&self, signer: Address, digest: B256, signature: &[u8]) -> bool {
		if signer.is_zero() || signature.len() != 65 {
			return false;
		}
		Signature::from_raw(signature)
			.and_then(|sig| sig.recover_address_from_prehash(&digest))
			.is_ok_and(|recovered| recovered == signer)
	}
}
