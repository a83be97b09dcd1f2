//! Write-once attestation store and proof-series verification.

use crate::OracleError;
use alloy::primitives::{B256, U256};
use dashmap::DashSet;
use oif_codec::{parse_series, ProofTuple, SeriesLayout};

/// Namespace of one attested payload.
///
/// `application` is the filler (or payload creator) the oracle vouches for.
/// Self-attesting oracles record with `application == oracle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttestationKey {
	pub chain_id: U256,
	pub oracle: B256,
	pub application: B256,
	pub payload_hash: B256,
}

impl From<ProofTuple> for AttestationKey {
	fn from(t: ProofTuple) -> Self {
		Self {
			chain_id: t.chain_id,
			oracle: t.oracle,
			application: t.application,
			payload_hash: t.payload_hash,
		}
	}
}

/// Proven payloads of one oracle instance. Entries are never removed.
///
/// Only the component that owns the store records into it. Everything else
/// reads through an [`AttestationView`].
#[derive(Debug, Default)]
pub struct AttestationStore {
	proven: DashSet<AttestationKey>,
}

impl AttestationStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn view(&self) -> AttestationView<'_> {
		AttestationView { store: self }
	}

	/// Marks a payload proven. Returns `false` if it already was.
	pub fn record(&self, key: AttestationKey) -> bool {
		self.proven.insert(key)
	}

	pub fn is_proven(&self, chain_id: U256, sender: B256, payload_hash: B256) -> bool {
		self.is_proven_by(chain_id, sender, sender, payload_hash)
	}

	pub fn is_proven_by(
		&self,
		chain_id: U256,
		oracle: B256,
		application: B256,
		payload_hash: B256,
	) -> bool {
		self.proven.contains(&AttestationKey {
			chain_id,
			oracle,
			application,
			payload_hash,
		})
	}

	pub fn require_proven(
		&self,
		chain_id: U256,
		oracle: B256,
		application: B256,
		payload_hash: B256,
	) -> Result<(), OracleError> {
		if self.is_proven_by(chain_id, oracle, application, payload_hash) {
			Ok(())
		} else {
			Err(OracleError::NotProven {
				chain_id,
				oracle,
				application,
				payload_hash,
			})
		}
	}

	/// Every tuple of a filler-aware series must be proven. An empty series
	/// passes; a length that is not a multiple of 128 fails.
	pub fn efficient_require_proven(&self, series: &[u8]) -> Result<(), OracleError> {
		self.require_series(SeriesLayout::FillerAware, series)
	}

	/// Compact (96-byte tuple) variant of [`Self::efficient_require_proven`].
	pub fn efficient_require_proven_compact(&self, series: &[u8]) -> Result<(), OracleError> {
		self.require_series(SeriesLayout::Compact, series)
	}

	fn require_series(&self, layout: SeriesLayout, series: &[u8]) -> Result<(), OracleError> {
		for tuple in parse_series(layout, series)? {
			self.require_proven(tuple.chain_id, tuple.oracle, tuple.application, tuple.payload_hash)?;
		}
		Ok(())
	}

	pub fn len(&self) -> usize {
		self.proven.len()
	}

	pub fn is_empty(&self) -> bool {
		self.proven.is_empty()
	}
}

/// Read-only handle on an [`AttestationStore`].
///
/// A view cannot record:
///
/// ```compile_fail
/// use oif_oracle::{AttestationKey, AttestationQuery, AttestationStore, AttestationView};
///
/// struct Oracle(AttestationStore);
///
/// impl AttestationQuery for Oracle {
/// 	fn attestations(&self) -> AttestationView<'_> {
/// 		self.0.view()
/// 	}
/// }
///
/// fn forge(oracle: &dyn AttestationQuery, key: AttestationKey) {
/// 	oracle.attestations().record(key);
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AttestationView<'a> {
	store: &'a AttestationStore,
}

impl AttestationView<'_> {
	pub fn is_proven(&self, chain_id: U256, sender: B256, payload_hash: B256) -> bool {
		self.store.is_proven(chain_id, sender, payload_hash)
	}

	pub fn is_proven_by(
		&self,
		chain_id: U256,
		oracle: B256,
		application: B256,
		payload_hash: B256,
	) -> bool {
		self.store.is_proven_by(chain_id, oracle, application, payload_hash)
	}

	pub fn require_proven(
		&self,
		chain_id: U256,
		oracle: B256,
		application: B256,
		payload_hash: B256,
	) -> Result<(), OracleError> {
		self.store.require_proven(chain_id, oracle, application, payload_hash)
	}

	pub fn efficient_require_proven(&self, series: &[u8]) -> Result<(), OracleError> {
		self.store.efficient_require_proven(series)
	}

	pub fn efficient_require_proven_compact(&self, series: &[u8]) -> Result<(), OracleError> {
		self.store.efficient_require_proven_compact(series)
	}

	pub fn len(&self) -> usize {
		self.store.len()
	}

	pub fn is_empty(&self) -> bool {
		self.store.is_empty()
	}
}
