//! In-memory Bitcoin light client.

use crate::LightClient;
use alloy::primitives::B256;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct MemoryLightClient {
	hashes: DashMap<u64, B256>,
	tip: AtomicU64,
}

impl MemoryLightClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records an accepted block; the tip only moves forward.
	pub fn accept_block(&self, height: u64, hash: B256) {
		self.hashes.insert(height, hash);
		self.tip.fetch_max(height, Ordering::SeqCst);
	}
}

impl LightClient for MemoryLightClient {
	fn latest_block_height(&self) -> u64 {
		self.tip.load(Ordering::SeqCst)
	}

	fn block_hash(&self, height: u64) -> Option<B256> {
		self.hashes.get(&height).map(|h| *h)
	}
}
