//! Extraction of an indexed event value from a confirmed receipt.

use alloy::primitives::keccak256;
use swap_types::{Address, Receipt, B256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
	pub contract: Address,
	pub topic0: B256,
	pub topic_index: usize,
}

impl EventFilter {
	/// `signature` is the canonical form, e.g. `Transfer(address,address,uint256)`.
	pub fn new(contract: Address, signature: &str, topic_index: usize) -> Self {
		Self {
			contract,
			topic0: keccak256(signature.as_bytes()),
			topic_index,
		}
	}

	pub fn with_topic0(contract: Address, topic0: B256, topic_index: usize) -> Self {
		Self {
			contract,
			topic0,
			topic_index,
		}
	}

	/// `None` when the event was not emitted.
	pub fn extract(&self, receipt: &Receipt) -> Option<B256> {
		receipt.find_indexed(self.contract, self.topic0, self.topic_index)
	}
}
