use alloy::primitives::{Address, Bytes, TxHash, B256};
use serde::{Deserialize, Serialize};

/// A single log entry from a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
	pub address: Address,
	pub topics: Vec<B256>,
	#[serde(default)]
	pub data: Bytes,
}

/// Terminal receipt for a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
	pub transaction_hash: TxHash,
	pub block_number: Option<u64>,
	pub success: bool,
	#[serde(default)]
	pub logs: Vec<ReceiptLog>,
}

impl Receipt {
	/// First indexed topic at `index` of a log emitted by `emitter` whose
	/// first topic equals `signature`.
	pub fn find_indexed(&self, emitter: Address, signature: B256, index: usize) -> Option<B256> {
		self.logs
			.iter()
			.filter(|log| log.address == emitter)
			.filter(|log| log.topics.first() == Some(&signature))
			.find_map(|log| log.topics.get(index).copied())
	}
}
