use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// An off-chain signed swap instruction redeemable by the settlement contract.
///
/// Built once per settlement attempt and never modified after signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
	pub maker: Address,
	pub recipient: Address,
	pub token_in: Address,
	pub token_out: Address,
	pub amount_in: U256,
	pub min_out: U256,
	/// Unix timestamp in seconds.
	pub deadline: u64,
	pub nonce: U256,
	/// Random correlation id with no on-chain meaning.
	pub ref_id: B256,
}

impl Intent {
	pub fn is_expired(&self, now_secs: u64) -> bool {
		now_secs >= self.deadline
	}
}

/// EIP-712 payload for an intent, as handed to a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataEnvelope {
	pub chain_id: u64,
	pub verifying_contract: Address,
	/// `keccak256("\x19\x01" || domainSeparator || structHash)`
	pub signing_hash: B256,
	/// The `eth_signTypedData_v4` JSON document.
	pub typed_data: serde_json::Value,
}
