use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A transaction for the wallet to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
	pub to: Address,
	#[serde(default)]
	pub data: Bytes,
	#[serde(default)]
	pub value: U256,
	pub gas_limit: Option<u64>,
	pub chain_id: Option<u64>,
}

impl WalletTransaction {
	pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
		Self {
			to,
			data: data.into(),
			value: U256::ZERO,
			gas_limit: None,
			chain_id: None,
		}
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
		self.gas_limit = Some(gas_limit);
		self
	}

	pub fn with_chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = Some(chain_id);
		self
	}
}
