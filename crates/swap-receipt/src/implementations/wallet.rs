//! Receipts read through the active wallet's RPC.
//!
//! The wallet is resolved on every poll, so a reconnect mid-watch is honoured.

use crate::{ReceiptError, ReceiptSource};
use async_trait::async_trait;
use std::sync::Arc;
use swap_types::{ConfigSchema, Receipt, Schema, TxHash, ValidationError};
use swap_wallet::WalletResolver;

pub struct WalletReceiptSource {
	wallets: Arc<WalletResolver>,
}

impl WalletReceiptSource {
	pub fn new(wallets: Arc<WalletResolver>) -> Self {
		Self { wallets }
	}
}

pub struct WalletReceiptSchema;

impl ConfigSchema for WalletReceiptSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

#[async_trait]
impl ReceiptSource for WalletReceiptSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(WalletReceiptSchema)
	}

	fn name(&self) -> &str {
		"rpc"
	}

	async fn fetch(&self, hash: TxHash) -> Result<Option<Receipt>, ReceiptError> {
		let wallet = self
			.wallets
			.wallet()
			.await
			.map_err(|e| ReceiptError::Source(e.to_string()))?;
		wallet
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| ReceiptError::Source(e.to_string()))
	}
}
