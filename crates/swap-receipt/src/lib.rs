//! Transaction receipt resolution.
//!
//! A submitted settlement is confirmed by racing independent
//! [`ReceiptSource`]s. The first terminal receipt wins and the rest are
//! cancelled; see [`ReceiptResolver`].

use async_trait::async_trait;
use std::sync::Arc;
use swap_types::{ConfigSchema, Receipt, TxHash};
use thiserror::Error;

pub mod implementations {
	pub mod database;
	pub mod wallet;
}

pub mod filter;
pub mod resolver;

pub use filter::EventFilter;
pub use resolver::{ReceiptResolver, Watcher};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReceiptError {
	/// Every watcher used up its attempts without a terminal receipt.
	#[error("Timed out waiting for receipt of {0}")]
	Timeout(TxHash),
	#[error("Receipt resolution cancelled")]
	Cancelled,
	/// A single poll failed; watchers log it and keep polling.
	#[error("Receipt source error: {0}")]
	Source(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Somewhere a transaction receipt can be looked up.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Label used in logs and on the resulting confirmation.
	fn name(&self) -> &str;

	/// `Ok(None)` while the transaction is still pending.
	async fn fetch(&self, hash: TxHash) -> Result<Option<Receipt>, ReceiptError>;
}

/// Builds a receipt source from its implementation name and settings.
pub fn create_receipt_source(
	implementation: &str,
	config: &toml::Value,
) -> Result<Arc<dyn ReceiptSource>, ReceiptError> {
	match implementation {
		"jsonrpc" => implementations::database::create_database_source(config),
		other => Err(ReceiptError::Configuration(format!(
			"Unknown receipt source implementation: {}",
			other
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unknown_implementation() {
		let config = toml::Value::Table(toml::Table::new());
		assert!(matches!(
			create_receipt_source("postgres", &config),
			Err(ReceiptError::Configuration(_))
		));
	}
}
