//! Wallet capability for the swap engine.
//!
//! A wallet signs EIP-712 payloads, sends transactions and answers read-only
//! RPC calls for the connected account. Implementations live under
//! [`implementations`]; [`WalletResolver`] picks which one is active.

use async_trait::async_trait;
use std::sync::Arc;
use swap_types::{
	Address, Bytes, ChainId, ConfigSchema, Receipt, TxHash, TypedDataEnvelope, WalletTransaction,
};
use thiserror::Error;

pub mod implementations {
	pub mod local;
	pub mod simulated;
}

pub mod rejection;
pub mod resolver;

pub use rejection::{friendly_error_message, is_rejection_message};
pub use resolver::{ResolvedWallet, WalletResolver, WalletSource};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
	#[error("Wallet not connected")]
	NotConnected,
	#[error("User rejected the request: {0}")]
	UserRejected(String),
	#[error("Wallet is on chain {actual}, expected {expected}")]
	ChainMismatch { expected: ChainId, actual: ChainId },
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Provider error: {0}")]
	Provider(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl WalletError {
	/// Classifies a raw provider error, recognising wallet rejections.
	pub fn from_provider_message(message: impl Into<String>) -> Self {
		let message = message.into();
		if is_rejection_message(&message) {
			WalletError::UserRejected(message)
		} else {
			WalletError::Provider(message)
		}
	}

	pub fn is_user_rejection(&self) -> bool {
		matches!(self, WalletError::UserRejected(_))
	}
}

/// EIP-1193-like wallet capability.
///
/// Callers must not issue concurrent signing or sending requests expecting
/// independent results; serialisation is the caller's responsibility.
#[async_trait]
pub trait WalletInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// The connected account.
	async fn address(&self) -> Result<Address, WalletError>;

	async fn chain_id(&self) -> Result<ChainId, WalletError>;

	/// `eth_signTypedData_v4`. Returns the 65-byte signature.
	async fn sign_typed_data(&self, payload: &TypedDataEnvelope) -> Result<Bytes, WalletError>;

	/// `eth_sendTransaction`.
	async fn send_transaction(&self, tx: WalletTransaction) -> Result<TxHash, WalletError>;

	/// `eth_call` against the latest block.
	async fn call(&self, tx: WalletTransaction) -> Result<Bytes, WalletError>;

	/// Current gas price in wei.
	async fn gas_price(&self) -> Result<u128, WalletError>;

	async fn get_transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, WalletError>;
}

/// Builds a wallet from its implementation name and settings table.
pub fn create_wallet(
	implementation: &str,
	config: &toml::Value,
) -> Result<Arc<dyn WalletInterface>, WalletError> {
	match implementation {
		"local" => implementations::local::create_local_wallet(config),
		"simulated" => implementations::simulated::create_simulated_wallet(config),
		other => Err(WalletError::Configuration(format!(
			"Unknown wallet implementation: {}",
			other
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_provider_message_classification() {
		assert!(WalletError::from_provider_message("MetaMask: User denied transaction signature")
			.is_user_rejection());
		assert!(matches!(
			WalletError::from_provider_message("nonce too low"),
			WalletError::Provider(_)
		));
	}

	#[test]
	fn test_unknown_implementation() {
		let config = toml::Value::Table(toml::Table::new());
		assert!(matches!(
			create_wallet("hardware", &config),
			Err(WalletError::Configuration(_))
		));
	}
}
