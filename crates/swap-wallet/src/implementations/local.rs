//! Local private-key wallet backed by an Alloy HTTP provider.

use crate::{WalletError, WalletInterface};
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use std::sync::Arc;
use swap_types::{
	truncate_hash, Address, Bytes, ChainId, ConfigSchema, Field, FieldType, Receipt, ReceiptLog,
	Schema, TxHash, TypedDataEnvelope, ValidationError, WalletTransaction,
};
use tracing::{debug, info};

/// Wallet holding a private key in memory.
///
/// Signs EIP-712 digests locally and sends transactions through the provider,
/// which fills nonce, gas and fees before signing.
pub struct LocalWallet {
	signer: PrivateKeySigner,
	provider: DynProvider,
	chain_id: ChainId,
}

impl LocalWallet {
	/// Creates a wallet from a hex private key (with or without `0x`).
	pub fn new(private_key_hex: &str, rpc_url: &str, chain_id: ChainId) -> Result<Self, WalletError> {
		let signer = private_key_hex
			.parse::<PrivateKeySigner>()
			.map_err(|e| WalletError::InvalidKey(format!("Invalid private key: {}", e)))?
			.with_chain_id(Some(chain_id));

		let url = rpc_url
			.parse()
			.map_err(|e| WalletError::Configuration(format!("Invalid RPC URL: {}", e)))?;

		let provider = ProviderBuilder::new()
			.wallet(EthereumWallet::from(signer.clone()))
			.connect_http(url)
			.erased();

		Ok(Self {
			signer,
			provider,
			chain_id,
		})
	}
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![
				Field::new("private_key", FieldType::String).with_validator(validate_private_key),
				Field::new("rpc_url", FieldType::Url),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			// Optional fields
			vec![],
		);

		schema.validate(config)
	}
}

pub(crate) fn validate_private_key(value: &toml::Value) -> Result<(), String> {
	let key = value.as_str().unwrap_or_default();
	let key_without_prefix = key.strip_prefix("0x").unwrap_or(key);

	if key_without_prefix.len() != 64 {
		return Err("Private key must be 64 hex characters (32 bytes)".to_string());
	}
	if hex::decode(key_without_prefix).is_err() {
		return Err("Private key must be valid hexadecimal".to_string());
	}
	Ok(())
}

pub(crate) fn to_request(tx: &WalletTransaction) -> TransactionRequest {
	let mut request = TransactionRequest::default()
		.with_to(tx.to)
		.with_input(tx.data.clone())
		.with_value(tx.value);
	if let Some(gas_limit) = tx.gas_limit {
		request = request.with_gas_limit(gas_limit);
	}
	if let Some(chain_id) = tx.chain_id {
		request = request.with_chain_id(chain_id);
	}
	request
}

fn convert_receipt(receipt: &TransactionReceipt) -> Receipt {
	Receipt {
		transaction_hash: receipt.transaction_hash,
		block_number: receipt.block_number,
		success: receipt.status(),
		logs: receipt
			.inner
			.logs()
			.iter()
			.map(|log| ReceiptLog {
				address: log.address(),
				topics: log.topics().to_vec(),
				data: log.data().data.clone(),
			})
			.collect(),
	}
}

#[async_trait]
impl WalletInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, WalletError> {
		Ok(self.signer.address())
	}

	async fn chain_id(&self) -> Result<ChainId, WalletError> {
		Ok(self.chain_id)
	}

	async fn sign_typed_data(&self, payload: &TypedDataEnvelope) -> Result<Bytes, WalletError> {
		if payload.chain_id != self.chain_id {
			return Err(WalletError::ChainMismatch {
				expected: payload.chain_id,
				actual: self.chain_id,
			});
		}

		let signature = self
			.signer
			.sign_hash(&payload.signing_hash)
			.await
			.map_err(|e| WalletError::SigningFailed(e.to_string()))?;

		debug!(digest = %truncate_hash(&payload.signing_hash), "Signed typed data");
		Ok(Bytes::from(signature.as_bytes().to_vec()))
	}

	async fn send_transaction(&self, tx: WalletTransaction) -> Result<TxHash, WalletError> {
		let pending = self
			.provider
			.send_transaction(to_request(&tx))
			.await
			.map_err(|e| WalletError::from_provider_message(e.to_string()))?;

		let tx_hash = *pending.tx_hash();
		info!(tx_hash = %truncate_hash(&tx_hash), to = %tx.to, "Submitted transaction");
		Ok(tx_hash)
	}

	async fn call(&self, tx: WalletTransaction) -> Result<Bytes, WalletError> {
		self.provider
			.call(to_request(&tx))
			.await
			.map_err(|e| WalletError::Provider(format!("eth_call failed: {}", e)))
	}

	async fn gas_price(&self) -> Result<u128, WalletError> {
		self.provider
			.get_gas_price()
			.await
			.map_err(|e| WalletError::Provider(format!("Failed to get gas price: {}", e)))
	}

	async fn get_transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, WalletError> {
		let receipt = self
			.provider
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| WalletError::Provider(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.as_ref().map(convert_receipt))
	}
}

/// Factory function to create a local wallet from configuration.
///
/// Required configuration parameters:
/// - `private_key`: hex private key
/// - `rpc_url`: HTTP RPC endpoint
/// - `chain_id`: chain the key signs for
pub fn create_local_wallet(config: &toml::Value) -> Result<Arc<dyn WalletInterface>, WalletError> {
	LocalWalletSchema
		.validate(config)
		.map_err(|e| WalletError::Configuration(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.unwrap_or_default();
	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.unwrap_or_default();
	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.unwrap_or_default() as ChainId;

	Ok(Arc::new(LocalWallet::new(private_key, rpc_url, chain_id)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	fn config(key: &str) -> toml::Value {
		toml::from_str(&format!(
			"private_key = \"{}\"\nrpc_url = \"http://127.0.0.1:8545\"\nchain_id = 11155111",
			key
		))
		.unwrap()
	}

	#[test]
	fn test_schema() {
		assert!(LocalWalletSchema.validate(&config(KEY)).is_ok());
		assert!(LocalWalletSchema.validate(&config("0x1234")).is_err());
		assert!(LocalWalletSchema.validate(&config(&"zz".repeat(32))).is_err());
	}

	#[test]
	fn test_request_conversion() {
		let tx = WalletTransaction::call(Address::repeat_byte(0x11), vec![0xd0, 0xe3, 0x0d, 0xb0])
			.with_value(swap_types::U256::from(7u64))
			.with_gas_limit(21_000);
		let request = to_request(&tx);
		assert_eq!(request.to, Some(Address::repeat_byte(0x11).into()));
		assert_eq!(request.value, Some(swap_types::U256::from(7u64)));
		assert_eq!(request.gas, Some(21_000));
	}

	#[tokio::test]
	async fn test_signs_for_configured_chain_only() {
		let wallet = LocalWallet::new(KEY, "http://127.0.0.1:8545", 11155111).unwrap();
		let mut payload = TypedDataEnvelope {
			chain_id: 11155111,
			verifying_contract: Address::repeat_byte(0x22),
			signing_hash: swap_types::B256::repeat_byte(0x33),
			typed_data: serde_json::Value::Null,
		};

		let signature = wallet.sign_typed_data(&payload).await.unwrap();
		assert_eq!(signature.len(), 65);

		payload.chain_id = 1;
		assert!(matches!(
			wallet.sign_typed_data(&payload).await,
			Err(WalletError::ChainMismatch { expected: 1, .. })
		));
	}
}
