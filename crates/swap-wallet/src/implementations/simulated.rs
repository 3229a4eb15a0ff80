//! In-process wallet that signs for real but never broadcasts.
//!
//! Used for dry runs of the settlement flow and by tests across the
//! workspace. Sent transactions are recorded and "mined" immediately unless
//! auto-mining is switched off; `eth_call` answers come from programmed
//! results keyed by target and selector.

use crate::implementations::local::validate_private_key;
use crate::{WalletError, WalletInterface};
use alloy::primitives::keccak256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use swap_types::{
	truncate_hash, Address, Bytes, ChainId, ConfigSchema, Field, FieldType, Receipt, ReceiptLog,
	Schema, TxHash, TypedDataEnvelope, ValidationError, WalletTransaction,
};
use tracing::info;

type CallKey = (Address, [u8; 4]);

pub struct SimulatedWallet {
	signer: PrivateKeySigner,
	chain_id: ChainId,
	rejecting: AtomicBool,
	auto_mine: AtomicBool,
	reverting: AtomicBool,
	gas_price: AtomicU64,
	counter: AtomicU64,
	sent: Mutex<Vec<WalletTransaction>>,
	signed: Mutex<Vec<TypedDataEnvelope>>,
	receipts: Mutex<HashMap<TxHash, Receipt>>,
	call_results: Mutex<HashMap<CallKey, Bytes>>,
	receipt_logs: Mutex<Vec<ReceiptLog>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	m.lock().unwrap_or_else(|e| e.into_inner())
}

impl SimulatedWallet {
	pub fn new(signer: PrivateKeySigner, chain_id: ChainId) -> Self {
		Self {
			signer,
			chain_id,
			rejecting: AtomicBool::new(false),
			auto_mine: AtomicBool::new(true),
			reverting: AtomicBool::new(false),
			gas_price: AtomicU64::new(20_000_000_000),
			counter: AtomicU64::new(0),
			sent: Mutex::new(Vec::new()),
			signed: Mutex::new(Vec::new()),
			receipts: Mutex::new(HashMap::new()),
			call_results: Mutex::new(HashMap::new()),
			receipt_logs: Mutex::new(Vec::new()),
		}
	}

	/// A wallet with a freshly generated key.
	pub fn random(chain_id: ChainId) -> Self {
		Self::new(PrivateKeySigner::random(), chain_id)
	}

	/// Makes every signing and sending request fail as a user rejection.
	pub fn set_rejecting(&self, rejecting: bool) {
		self.rejecting.store(rejecting, Ordering::SeqCst);
	}

	/// When off, sent transactions stay pending until [`SimulatedWallet::mine`].
	pub fn set_auto_mine(&self, auto_mine: bool) {
		self.auto_mine.store(auto_mine, Ordering::SeqCst);
	}

	/// Receipts produced from now on report a reverted transaction.
	pub fn set_reverting(&self, reverting: bool) {
		self.reverting.store(reverting, Ordering::SeqCst);
	}

	pub fn set_gas_price(&self, wei: u64) {
		self.gas_price.store(wei, Ordering::SeqCst);
	}

	/// Logs attached to every receipt produced from now on.
	pub fn set_receipt_logs(&self, logs: Vec<ReceiptLog>) {
		*lock(&self.receipt_logs) = logs;
	}

	/// Programs the `eth_call` result for calls to `to` with `selector`.
	pub fn set_call_result(&self, to: Address, selector: [u8; 4], result: impl Into<Bytes>) {
		lock(&self.call_results).insert((to, selector), result.into());
	}

	/// Records a receipt for `hash`.
	pub fn mine(&self, hash: TxHash) -> Receipt {
		let receipt = Receipt {
			transaction_hash: hash,
			block_number: Some(self.counter.load(Ordering::SeqCst)),
			success: !self.reverting.load(Ordering::SeqCst),
			logs: lock(&self.receipt_logs).clone(),
		};
		lock(&self.receipts).insert(hash, receipt.clone());
		receipt
	}

	pub fn sent_transactions(&self) -> Vec<WalletTransaction> {
		lock(&self.sent).clone()
	}

	pub fn signed_payloads(&self) -> Vec<TypedDataEnvelope> {
		lock(&self.signed).clone()
	}

	fn check_rejecting(&self) -> Result<(), WalletError> {
		if self.rejecting.load(Ordering::SeqCst) {
			return Err(WalletError::UserRejected(
				"User rejected the request.".to_string(),
			));
		}
		Ok(())
	}
}

/// Configuration schema for SimulatedWallet.
pub struct SimulatedWalletSchema;

impl ConfigSchema for SimulatedWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new(
				"chain_id",
				FieldType::Integer {
					min: Some(1),
					max: None,
				},
			)],
			vec![Field::new("private_key", FieldType::String).with_validator(validate_private_key)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl WalletInterface for SimulatedWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SimulatedWalletSchema)
	}

	async fn address(&self) -> Result<Address, WalletError> {
		Ok(self.signer.address())
	}

	async fn chain_id(&self) -> Result<ChainId, WalletError> {
		Ok(self.chain_id)
	}

	async fn sign_typed_data(&self, payload: &TypedDataEnvelope) -> Result<Bytes, WalletError> {
		self.check_rejecting()?;
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
		lock(&self.signed).push(payload.clone());
		Ok(Bytes::from(signature.as_bytes().to_vec()))
	}

	async fn send_transaction(&self, tx: WalletTransaction) -> Result<TxHash, WalletError> {
		self.check_rejecting()?;

		let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
		let mut preimage = tx.to.to_vec();
		preimage.extend_from_slice(&tx.data);
		preimage.extend_from_slice(&tx.value.to_be_bytes::<32>());
		preimage.extend_from_slice(&n.to_be_bytes());
		let hash = keccak256(preimage);

		info!(tx_hash = %truncate_hash(&hash), to = %tx.to, "Simulated transaction");
		lock(&self.sent).push(tx);
		if self.auto_mine.load(Ordering::SeqCst) {
			self.mine(hash);
		}
		Ok(hash)
	}

	async fn call(&self, tx: WalletTransaction) -> Result<Bytes, WalletError> {
		let selector: [u8; 4] = tx
			.data
			.get(..4)
			.and_then(|s| s.try_into().ok())
			.ok_or_else(|| WalletError::Provider("eth_call without selector".to_string()))?;

		lock(&self.call_results)
			.get(&(tx.to, selector))
			.cloned()
			.ok_or_else(|| {
				WalletError::Provider(format!(
					"execution reverted: no result for 0x{} on {}",
					hex::encode(selector),
					tx.to
				))
			})
	}

	async fn gas_price(&self) -> Result<u128, WalletError> {
		Ok(self.gas_price.load(Ordering::SeqCst) as u128)
	}

	async fn get_transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, WalletError> {
		Ok(lock(&self.receipts).get(&hash).cloned())
	}
}

/// Factory function to create a simulated wallet from configuration.
///
/// `private_key` is optional; a random key is generated when absent.
pub fn create_simulated_wallet(
	config: &toml::Value,
) -> Result<Arc<dyn WalletInterface>, WalletError> {
	SimulatedWalletSchema
		.validate(config)
		.map_err(|e| WalletError::Configuration(e.to_string()))?;

	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.unwrap_or_default() as ChainId;

	let signer = match config.get("private_key").and_then(|v| v.as_str()) {
		Some(key) => key
			.parse::<PrivateKeySigner>()
			.map_err(|e| WalletError::InvalidKey(e.to_string()))?,
		None => PrivateKeySigner::random(),
	};

	Ok(Arc::new(SimulatedWallet::new(signer, chain_id)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use swap_types::U256;

	#[tokio::test]
	async fn test_send_records_and_mines() {
		let wallet = SimulatedWallet::random(1);
		let tx = WalletTransaction::call(Address::repeat_byte(1), vec![0xd0, 0xe3, 0x0d, 0xb0])
			.with_value(U256::from(1u64));

		let hash = wallet.send_transaction(tx.clone()).await.unwrap();
		assert_eq!(wallet.sent_transactions(), vec![tx.clone()]);
		let receipt = wallet.get_transaction_receipt(hash).await.unwrap().unwrap();
		assert!(receipt.success);

		// identical transactions still get distinct hashes
		let second = wallet.send_transaction(tx).await.unwrap();
		assert_ne!(hash, second);
	}

	#[tokio::test]
	async fn test_pending_until_mined() {
		let wallet = SimulatedWallet::random(1);
		wallet.set_auto_mine(false);
		let hash = wallet
			.send_transaction(WalletTransaction::call(Address::repeat_byte(1), Bytes::new()))
			.await
			.unwrap();
		assert!(wallet.get_transaction_receipt(hash).await.unwrap().is_none());
		wallet.mine(hash);
		assert!(wallet.get_transaction_receipt(hash).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_rejecting() {
		let wallet = SimulatedWallet::random(1);
		wallet.set_rejecting(true);
		let err = wallet
			.send_transaction(WalletTransaction::call(Address::ZERO, Bytes::new()))
			.await
			.unwrap_err();
		assert!(err.is_user_rejection());
		assert!(wallet.sent_transactions().is_empty());
	}

	#[tokio::test]
	async fn test_programmed_calls() {
		let wallet = SimulatedWallet::random(1);
		let target = Address::repeat_byte(9);
		wallet.set_call_result(target, [1, 2, 3, 4], vec![0xff]);

		let out = wallet
			.call(WalletTransaction::call(target, vec![1, 2, 3, 4, 5]))
			.await
			.unwrap();
		assert_eq!(out.to_vec(), vec![0xff]);
		assert!(wallet
			.call(WalletTransaction::call(target, vec![9, 9, 9, 9]))
			.await
			.is_err());
	}

	#[test]
	fn test_factory() {
		let config: toml::Value = toml::from_str("chain_id = 5").unwrap();
		assert!(create_simulated_wallet(&config).is_ok());
		let missing: toml::Value = toml::from_str("private_key = \"0x00\"").unwrap();
		assert!(create_simulated_wallet(&missing).is_err());
	}
}
