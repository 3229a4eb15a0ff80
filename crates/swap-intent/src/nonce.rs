//! Nonce allocation for intents.
//!
//! A nonce must be unique per maker among intents that are not yet resolved.
//! Production reads the settlement contract and keeps local reservations for
//! nonces handed out but not yet consumed on-chain; tests use a monotonic
//! timestamp.

use crate::contract::SettlementContract;
use crate::IntentError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use swap_types::{Address, Clock, U256};
use swap_wallet::WalletInterface;
use tracing::debug;

/// Upper bound on consecutive used nonces checked before giving up.
const MAX_NONCE_CHECKS: usize = 64;

#[async_trait]
pub trait NonceSource: Send + Sync {
	/// Reserves a nonce for `maker` against the contract at `contract`.
	async fn next_nonce(
		&self,
		wallet: &dyn WalletInterface,
		contract: Address,
		maker: Address,
	) -> Result<U256, IntentError>;

	/// Returns a nonce whose intent was never submitted.
	fn release(&self, maker: Address, nonce: U256);
}

/// Nonces from `getMinNonce`/`isNonceUsed` plus local reservations.
#[derive(Default)]
pub struct ContractNonceSource {
	reserved: DashMap<Address, BTreeSet<U256>>,
}

impl ContractNonceSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reserved(&self, maker: &Address) -> Vec<U256> {
		self.reserved
			.get(maker)
			.map(|set| set.iter().copied().collect())
			.unwrap_or_default()
	}
}

#[async_trait]
impl NonceSource for ContractNonceSource {
	async fn next_nonce(
		&self,
		wallet: &dyn WalletInterface,
		contract: Address,
		maker: Address,
	) -> Result<U256, IntentError> {
		let contract = SettlementContract::new(contract);
		let min = contract.min_nonce(wallet, maker).await?;

		let mut candidate = {
			let mut reserved = self.reserved.entry(maker).or_default();
			// anything below the on-chain minimum is consumed or invalidated
			reserved.retain(|n| *n >= min);
			reserved
				.iter()
				.next_back()
				.map(|n| n.saturating_add(U256::from(1u64)))
				.unwrap_or(min)
				.max(min)
		};

		for _ in 0..MAX_NONCE_CHECKS {
			if !contract.is_nonce_used(wallet, maker, candidate).await? {
				let mut reserved = self.reserved.entry(maker).or_default();
				if reserved.insert(candidate) {
					debug!(maker = %maker, nonce = %candidate, "Reserved nonce");
					return Ok(candidate);
				}
			}
			candidate = candidate.saturating_add(U256::from(1u64));
		}

		Err(IntentError::Nonce(format!(
			"No free nonce for {} within {} checks",
			maker, MAX_NONCE_CHECKS
		)))
	}

	fn release(&self, maker: Address, nonce: U256) {
		if let Some(mut reserved) = self.reserved.get_mut(&maker) {
			reserved.remove(&nonce);
		}
	}
}

/// Millisecond timestamps, strictly increasing.
pub struct TimestampNonceSource {
	clock: Arc<dyn Clock>,
	last: AtomicU64,
}

impl TimestampNonceSource {
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self {
			clock,
			last: AtomicU64::new(0),
		}
	}
}

#[async_trait]
impl NonceSource for TimestampNonceSource {
	async fn next_nonce(
		&self,
		_wallet: &dyn WalletInterface,
		_contract: Address,
		_maker: Address,
	) -> Result<U256, IntentError> {
		let now = self.clock.now().timestamp_millis().max(0) as u64;
		let previous = self
			.last
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
				Some(now.max(last + 1))
			})
			.unwrap_or_default();
		Ok(U256::from(now.max(previous + 1)))
	}

	fn release(&self, _maker: Address, _nonce: U256) {}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contract::IFastSettlement;
	use alloy::sol_types::{SolCall, SolValue};
	use chrono::{TimeZone, Utc};
	use swap_types::ManualClock;
	use swap_wallet::implementations::simulated::SimulatedWallet;

	fn contract() -> Address {
		Address::repeat_byte(0x11)
	}

	fn wallet(min_nonce: u64, used: bool) -> SimulatedWallet {
		let wallet = SimulatedWallet::random(1);
		wallet.set_call_result(
			contract(),
			IFastSettlement::getMinNonceCall::SELECTOR,
			U256::from(min_nonce).abi_encode(),
		);
		wallet.set_call_result(
			contract(),
			IFastSettlement::isNonceUsedCall::SELECTOR,
			used.abi_encode(),
		);
		wallet
	}

	#[tokio::test]
	async fn test_contract_nonces_are_unique_until_released() {
		let wallet = wallet(7, false);
		let maker = Address::repeat_byte(1);
		let source = ContractNonceSource::new();

		let first = source.next_nonce(&wallet, contract(), maker).await.unwrap();
		let second = source.next_nonce(&wallet, contract(), maker).await.unwrap();
		assert_eq!(first, U256::from(7u64));
		assert_eq!(second, U256::from(8u64));

		source.release(maker, second);
		assert_eq!(
			source.next_nonce(&wallet, contract(), maker).await.unwrap(),
			U256::from(8u64)
		);

		// other makers are independent
		let other = source
			.next_nonce(&wallet, contract(), Address::repeat_byte(2))
			.await
			.unwrap();
		assert_eq!(other, U256::from(7u64));
	}

	#[tokio::test]
	async fn test_reservations_below_min_are_pruned() {
		let maker = Address::repeat_byte(1);
		let source = ContractNonceSource::new();
		source
			.next_nonce(&wallet(7, false), contract(), maker)
			.await
			.unwrap();

		let advanced = wallet(20, false);
		assert_eq!(
			source.next_nonce(&advanced, contract(), maker).await.unwrap(),
			U256::from(20u64)
		);
		assert_eq!(source.reserved(&maker), vec![U256::from(20u64)]);
	}

	#[tokio::test]
	async fn test_gives_up_when_everything_is_used() {
		let source = ContractNonceSource::new();
		let err = source
			.next_nonce(&wallet(0, true), contract(), Address::repeat_byte(1))
			.await
			.unwrap_err();
		assert!(matches!(err, IntentError::Nonce(_)));
	}

	#[tokio::test]
	async fn test_timestamp_nonces_strictly_increase() {
		let clock = Arc::new(ManualClock::new(
			Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
		));
		let source = TimestampNonceSource::new(clock.clone());
		let wallet = SimulatedWallet::random(1);
		let a = source.next_nonce(&wallet, contract(), Address::ZERO).await.unwrap();
		let b = source.next_nonce(&wallet, contract(), Address::ZERO).await.unwrap();
		assert!(b > a);

		clock.advance(chrono::Duration::seconds(1));
		let c = source.next_nonce(&wallet, contract(), Address::ZERO).await.unwrap();
		assert_eq!(c, a + U256::from(1000u64));
	}
}
