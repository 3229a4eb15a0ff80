//! Intent construction for the permit settlement path.
//!
//! [`IntentBuilder`] turns a confirmed quote into an [`Intent`] and the
//! EIP-712 payload a wallet signs. Deadline, minimum output and nonce are all
//! fixed at build time.

use alloy::sol_types::{Eip712Domain, SolStruct};
use rand::RngCore;
use rust_decimal::Decimal;
use serde_json::json;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use swap_types::{
	apply_slippage_bps, percent_to_bps, Address, ChainId, Clock, Intent, Token,
	TypedDataEnvelope, B256, U256,
};
use swap_wallet::{WalletError, WalletInterface};
use thiserror::Error;
use tracing::info;

pub mod contract;
pub mod nonce;

pub use contract::{
	intent_settled_signature, parse_contract_error, SettlementContract, CONTRACT_ERRORS,
};
pub use nonce::{ContractNonceSource, NonceSource, TimestampNonceSource};

#[derive(Debug, Error)]
pub enum IntentError {
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("Slippage must be between 0% and {max}%, got {value}%")]
	InvalidSlippage { value: Decimal, max: Decimal },
	#[error("No settlement contract deployed on chain {0}")]
	UnsupportedChain(ChainId),
	#[error("Only the maker {maker} can do this, connected account is {caller}")]
	NotMaker { caller: Address, maker: Address },
	#[error("Nonce error: {0}")]
	Nonce(String),
	#[error("Contract error: {0}")]
	Contract(String),
	#[error("Transaction reverted: {0}")]
	Reverted(String),
	#[error(transparent)]
	Wallet(#[from] WalletError),
}

/// Domain, bounds and deployments used when building intents.
#[derive(Debug, Clone)]
pub struct IntentSettings {
	pub domain_name: String,
	pub domain_version: String,
	pub min_deadline_minutes: u32,
	pub max_deadline_minutes: u32,
	pub default_deadline_minutes: u32,
	pub max_slippage_percent: Decimal,
	pub deployments: HashMap<ChainId, Address>,
}

impl Default for IntentSettings {
	fn default() -> Self {
		Self {
			domain_name: "FastSettlement".to_string(),
			domain_version: "2.1".to_string(),
			min_deadline_minutes: 1,
			max_deadline_minutes: 1440,
			default_deadline_minutes: 30,
			max_slippage_percent: Decimal::from(50),
			deployments: HashMap::new(),
		}
	}
}

impl IntentSettings {
	/// Settlement contract for `chain_id`; zero addresses count as absent.
	pub fn deployment(&self, chain_id: ChainId) -> Option<Address> {
		self.deployments
			.get(&chain_id)
			.copied()
			.filter(|address| !address.is_zero())
	}
}

/// What the user confirmed.
#[derive(Debug, Clone)]
pub struct IntentParams {
	pub token_in: Token,
	pub token_out: Token,
	pub amount_in: U256,
	/// Quoted output before slippage.
	pub amount_out: U256,
	pub slippage_percent: Decimal,
	pub deadline_minutes: Option<u32>,
	/// Defaults to the maker.
	pub recipient: Option<Address>,
}

#[derive(Debug, Clone)]
pub struct BuiltIntent {
	pub intent: Intent,
	pub typed_data: TypedDataEnvelope,
	pub contract: Address,
}

pub struct IntentBuilder {
	settings: IntentSettings,
	nonces: Arc<dyn NonceSource>,
	clock: Arc<dyn Clock>,
}

impl IntentBuilder {
	pub fn new(settings: IntentSettings, nonces: Arc<dyn NonceSource>, clock: Arc<dyn Clock>) -> Self {
		Self {
			settings,
			nonces,
			clock,
		}
	}

	pub fn settings(&self) -> &IntentSettings {
		&self.settings
	}

	/// Returns a reserved nonce after a failed submission.
	pub fn release_nonce(&self, intent: &Intent) {
		self.nonces.release(intent.maker, intent.nonce);
	}

	fn validate(&self, params: &IntentParams) -> Result<(), IntentError> {
		let max = self.settings.max_slippage_percent;
		if params.slippage_percent < Decimal::ZERO || params.slippage_percent > max {
			return Err(IntentError::InvalidSlippage {
				value: params.slippage_percent,
				max,
			});
		}
		if params.amount_in.is_zero() {
			return Err(IntentError::InvalidInput("amountIn must be positive".to_string()));
		}
		if params.amount_out.is_zero() {
			return Err(IntentError::InvalidInput("quoted amountOut is zero".to_string()));
		}
		if params.token_in.address == params.token_out.address {
			return Err(IntentError::InvalidInput("tokenIn equals tokenOut".to_string()));
		}
		if params.token_in.is_native_sentinel() {
			return Err(IntentError::InvalidInput(
				"native input cannot be settled by intent".to_string(),
			));
		}
		Ok(())
	}

	/// `now + clamp(minutes) * 60`, evaluated at call time.
	pub fn deadline(&self, minutes: Option<u32>) -> u64 {
		let minutes = minutes
			.unwrap_or(self.settings.default_deadline_minutes)
			.clamp(
				self.settings.min_deadline_minutes,
				self.settings.max_deadline_minutes,
			);
		self.clock.now_secs() + u64::from(minutes) * 60
	}

	/// Builds and hashes an intent for the wallet's account and chain. Nothing
	/// is signed here.
	pub async fn build(
		&self,
		wallet: &dyn WalletInterface,
		params: &IntentParams,
	) -> Result<BuiltIntent, IntentError> {
		self.validate(params)?;

		let chain_id = wallet.chain_id().await?;
		let contract = self
			.settings
			.deployment(chain_id)
			.ok_or(IntentError::UnsupportedChain(chain_id))?;
		let maker = wallet.address().await?;

		let bps = percent_to_bps(params.slippage_percent)
			.map_err(|e| IntentError::InvalidInput(e.to_string()))?;
		let min_out = apply_slippage_bps(params.amount_out, bps)
			.map_err(|e| IntentError::InvalidInput(e.to_string()))?;
		let deadline = self.deadline(params.deadline_minutes);
		let nonce = self.nonces.next_nonce(wallet, contract, maker).await?;

		let mut ref_id = [0u8; 32];
		rand::rngs::OsRng.fill_bytes(&mut ref_id);

		let intent = Intent {
			maker,
			recipient: params.recipient.unwrap_or(maker),
			token_in: params.token_in.address,
			token_out: params.token_out.address,
			amount_in: params.amount_in,
			min_out,
			deadline,
			nonce,
			ref_id: B256::from(ref_id),
		};
		let typed_data = self.typed_data(&intent, chain_id, contract);

		info!(
			maker = %maker,
			nonce = %nonce,
			deadline = deadline,
			min_out = %min_out,
			"Built intent"
		);
		Ok(BuiltIntent {
			intent,
			typed_data,
			contract,
		})
	}

	pub fn domain(&self, chain_id: ChainId, verifying_contract: Address) -> Eip712Domain {
		Eip712Domain::new(
			Some(Cow::Owned(self.settings.domain_name.clone())),
			Some(Cow::Owned(self.settings.domain_version.clone())),
			Some(U256::from(chain_id)),
			Some(verifying_contract),
			None,
		)
	}

	/// The `eth_signTypedData_v4` document and its signing hash.
	pub fn typed_data(
		&self,
		intent: &Intent,
		chain_id: ChainId,
		verifying_contract: Address,
	) -> TypedDataEnvelope {
		let domain = self.domain(chain_id, verifying_contract);
		let signing_hash = contract::Intent::from(intent).eip712_signing_hash(&domain);

		let typed_data = json!({
			"types": {
				"EIP712Domain": [
					{ "name": "name", "type": "string" },
					{ "name": "version", "type": "string" },
					{ "name": "chainId", "type": "uint256" },
					{ "name": "verifyingContract", "type": "address" }
				],
				"Intent": [
					{ "name": "maker", "type": "address" },
					{ "name": "recipient", "type": "address" },
					{ "name": "tokenIn", "type": "address" },
					{ "name": "tokenOut", "type": "address" },
					{ "name": "amountIn", "type": "uint256" },
					{ "name": "minOut", "type": "uint256" },
					{ "name": "deadline", "type": "uint256" },
					{ "name": "nonce", "type": "uint256" },
					{ "name": "refId", "type": "bytes32" }
				]
			},
			"primaryType": "Intent",
			"domain": {
				"name": self.settings.domain_name,
				"version": self.settings.domain_version,
				"chainId": chain_id,
				"verifyingContract": verifying_contract.to_string()
			},
			"message": {
				"maker": intent.maker.to_string(),
				"recipient": intent.recipient.to_string(),
				"tokenIn": intent.token_in.to_string(),
				"tokenOut": intent.token_out.to_string(),
				"amountIn": intent.amount_in.to_string(),
				"minOut": intent.min_out.to_string(),
				"deadline": intent.deadline.to_string(),
				"nonce": intent.nonce.to_string(),
				"refId": intent.ref_id.to_string()
			}
		});

		TypedDataEnvelope {
			chain_id,
			verifying_contract,
			signing_hash,
			typed_data,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::Signature;
	use chrono::{TimeZone, Utc};
	use std::str::FromStr;
	use swap_types::ManualClock;
	use swap_wallet::implementations::simulated::SimulatedWallet;

	const CHAIN: ChainId = 11155111;

	fn settlement() -> Address {
		Address::repeat_byte(0x11)
	}

	fn clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(
			Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
		))
	}

	fn builder(clock: Arc<ManualClock>) -> IntentBuilder {
		let mut settings = IntentSettings::default();
		settings.deployments.insert(CHAIN, settlement());
		settings.deployments.insert(1, Address::ZERO);
		IntentBuilder::new(
			settings,
			Arc::new(TimestampNonceSource::new(clock.clone())),
			clock,
		)
	}

	fn params(slippage: &str) -> IntentParams {
		IntentParams {
			token_in: Token::new(Address::repeat_byte(0x0c), "USDC", 6, "USD Coin"),
			token_out: Token::new(Address::repeat_byte(0xee), "WETH", 18, "Wrapped Ether"),
			amount_in: U256::from(100_000_000u64),
			amount_out: U256::from(1_000_000u64),
			slippage_percent: Decimal::from_str(slippage).unwrap(),
			deadline_minutes: None,
			recipient: None,
		}
	}

	#[tokio::test]
	async fn test_build_intent() {
		let clock = clock();
		let builder = builder(clock.clone());
		let wallet = SimulatedWallet::random(CHAIN);

		let built = builder.build(&wallet, &params("0.5")).await.unwrap();
		let maker = wallet.address().await.unwrap();
		assert_eq!(built.intent.maker, maker);
		assert_eq!(built.intent.recipient, maker);
		assert_eq!(built.intent.min_out, U256::from(995_000u64));
		assert_eq!(built.intent.deadline, clock.now_secs() + 30 * 60);
		assert_eq!(built.contract, settlement());
		assert_ne!(built.intent.ref_id, B256::ZERO);
		assert_eq!(built.typed_data.typed_data["primaryType"], "Intent");
		assert_eq!(built.typed_data.typed_data["message"]["minOut"], "995000");
		assert_eq!(built.typed_data.typed_data["domain"]["version"], "2.1");
	}

	#[tokio::test]
	async fn test_signature_recovers_maker() {
		let builder = builder(clock());
		let wallet = SimulatedWallet::random(CHAIN);
		let built = builder.build(&wallet, &params("1")).await.unwrap();

		let signature = wallet.sign_typed_data(&built.typed_data).await.unwrap();
		let signature = Signature::try_from(signature.as_ref()).unwrap();
		let recovered = signature
			.recover_address_from_prehash(&built.typed_data.signing_hash)
			.unwrap();
		assert_eq!(recovered, built.intent.maker);
	}

	#[tokio::test]
	async fn test_deadline_computed_at_build_time() {
		let clock = clock();
		let builder = builder(clock.clone());
		let wallet = SimulatedWallet::random(CHAIN);

		let first = builder.build(&wallet, &params("0.5")).await.unwrap();
		clock.advance(chrono::Duration::minutes(10));
		let second = builder.build(&wallet, &params("0.5")).await.unwrap();
		assert_eq!(second.intent.deadline - first.intent.deadline, 600);
		assert_ne!(first.intent.nonce, second.intent.nonce);
		assert_ne!(first.intent.ref_id, second.intent.ref_id);
	}

	#[tokio::test]
	async fn test_deadline_clamped() {
		let clock = clock();
		let builder = builder(clock.clone());
		let now = clock.now_secs();
		assert_eq!(builder.deadline(Some(0)), now + 60);
		assert_eq!(builder.deadline(Some(5000)), now + 1440 * 60);
		assert_eq!(builder.deadline(Some(20)), now + 20 * 60);
	}

	#[tokio::test]
	async fn test_slippage_rejected_before_anything_else() {
		let builder = builder(clock());
		// wrong chain too, but slippage is checked first
		let wallet = SimulatedWallet::random(5);
		let err = builder.build(&wallet, &params("150")).await.unwrap_err();
		assert!(matches!(err, IntentError::InvalidSlippage { .. }));
		assert!(builder.build(&wallet, &params("-0.1")).await.is_err());
		assert!(wallet.signed_payloads().is_empty());
	}

	#[tokio::test]
	async fn test_unsupported_chain() {
		let builder = builder(clock());
		let err = builder
			.build(&SimulatedWallet::random(5), &params("0.5"))
			.await
			.unwrap_err();
		assert!(matches!(err, IntentError::UnsupportedChain(5)));

		// zero-address deployment counts as missing
		let err = builder
			.build(&SimulatedWallet::random(1), &params("0.5"))
			.await
			.unwrap_err();
		assert!(matches!(err, IntentError::UnsupportedChain(1)));
	}

	#[tokio::test]
	async fn test_rejects_bad_amounts() {
		let builder = builder(clock());
		let wallet = SimulatedWallet::random(CHAIN);
		let mut zero = params("0.5");
		zero.amount_in = U256::ZERO;
		assert!(matches!(
			builder.build(&wallet, &zero).await,
			Err(IntentError::InvalidInput(_))
		));
		let mut native = params("0.5");
		native.token_in = Token::native("ETH", "Ether");
		assert!(matches!(
			builder.build(&wallet, &native).await,
			Err(IntentError::InvalidInput(_))
		));
	}
}
