//! Settlement contract bindings.
//!
//! ABI types for the FastSettlement contract, read helpers used by the nonce
//! source, and the maker-only write paths (cancel and refund).

use crate::IntentError;
use alloy::sol;
use alloy::sol_types::SolCall;
use swap_types::{Address, Bytes, TxHash, WalletTransaction, B256, U256};
use swap_wallet::WalletInterface;
use tracing::info;

// Solidity type definitions for the settlement contract.
sol! {
	/// Intent as hashed and verified on-chain.
	#[derive(Debug, PartialEq, Eq)]
	struct Intent {
		address maker;
		address recipient;
		address tokenIn;
		address tokenOut;
		uint256 amountIn;
		uint256 minOut;
		uint256 deadline;
		uint256 nonce;
		bytes32 refId;
	}

	interface IFastSettlement {
		event IntentSettled(
			bytes32 indexed intentId,
			address indexed maker,
			address indexed recipient,
			address tokenIn,
			address tokenOut,
			uint256 amountIn,
			uint256 amountOut,
			uint256 minOut,
			uint256 totalSurplus,
			uint256 userSurplus
		);
		event IntentFailed(bytes32 indexed intentId, address indexed maker, string reason);
		event IntentCancelled(bytes32 indexed intentId, address indexed maker);
		event RefundClaimed(address indexed maker, address indexed token, uint256 amount);

		function getIntentId(Intent intent) external view returns (bytes32);
		function isNonceUsed(address maker, uint256 nonce) external view returns (bool);
		function getMinNonce(address maker) external view returns (uint256);
		function getPendingRefund(address maker, address token) external view returns (uint256);
		function cancelIntent(Intent intent) external;
		function cancelIntents(Intent[] intents) external;
		function claimRefund(address token) external;
	}
}

impl From<&swap_types::Intent> for Intent {
	fn from(intent: &swap_types::Intent) -> Self {
		Intent {
			maker: intent.maker,
			recipient: intent.recipient,
			tokenIn: intent.token_in,
			tokenOut: intent.token_out,
			amountIn: intent.amount_in,
			minOut: intent.min_out,
			deadline: U256::from(intent.deadline),
			nonce: intent.nonce,
			refId: intent.ref_id,
		}
	}
}

/// Revert names the settlement contract can produce.
pub const CONTRACT_ERRORS: &[&str] = &[
	"UnauthorizedSolver",
	"SettlementFailed",
	"InsufficientOutput",
	"RouterNotAllowed",
	"ArrayLengthMismatch",
	"EmptyBatch",
	"BatchTooLarge",
	"InvalidSurplusRecipient",
	"InvalidSurplusBps",
	"InvalidRecipient",
	"InvalidPermit2Address",
	"InvalidOwnerAddress",
	"InvalidSolverAddress",
	"InvalidRouterAddress",
	"InvalidNonceIncrement",
	"NonceTooHigh",
	"NoRefundAvailable",
	"RouterCallFailed",
	"PermitTokenMismatch",
	"PermitAmountInsufficient",
	"IntentAlreadyCancelled",
	"NotIntentMaker",
	"DeadlineTooFar",
	"ZeroTokenAddress",
	"ZeroAmount",
	"SameTokenSwap",
];

/// Finds a known revert name inside a provider error message.
pub fn parse_contract_error(message: &str) -> Option<&'static str> {
	CONTRACT_ERRORS
		.iter()
		.copied()
		.find(|name| message.contains(name))
}

/// `topic0` of `IntentSettled`.
pub fn intent_settled_signature() -> B256 {
	use alloy::sol_types::SolEvent;
	IFastSettlement::IntentSettled::SIGNATURE_HASH
}

/// A deployed settlement contract, accessed through the caller's wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementContract {
	address: Address,
}

impl SettlementContract {
	pub fn new(address: Address) -> Self {
		Self { address }
	}

	pub fn address(&self) -> Address {
		self.address
	}

	async fn read<C: SolCall>(
		&self,
		wallet: &dyn WalletInterface,
		call: C,
	) -> Result<C::Return, IntentError> {
		let output = wallet
			.call(WalletTransaction::call(self.address, call.abi_encode()))
			.await?;
		C::abi_decode_returns(&output).map_err(|e| IntentError::Contract(e.to_string()))
	}

	pub async fn min_nonce(
		&self,
		wallet: &dyn WalletInterface,
		maker: Address,
	) -> Result<U256, IntentError> {
		self.read(wallet, IFastSettlement::getMinNonceCall { maker }).await
	}

	pub async fn is_nonce_used(
		&self,
		wallet: &dyn WalletInterface,
		maker: Address,
		nonce: U256,
	) -> Result<bool, IntentError> {
		self.read(wallet, IFastSettlement::isNonceUsedCall { maker, nonce })
			.await
	}

	pub async fn pending_refund(
		&self,
		wallet: &dyn WalletInterface,
		maker: Address,
		token: Address,
	) -> Result<U256, IntentError> {
		self.read(wallet, IFastSettlement::getPendingRefundCall { maker, token })
			.await
	}

	pub async fn intent_id(
		&self,
		wallet: &dyn WalletInterface,
		intent: &swap_types::Intent,
	) -> Result<B256, IntentError> {
		self.read(
			wallet,
			IFastSettlement::getIntentIdCall {
				intent: intent.into(),
			},
		)
		.await
	}

	pub fn cancel_intent_tx(&self, intent: &swap_types::Intent) -> WalletTransaction {
		let data = IFastSettlement::cancelIntentCall {
			intent: intent.into(),
		}
		.abi_encode();
		WalletTransaction::call(self.address, Bytes::from(data))
	}

	pub fn claim_refund_tx(&self, token: Address) -> WalletTransaction {
		let data = IFastSettlement::claimRefundCall { token }.abi_encode();
		WalletTransaction::call(self.address, Bytes::from(data))
	}

	async fn ensure_maker(
		&self,
		wallet: &dyn WalletInterface,
		maker: Address,
	) -> Result<(), IntentError> {
		let caller = wallet.address().await?;
		if caller != maker {
			return Err(IntentError::NotMaker { caller, maker });
		}
		Ok(())
	}

	fn map_revert(err: swap_wallet::WalletError) -> IntentError {
		match &err {
			swap_wallet::WalletError::Provider(message) => match parse_contract_error(message) {
				Some(name) => IntentError::Reverted(name.to_string()),
				None => err.into(),
			},
			_ => err.into(),
		}
	}

	/// Cancels an unsettled intent. Only its maker may do this.
	pub async fn cancel_intent(
		&self,
		wallet: &dyn WalletInterface,
		intent: &swap_types::Intent,
	) -> Result<TxHash, IntentError> {
		self.ensure_maker(wallet, intent.maker).await?;
		let hash = wallet
			.send_transaction(self.cancel_intent_tx(intent))
			.await
			.map_err(Self::map_revert)?;
		info!(tx_hash = %swap_types::truncate_hash(&hash), nonce = %intent.nonce, "Intent cancellation sent");
		Ok(hash)
	}

	/// Claims any refund held for the connected account in `token`.
	pub async fn claim_refund(
		&self,
		wallet: &dyn WalletInterface,
		token: Address,
	) -> Result<TxHash, IntentError> {
		let hash = wallet
			.send_transaction(self.claim_refund_tx(token))
			.await
			.map_err(Self::map_revert)?;
		info!(tx_hash = %swap_types::truncate_hash(&hash), token = %token, "Refund claim sent");
		Ok(hash)
	}
}
