//! The settlement state machine.
//!
//! One [`SettlementAttempt`] per confirm. The attempt is published on a watch
//! channel; its terminal outcome is also parked for [`SettlementRouter::take_notification`]
//! so UI side effects fire once per attempt.

use crate::{weth, BackendError, EthSwapRequest, ExecutionBackend, FallbackStrategy, IntentSubmission, SettlementError};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use swap_intent::{parse_contract_error, IntentBuilder, IntentError, IntentParams};
use swap_quote::RouteClassifier;
use swap_types::{
	apply_slippage_bps, percent_to_bps, truncate_hash, AttemptError, Clock, Confirmation,
	FailureKind, Quote, SettlementAttempt, SettlementHash, SettlementPath, SettlementStatus,
	Token, WalletTransaction, U256,
};
use swap_wallet::{friendly_error_message, WalletError, WalletInterface, WalletResolver};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything the user confirmed on the swap screen.
#[derive(Debug, Clone)]
pub struct SwapRequest {
	pub token_in: Option<Token>,
	pub token_out: Option<Token>,
	/// Human-readable amount of `token_in`.
	pub amount: String,
	/// The displayed quote; required for priced swaps.
	pub quote: Option<Quote>,
	pub slippage_percent: Decimal,
	pub deadline_minutes: Option<u32>,
}

struct Plan {
	path: SettlementPath,
	token_in: Token,
	token_out: Token,
	amount: U256,
	amount_out: U256,
	wallet: Arc<dyn WalletInterface>,
}

struct Failure {
	kind: FailureKind,
	message: String,
}

impl Failure {
	fn failed(message: impl Into<String>) -> Self {
		Self {
			kind: FailureKind::SettlementFailed,
			message: message.into(),
		}
	}

	fn from_wallet(err: WalletError, operation: &str) -> Self {
		match &err {
			WalletError::UserRejected(raw) => Self {
				kind: FailureKind::UserRejected,
				message: friendly_error_message(raw, operation),
			},
			other => {
				let raw = other.to_string();
				match parse_contract_error(&raw) {
					Some(name) => Self::failed(name),
					None => Self::failed(friendly_error_message(&raw, operation)),
				}
			}
		}
	}

	fn from_intent(err: IntentError) -> Self {
		match err {
			IntentError::Wallet(e) => Self::from_wallet(e, "swap"),
			other => Self::failed(other.to_string()),
		}
	}

	fn into_error(self) -> SettlementError {
		match self.kind {
			FailureKind::UserRejected => SettlementError::UserRejected(self.message),
			FailureKind::BackendUnavailable => SettlementError::BackendUnavailable(self.message),
			FailureKind::SettlementFailed => SettlementError::SettlementFailed(self.message),
		}
	}
}

type Outcome = Result<(SettlementHash, Option<String>), Failure>;

/// Message for a settlement whose transaction was mined but reverted.
pub fn reverted_message(confirmation: &Confirmation) -> String {
	format!(
		"Transaction {} reverted on chain",
		truncate_hash(&confirmation.receipt.transaction_hash)
	)
}

fn operation(path: SettlementPath) -> &'static str {
	match path {
		SettlementPath::Wrap => "wrap",
		SettlementPath::Unwrap => "unwrap",
		SettlementPath::DirectEth | SettlementPath::Permit => "swap",
	}
}

pub struct SettlementRouter {
	wallets: Arc<WalletResolver>,
	classifier: RouteClassifier,
	intents: Arc<IntentBuilder>,
	backend: Arc<dyn ExecutionBackend>,
	fallback: FallbackStrategy,
	clock: Arc<dyn Clock>,
	/// Serialises signing and sending on the shared wallet.
	wallet_lock: tokio::sync::Mutex<()>,
	attempt: watch::Sender<SettlementAttempt>,
	notification: Mutex<Option<SettlementAttempt>>,
}

impl SettlementRouter {
	pub fn new(
		wallets: Arc<WalletResolver>,
		classifier: RouteClassifier,
		intents: Arc<IntentBuilder>,
		backend: Arc<dyn ExecutionBackend>,
		fallback: FallbackStrategy,
		clock: Arc<dyn Clock>,
	) -> Self {
		let (attempt, _) = watch::channel(SettlementAttempt::idle());
		Self {
			wallets,
			classifier,
			intents,
			backend,
			fallback,
			clock,
			wallet_lock: tokio::sync::Mutex::new(()),
			attempt,
			notification: Mutex::new(None),
		}
	}

	pub fn current(&self) -> SettlementAttempt {
		self.attempt.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<SettlementAttempt> {
		self.attempt.subscribe()
	}

	fn notification_slot(&self) -> std::sync::MutexGuard<'_, Option<SettlementAttempt>> {
		self.notification.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// The terminal outcome of the latest attempt, yielded once.
	pub fn take_notification(&self) -> Option<SettlementAttempt> {
		self.notification_slot().take()
	}

	/// Returns to `Idle`. Ignored while an attempt is in progress.
	pub fn reset(&self) -> bool {
		let reset = self.attempt.send_if_modified(|current| {
			if current.status.is_active() {
				return false;
			}
			*current = SettlementAttempt::idle();
			true
		});
		if reset {
			self.notification_slot().take();
		}
		reset
	}

	/// Records the resolved receipt on the attempt it belongs to. A reverted
	/// receipt turns the attempt into a settlement failure, which is parked as
	/// its notification.
	pub fn apply_confirmation(&self, attempt_id: Uuid, confirmation: Confirmation) -> bool {
		let mut reverted = None;
		let applied = self.attempt.send_if_modified(|current| {
			if current.id != attempt_id {
				return false;
			}
			let success = confirmation.receipt.success;
			if !success {
				current.status = SettlementStatus::Error;
				current.error = Some(AttemptError {
					kind: FailureKind::SettlementFailed,
					message: reverted_message(&confirmation),
				});
			}
			current.confirmation = Some(confirmation);
			if !success {
				reverted = Some(current.clone());
			}
			true
		});
		if let Some(failed) = reverted {
			warn!(attempt_id = %attempt_id, "Settlement reverted on chain");
			*self.notification_slot() = Some(failed);
		}
		applied
	}

	fn update(&self, attempt_id: Uuid, f: impl FnOnce(&mut SettlementAttempt)) {
		self.attempt.send_if_modified(|current| {
			if current.id != attempt_id {
				return false;
			}
			f(current);
			true
		});
	}

	async fn plan(&self, request: &SwapRequest) -> Result<Plan, SettlementError> {
		let (Some(token_in), Some(token_out)) = (&request.token_in, &request.token_out) else {
			return Err(SettlementError::InvalidInput("Select both tokens".to_string()));
		};
		if token_in.address == token_out.address && token_in.symbol == token_out.symbol {
			return Err(SettlementError::InvalidInput(
				"Select two different tokens".to_string(),
			));
		}
		let amount = token_in
			.parse_positive_amount(&request.amount)
			.map_err(|e| SettlementError::InvalidInput(e.to_string()))?;
		let wallet = self.wallets.wallet().await.map_err(|e| match e {
			WalletError::NotConnected => SettlementError::InvalidInput("Wallet not connected".to_string()),
			other => SettlementError::InvalidInput(other.to_string()),
		})?;

		let path = self.classifier.settlement_path(token_in, token_out);
		let amount_out = match path {
			SettlementPath::Wrap | SettlementPath::Unwrap => amount,
			SettlementPath::DirectEth | SettlementPath::Permit => {
				let max = self.intents.settings().max_slippage_percent;
				if request.slippage_percent < Decimal::ZERO || request.slippage_percent > max {
					return Err(SettlementError::InvalidInput(format!(
						"Slippage must be between 0% and {}%, got {}%",
						max, request.slippage_percent
					)));
				}
				let quote = request
					.quote
					.as_ref()
					.filter(|q| !q.amount_out.is_zero())
					.ok_or_else(|| SettlementError::InvalidInput("No quote available".to_string()))?;
				quote.amount_out
			}
		};

		Ok(Plan {
			path,
			token_in: token_in.clone(),
			token_out: token_out.clone(),
			amount,
			amount_out,
			wallet,
		})
	}

	/// Runs one settlement attempt to a terminal state.
	///
	/// Input problems are reported without touching the current attempt.
	/// Failures after the attempt started leave it in `Error` and are returned
	/// as the matching [`SettlementError`].
	pub async fn confirm(&self, request: SwapRequest) -> Result<SettlementAttempt, SettlementError> {
		if self.attempt.borrow().status.is_active() {
			return Err(SettlementError::AttemptInProgress);
		}
		let plan = self.plan(&request).await?;

		let mut attempt = SettlementAttempt::started(plan.path, self.clock.now());
		attempt.status = match plan.path {
			SettlementPath::Permit => SettlementStatus::Signing,
			_ => SettlementStatus::Submitting,
		};
		let attempt_id = attempt.id;
		let claimed = self.attempt.send_if_modified(|current| {
			if current.status.is_active() {
				return false;
			}
			*current = attempt;
			true
		});
		if !claimed {
			return Err(SettlementError::AttemptInProgress);
		}
		self.notification_slot().take();
		info!(attempt_id = %attempt_id, path = %plan.path, amount = %plan.amount, "Settlement started");

		let outcome = {
			let _wallet = self.wallet_lock.lock().await;
			match plan.path {
				SettlementPath::Wrap => {
					let tx = weth::deposit_tx(self.classifier.wrapped_native().address, plan.amount);
					self.send(&plan, tx).await
				}
				SettlementPath::Unwrap => {
					let tx = weth::withdraw_tx(self.classifier.wrapped_native().address, plan.amount);
					self.send(&plan, tx).await
				}
				SettlementPath::DirectEth => self.direct_eth(&plan, &request).await,
				SettlementPath::Permit => self.permit(attempt_id, &plan, &request).await,
			}
		};

		self.finish(attempt_id, outcome)
	}

	async fn send(&self, plan: &Plan, tx: WalletTransaction) -> Outcome {
		let hash = plan
			.wallet
			.send_transaction(tx)
			.await
			.map_err(|e| Failure::from_wallet(e, operation(plan.path)))?;
		Ok((SettlementHash::OnChain(hash), None))
	}

	async fn fall_back(&self, reason: String) -> Outcome {
		match self.fallback.run(&reason).await {
			Some((hash, notice)) => Ok((hash, Some(notice))),
			None => Err(Failure {
				kind: FailureKind::BackendUnavailable,
				message: reason,
			}),
		}
	}

	fn min_out(&self, plan: &Plan, request: &SwapRequest) -> Result<U256, Failure> {
		let bps = percent_to_bps(request.slippage_percent).map_err(|e| Failure::failed(e.to_string()))?;
		apply_slippage_bps(plan.amount_out, bps).map_err(|e| Failure::failed(e.to_string()))
	}

	async fn direct_eth(&self, plan: &Plan, request: &SwapRequest) -> Outcome {
		let sender = plan
			.wallet
			.address()
			.await
			.map_err(|e| Failure::from_wallet(e, "swap"))?;
		let body = EthSwapRequest {
			output_token: plan.token_out.address,
			input_amt: plan.amount.to_string(),
			user_amt_out: self.min_out(plan, request)?.to_string(),
			sender,
			deadline: self.intents.deadline(request.deadline_minutes).to_string(),
		};

		let response = match self.backend.request_eth_swap(&body).await {
			Ok(response) => response,
			Err(BackendError::Unavailable(reason)) => return self.fall_back(reason).await,
			Err(e) => return Err(Failure::failed(e.to_string())),
		};

		let to = response
			.to
			.ok_or_else(|| Failure::failed("Backend returned no transaction target"))?;
		let value = match response.value.as_deref() {
			Some(v) => v
				.parse::<U256>()
				.map_err(|e| Failure::failed(format!("Invalid transaction value: {}", e)))?,
			None => plan.amount,
		};
		let mut tx = WalletTransaction::call(to, response.data).with_value(value);
		if let Some(gas_limit) = response.gas_limit {
			tx = tx.with_gas_limit(gas_limit);
		}
		if let Some(chain_id) = response.chain_id {
			tx = tx.with_chain_id(chain_id);
		}
		self.send(plan, tx).await
	}

	async fn permit(&self, attempt_id: Uuid, plan: &Plan, request: &SwapRequest) -> Outcome {
		let params = IntentParams {
			token_in: plan.token_in.clone(),
			token_out: plan.token_out.clone(),
			amount_in: plan.amount,
			amount_out: plan.amount_out,
			slippage_percent: request.slippage_percent,
			deadline_minutes: request.deadline_minutes,
			recipient: None,
		};
		let built = self
			.intents
			.build(plan.wallet.as_ref(), &params)
			.await
			.map_err(Failure::from_intent)?;

		let signature = match plan.wallet.sign_typed_data(&built.typed_data).await {
			Ok(signature) => signature,
			Err(e) => {
				self.intents.release_nonce(&built.intent);
				return Err(Failure::from_wallet(e, "swap"));
			}
		};

		self.update(attempt_id, |attempt| {
			attempt.intent = Some(built.intent.clone());
			attempt.signature = Some(signature.clone());
			attempt.status = SettlementStatus::Submitting;
		});

		let intent = &built.intent;
		let submission = IntentSubmission {
			user: intent.maker,
			input_token: intent.token_in,
			output_token: intent.token_out,
			input_amt: intent.amount_in.to_string(),
			user_amt_out: intent.min_out.to_string(),
			recipient: intent.recipient,
			deadline: intent.deadline.to_string(),
			nonce: intent.nonce.to_string(),
			signature,
		};

		match self.backend.submit_intent(&submission).await {
			Ok(response) => match response.tx_hash {
				Some(hash) => Ok((SettlementHash::OnChain(hash), None)),
				None => {
					self.intents.release_nonce(intent);
					Err(Failure::failed("Backend returned no transaction hash"))
				}
			},
			Err(BackendError::Unavailable(reason)) => {
				self.intents.release_nonce(intent);
				self.fall_back(reason).await
			}
			Err(e) => {
				self.intents.release_nonce(intent);
				let message = match &e {
					BackendError::Rejected(reason) => parse_contract_error(reason)
						.map(str::to_string)
						.unwrap_or_else(|| reason.clone()),
					other => other.to_string(),
				};
				Err(Failure::failed(message))
			}
		}
	}

	fn finish(&self, attempt_id: Uuid, outcome: Outcome) -> Result<SettlementAttempt, SettlementError> {
		match &outcome {
			Ok((hash, notice)) => {
				self.update(attempt_id, |attempt| {
					attempt.status = SettlementStatus::Success;
					attempt.hash = Some(*hash);
					attempt.notice = notice.clone();
				});
				match hash {
					SettlementHash::OnChain(tx) => {
						info!(attempt_id = %attempt_id, tx_hash = %truncate_hash(tx), "Settlement submitted")
					}
					SettlementHash::Fallback(id) => {
						warn!(attempt_id = %attempt_id, fallback_id = %id, "Settlement finished through fallback")
					}
				}
			}
			Err(failure) => {
				self.update(attempt_id, |attempt| {
					attempt.status = SettlementStatus::Error;
					attempt.error = Some(AttemptError {
						kind: failure.kind,
						message: failure.message.clone(),
					});
				});
				warn!(attempt_id = %attempt_id, kind = ?failure.kind, error = %failure.message, "Settlement failed");
			}
		}

		let attempt = self.current();
		*self.notification_slot() = Some(attempt.clone());
		match outcome {
			Ok(_) => Ok(attempt),
			Err(failure) => Err(failure.into_error()),
		}
	}
}
