//! Settlement of confirmed swaps.
//!
//! The [`SettlementRouter`] runs one attempt at a time through
//! `Idle -> Signing -> Submitting -> {Success, Error}`, choosing between the
//! wrap, unwrap, direct-ETH and permit paths. Off-chain submission goes to an
//! [`ExecutionBackend`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swap_types::{Address, Bytes, ConfigSchema, TxHash};
use thiserror::Error;

pub mod implementations {
	pub mod http;
}

pub mod fallback;
pub mod router;
pub mod weth;

pub use fallback::FallbackStrategy;
pub use router::{reverted_message, SettlementRouter, SwapRequest};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
	/// Rejected before any state change.
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("A settlement attempt is already in progress")]
	AttemptInProgress,
	#[error("{0}")]
	UserRejected(String),
	#[error("Execution backend unavailable: {0}")]
	BackendUnavailable(String),
	#[error("Settlement failed: {0}")]
	SettlementFailed(String),
}

/// Errors from an execution backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
	/// Unreachable, timed out or answered with a non-success status.
	#[error("Backend unavailable: {0}")]
	Unavailable(String),
	/// Reachable but refused the request.
	#[error("Backend rejected the request: {0}")]
	Rejected(String),
	#[error("Invalid backend response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Body of `POST /fastswap/eth`. Amounts are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthSwapRequest {
	pub output_token: Address,
	pub input_amt: String,
	pub user_amt_out: String,
	pub sender: Address,
	pub deadline: String,
}

/// Unsigned transaction returned for the direct-ETH path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthSwapResponse {
	pub to: Option<Address>,
	#[serde(default)]
	pub data: Bytes,
	pub value: Option<String>,
	pub chain_id: Option<u64>,
	pub gas_limit: Option<u64>,
	#[serde(default)]
	pub status: String,
	pub error: Option<String>,
}

/// Body of `POST /fastswap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSubmission {
	pub user: Address,
	pub input_token: Address,
	pub output_token: Address,
	pub input_amt: String,
	pub user_amt_out: String,
	pub recipient: Address,
	pub deadline: String,
	pub nonce: String,
	pub signature: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSubmitted {
	pub tx_hash: Option<TxHash>,
	pub output_amount: Option<String>,
	pub gas_limit: Option<u64>,
	#[serde(default)]
	pub status: String,
	pub error: Option<String>,
}

/// Whether a backend `status` / `error` pair reports a refusal.
pub(crate) fn refusal(status: &str, error: Option<&str>) -> Option<String> {
	if let Some(error) = error.filter(|e| !e.is_empty()) {
		return Some(error.to_string());
	}
	match status.to_lowercase().as_str() {
		"error" | "failed" | "rejected" => Some(format!("Backend status {}", status)),
		_ => None,
	}
}

/// Off-chain execution service.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Requests an unsigned transaction for a native-input swap.
	async fn request_eth_swap(&self, request: &EthSwapRequest)
		-> Result<EthSwapResponse, BackendError>;

	/// Relays a signed intent; the backend broadcasts the settlement.
	async fn submit_intent(
		&self,
		submission: &IntentSubmission,
	) -> Result<IntentSubmitted, BackendError>;
}

/// Builds an execution backend from its implementation name and settings.
pub fn create_backend(
	implementation: &str,
	config: &toml::Value,
) -> Result<Arc<dyn ExecutionBackend>, BackendError> {
	match implementation {
		"http" => implementations::http::create_http_backend(config),
		other => Err(BackendError::Configuration(format!(
			"Unknown execution backend implementation: {}",
			other
		))),
	}
}
