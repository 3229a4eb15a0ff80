//! Settlement attempt state shared between the router and its observers.

use crate::{Intent, Receipt};
use alloy::primitives::{Bytes, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
	Idle,
	Signing,
	Submitting,
	Success,
	Error,
}

impl SettlementStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, SettlementStatus::Success | SettlementStatus::Error)
	}

	pub fn is_active(&self) -> bool {
		matches!(self, SettlementStatus::Signing | SettlementStatus::Submitting)
	}
}

/// How a confirmed swap is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SettlementPath {
	/// WETH `deposit()` sent by the wallet.
	Wrap,
	/// WETH `withdraw(amount)` sent by the wallet.
	Unwrap,
	/// Native input: the backend returns an unsigned transaction the wallet sends.
	DirectEth,
	/// ERC-20 input: a signed intent relayed by the backend.
	Permit,
}

impl fmt::Display for SettlementPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SettlementPath::Wrap => write!(f, "wrap"),
			SettlementPath::Unwrap => write!(f, "unwrap"),
			SettlementPath::DirectEth => write!(f, "direct-eth"),
			SettlementPath::Permit => write!(f, "permit"),
		}
	}
}

/// Identifier of a submitted settlement.
///
/// Fallback ids are a separate variant so they can never be mistaken for a
/// transaction hash or handed to receipt resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SettlementHash {
	OnChain(TxHash),
	Fallback(Uuid),
}

impl SettlementHash {
	pub fn on_chain(&self) -> Option<TxHash> {
		match self {
			SettlementHash::OnChain(hash) => Some(*hash),
			SettlementHash::Fallback(_) => None,
		}
	}

	pub fn is_fallback(&self) -> bool {
		matches!(self, SettlementHash::Fallback(_))
	}
}

impl fmt::Display for SettlementHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SettlementHash::OnChain(hash) => write!(f, "{}", hash),
			SettlementHash::Fallback(id) => write!(f, "fallback:{}", id),
		}
	}
}

/// Prefix of every user-facing message about a fallback result.
pub const FALLBACK_LABEL: &str = "Fallback: not broadcast";

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
	/// The user declined in the wallet. Rendered as a neutral cancellation.
	UserRejected,
	/// The execution backend could not be reached and no fallback is enabled.
	BackendUnavailable,
	SettlementFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptError {
	pub kind: FailureKind,
	pub message: String,
}

/// Result of the resolver, applied to the attempt by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
	pub receipt: Receipt,
	/// Indexed value extracted from the expected event, if it was emitted.
	pub extracted: Option<alloy::primitives::B256>,
	pub source: String,
}

/// One run of the settlement state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementAttempt {
	pub id: Uuid,
	pub status: SettlementStatus,
	pub path: Option<SettlementPath>,
	pub hash: Option<SettlementHash>,
	pub intent: Option<Intent>,
	pub signature: Option<Bytes>,
	pub error: Option<AttemptError>,
	/// User-facing notice, set when the fallback strategy produced the result.
	pub notice: Option<String>,
	pub confirmation: Option<Confirmation>,
	pub started_at: Option<DateTime<Utc>>,
}

impl Default for SettlementAttempt {
	fn default() -> Self {
		Self::idle()
	}
}

impl SettlementAttempt {
	pub fn idle() -> Self {
		Self {
			id: Uuid::nil(),
			status: SettlementStatus::Idle,
			path: None,
			hash: None,
			intent: None,
			signature: None,
			error: None,
			notice: None,
			confirmation: None,
			started_at: None,
		}
	}

	pub fn started(path: SettlementPath, now: DateTime<Utc>) -> Self {
		Self {
			id: Uuid::new_v4(),
			path: Some(path),
			started_at: Some(now),
			..Self::idle()
		}
	}

	/// Human readable status line. Fallback results always carry
	/// [`FALLBACK_LABEL`], whatever notice was configured.
	pub fn status_message(&self) -> String {
		match self.status {
			SettlementStatus::Idle => "Ready to swap".to_string(),
			SettlementStatus::Signing => "Please sign the transaction in your wallet...".to_string(),
			SettlementStatus::Submitting => match self.path {
				Some(SettlementPath::Wrap) => "Submitting wrap transaction...",
				Some(SettlementPath::Unwrap) => "Submitting unwrap transaction...",
				Some(SettlementPath::DirectEth) => "Submitting swap transaction...",
				Some(SettlementPath::Permit) | None => "Submitting swap intent...",
			}
			.to_string(),
			SettlementStatus::Success => match (self.hash, &self.notice) {
				(Some(SettlementHash::Fallback(_)), Some(notice)) => {
					format!("{} ({})", FALLBACK_LABEL, notice)
				}
				(Some(SettlementHash::Fallback(_)), None) => FALLBACK_LABEL.to_string(),
				_ => match self.path {
					Some(SettlementPath::Wrap) => "Wrap transaction submitted successfully!",
					Some(SettlementPath::Unwrap) => "Unwrap transaction submitted successfully!",
					Some(SettlementPath::DirectEth) => "Swap transaction submitted successfully!",
					Some(SettlementPath::Permit) | None => "Swap intent submitted successfully!",
				}
				.to_string(),
			},
			SettlementStatus::Error => self
				.error
				.as_ref()
				.map(|e| e.message.clone())
				.unwrap_or_else(|| "An error occurred".to_string()),
		}
	}
}
