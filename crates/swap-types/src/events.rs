//! Events published on the engine's event bus.

use crate::{Confirmation, FailureKind, Route, SettlementHash, SettlementPath, SettlementStatus};
use uuid::Uuid;

/// Main event type for swap engine communication.
#[derive(Debug, Clone)]
pub enum SwapEvent {
	Settlement(SettlementEvent),
	Receipt(ReceiptEvent),
}

#[derive(Debug, Clone)]
pub enum SettlementEvent {
	Started {
		attempt_id: Uuid,
		path: SettlementPath,
		route: Route,
	},
	StatusChanged {
		attempt_id: Uuid,
		status: SettlementStatus,
	},
	Submitted {
		attempt_id: Uuid,
		hash: SettlementHash,
	},
	Failed {
		attempt_id: Uuid,
		kind: FailureKind,
		message: String,
	},
	Reset,
}

#[derive(Debug, Clone)]
pub enum ReceiptEvent {
	Confirmed {
		attempt_id: Uuid,
		confirmation: Confirmation,
	},
	TimedOut {
		attempt_id: Uuid,
	},
}
