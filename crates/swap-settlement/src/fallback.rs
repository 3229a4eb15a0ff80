//! What happens when the execution backend cannot be reached.
//!
//! Disabled by default, in which case the attempt fails with
//! `BackendUnavailable`. When enabled, the router waits through a short
//! sequence of delays and reports success with an out-of-band
//! [`SettlementHash::Fallback`] id and a notice. Those ids never reach
//! receipt resolution.

use std::time::Duration;
use swap_types::SettlementHash;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_NOTICE: &str =
	"Execution service unreachable; settlement was not broadcast by the backend";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackStrategy {
	enabled: bool,
	delays: Vec<Duration>,
	notice: String,
}

impl Default for FallbackStrategy {
	fn default() -> Self {
		Self::disabled()
	}
}

impl FallbackStrategy {
	pub fn disabled() -> Self {
		Self {
			enabled: false,
			delays: Vec::new(),
			notice: DEFAULT_NOTICE.to_string(),
		}
	}

	pub fn enabled(delays: Vec<Duration>, notice: impl Into<String>) -> Self {
		Self {
			enabled: true,
			delays,
			notice: notice.into(),
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Runs the synthetic delay sequence. `None` when disabled.
	pub async fn run(&self, reason: &str) -> Option<(SettlementHash, String)> {
		if !self.enabled {
			return None;
		}
		warn!(reason = %reason, "Execution backend unavailable, using fallback");
		for delay in &self.delays {
			tokio::time::sleep(*delay).await;
		}
		Some((SettlementHash::Fallback(Uuid::new_v4()), self.notice.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_disabled_does_nothing() {
		assert!(FallbackStrategy::default().run("down").await.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn test_enabled_waits_and_tags_hash() {
		let strategy = FallbackStrategy::enabled(
			vec![Duration::from_millis(1000), Duration::from_millis(1500)],
			"simulated",
		);
		let start = tokio::time::Instant::now();
		let (hash, notice) = strategy.run("down").await.unwrap();
		assert!(start.elapsed() >= Duration::from_millis(2500));
		assert!(hash.is_fallback());
		assert!(hash.on_chain().is_none());
		assert_eq!(notice, "simulated");
	}
}
