//! Races receipt sources for a submitted transaction.
//!
//! Every [`Watcher`] polls its source at a fixed interval for a bounded number
//! of attempts. The first terminal receipt claims the shared `processed` flag,
//! cancels the race token so the others stop, and is the only one reported.
//! Cancelling the resolver's parent token stops every watcher, including
//! requests in flight.
//!
//! A hash is raced at most once: later callers join the resolution in
//! progress, and a confirmed hash keeps its confirmation.

use crate::{EventFilter, ReceiptError, ReceiptSource};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swap_types::{truncate_hash, Confirmation, Receipt, TxHash};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One polled source with its cadence and attempt budget.
#[derive(Clone)]
pub struct Watcher {
	source: Arc<dyn ReceiptSource>,
	interval: Duration,
	max_attempts: u32,
}

impl Watcher {
	pub fn new(source: Arc<dyn ReceiptSource>, interval: Duration, max_attempts: u32) -> Self {
		Self {
			source,
			interval,
			max_attempts,
		}
	}

	pub fn name(&self) -> &str {
		self.source.name()
	}

	/// Polls until a receipt shows up, the budget runs out or `race` is
	/// cancelled. Returns the receipt only if this watcher won the race.
	async fn watch(
		&self,
		hash: TxHash,
		race: CancellationToken,
		processed: Arc<AtomicBool>,
	) -> Option<Receipt> {
		for attempt in 1..=self.max_attempts {
			let polled = tokio::select! {
				_ = race.cancelled() => return None,
				polled = self.source.fetch(hash) => polled,
			};

			match polled {
				Ok(Some(receipt)) => {
					if processed
						.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
						.is_ok()
					{
						race.cancel();
						return Some(receipt);
					}
					return None;
				}
				Ok(None) => {
					debug!(source = self.name(), attempt, tx_hash = %truncate_hash(&hash), "Receipt pending");
				}
				Err(e) => {
					debug!(source = self.name(), attempt, error = %e, "Receipt poll failed");
				}
			}

			if attempt < self.max_attempts {
				tokio::select! {
					_ = race.cancelled() => return None,
					_ = tokio::time::sleep(self.interval) => {}
				}
			}
		}
		debug!(source = self.name(), tx_hash = %truncate_hash(&hash), "Receipt watcher exhausted");
		None
	}
}

/// `None` until the owning race finishes.
type Outcome = Option<Result<Confirmation, ReceiptError>>;

/// Removes an unsettled hash from the map when its race ends without a
/// confirmation, or when the owning future is dropped.
struct Claim<'a> {
	resolutions: &'a DashMap<TxHash, watch::Receiver<Outcome>>,
	hash: TxHash,
	settled: bool,
}

impl Drop for Claim<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.resolutions.remove(&self.hash);
		}
	}
}

pub struct ReceiptResolver {
	watchers: Vec<Watcher>,
	filter: Option<EventFilter>,
	shutdown: CancellationToken,
	resolutions: DashMap<TxHash, watch::Receiver<Outcome>>,
}

impl ReceiptResolver {
	pub fn new(watchers: Vec<Watcher>, shutdown: CancellationToken) -> Self {
		Self {
			watchers,
			filter: None,
			shutdown,
			resolutions: DashMap::new(),
		}
	}

	pub fn with_filter(mut self, filter: EventFilter) -> Self {
		self.filter = Some(filter);
		self
	}

	/// Cancels every resolution in progress.
	pub fn shutdown(&self) {
		self.shutdown.cancel();
	}

	/// Waits for the first terminal receipt of `hash`.
	///
	/// `on_complete` runs once per hash, with the winning confirmation, before
	/// the owning call returns. A call for a hash that is already being
	/// resolved, or was already confirmed, returns that outcome and drops its
	/// own callback. Callbacks never run on timeout or cancellation.
	pub async fn resolve<F>(&self, hash: TxHash, on_complete: F) -> Result<Confirmation, ReceiptError>
	where
		F: FnOnce(&Confirmation) + Send,
	{
		if self.shutdown.is_cancelled() {
			return Err(ReceiptError::Cancelled);
		}

		let claimed = match self.resolutions.entry(hash) {
			Entry::Occupied(existing) => Err(existing.get().clone()),
			Entry::Vacant(slot) => {
				let (publish, outcome) = watch::channel(None);
				slot.insert(outcome);
				Ok(publish)
			}
		};
		let publish = match claimed {
			Ok(publish) => publish,
			Err(mut outcome) => {
				debug!(tx_hash = %truncate_hash(&hash), "Joining receipt resolution");
				let joined = outcome.wait_for(Option::is_some).await.map(|o| o.clone());
				return match joined {
					Ok(Some(result)) => result,
					_ => Err(ReceiptError::Cancelled),
				};
			}
		};
		let mut claim = Claim {
			resolutions: &self.resolutions,
			hash,
			settled: false,
		};

		let result = self.race(hash).await;
		if let Ok(confirmation) = &result {
			claim.settled = true;
			on_complete(confirmation);
		}
		publish.send_replace(Some(result.clone()));
		result
	}

	async fn race(&self, hash: TxHash) -> Result<Confirmation, ReceiptError> {
		let race = self.shutdown.child_token();
		let processed = Arc::new(AtomicBool::new(false));
		let mut watchers = JoinSet::new();
		for watcher in &self.watchers {
			let watcher = watcher.clone();
			let race = race.clone();
			let processed = processed.clone();
			watchers.spawn(async move {
				let receipt = watcher.watch(hash, race, processed).await;
				receipt.map(|r| (r, watcher.name().to_string()))
			});
		}

		let mut winner = None;
		while let Some(joined) = watchers.join_next().await {
			match joined {
				Ok(Some(won)) => {
					winner = Some(won);
					break;
				}
				Ok(None) => {}
				Err(e) => warn!(error = %e, "Receipt watcher task failed"),
			}
		}
		race.cancel();
		watchers.abort_all();

		let Some((receipt, source)) = winner else {
			if self.shutdown.is_cancelled() {
				return Err(ReceiptError::Cancelled);
			}
			warn!(tx_hash = %truncate_hash(&hash), "No receipt before every watcher gave up");
			return Err(ReceiptError::Timeout(hash));
		};

		let extracted = self.filter.as_ref().and_then(|f| f.extract(&receipt));
		info!(
			tx_hash = %truncate_hash(&hash),
			source = %source,
			success = receipt.success,
			extracted = ?extracted,
			"Receipt resolved"
		);
		Ok(Confirmation {
			receipt,
			extracted,
			source,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::atomic::AtomicU32;
	use std::sync::Mutex;
	use swap_types::{Address, Bytes, ConfigSchema, ReceiptLog, B256};

	/// Answers with a receipt from its `ready_at`-th poll onwards.
	struct ScriptedSource {
		name: &'static str,
		ready_at: Option<u32>,
		polls: AtomicU32,
		logs: Vec<ReceiptLog>,
	}

	impl ScriptedSource {
		fn new(name: &'static str, ready_at: Option<u32>) -> Arc<Self> {
			Arc::new(Self {
				name,
				ready_at,
				polls: AtomicU32::new(0),
				logs: vec![],
			})
		}

		fn polls(&self) -> u32 {
			self.polls.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl ReceiptSource for ScriptedSource {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(crate::implementations::wallet::WalletReceiptSchema)
		}

		fn name(&self) -> &str {
			self.name
		}

		async fn fetch(&self, hash: TxHash) -> Result<Option<Receipt>, ReceiptError> {
			let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
			tokio::time::sleep(Duration::from_millis(10)).await;
			match self.ready_at {
				Some(at) if n >= at => Ok(Some(Receipt {
					transaction_hash: hash,
					block_number: Some(n as u64),
					success: true,
					logs: self.logs.clone(),
				})),
				_ => Ok(None),
			}
		}
	}

	fn resolver(sources: &[Arc<ScriptedSource>], max_attempts: u32) -> ReceiptResolver {
		let watchers = sources
			.iter()
			.map(|s| Watcher::new(s.clone(), Duration::from_secs(1), max_attempts))
			.collect();
		ReceiptResolver::new(watchers, CancellationToken::new())
	}

	#[tokio::test(start_paused = true)]
	async fn test_faster_source_wins_and_loser_stops() {
		let rpc = ScriptedSource::new("rpc", Some(5));
		let db = ScriptedSource::new("database", Some(2));
		let resolver = resolver(&[rpc.clone(), db.clone()], 30);

		let calls = Mutex::new(Vec::new());
		let confirmation = resolver
			.resolve(TxHash::repeat_byte(1), |c| calls.lock().unwrap().push(c.source.clone()))
			.await
			.unwrap();

		assert_eq!(confirmation.source, "database");
		assert_eq!(*calls.lock().unwrap(), vec!["database".to_string()]);

		let rpc_polls = rpc.polls();
		tokio::time::sleep(Duration::from_secs(10)).await;
		assert_eq!(rpc.polls(), rpc_polls);
		assert!(rpc_polls < 5);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_when_all_exhausted() {
		let rpc = ScriptedSource::new("rpc", None);
		let db = ScriptedSource::new("database", None);
		let resolver = resolver(&[rpc.clone(), db.clone()], 3);

		let mut fired = false;
		let result = resolver.resolve(TxHash::repeat_byte(2), |_| fired = true).await;
		assert_eq!(result, Err(ReceiptError::Timeout(TxHash::repeat_byte(2))));
		assert!(!fired);
		assert_eq!(rpc.polls(), 3);
		assert_eq!(db.polls(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_parent_cancellation() {
		let rpc = ScriptedSource::new("rpc", None);
		let resolver = Arc::new(resolver(&[rpc.clone()], 100));

		let task = {
			let resolver = resolver.clone();
			tokio::spawn(async move { resolver.resolve(TxHash::repeat_byte(3), |_| {}).await })
		};
		tokio::time::sleep(Duration::from_millis(2500)).await;
		resolver.shutdown();

		assert_eq!(task.await.unwrap(), Err(ReceiptError::Cancelled));
		let polls = rpc.polls();
		tokio::time::sleep(Duration::from_secs(5)).await;
		assert_eq!(rpc.polls(), polls);
	}

	#[tokio::test(start_paused = true)]
	async fn test_concurrent_resolve_settles_once() {
		let rpc = ScriptedSource::new("rpc", Some(3));
		let resolver = resolver(&[rpc.clone()], 30);
		let hash = TxHash::repeat_byte(5);

		let callbacks = AtomicU32::new(0);
		let (first, second) = tokio::join!(
			resolver.resolve(hash, |_| {
				callbacks.fetch_add(1, Ordering::SeqCst);
			}),
			resolver.resolve(hash, |_| {
				callbacks.fetch_add(1, Ordering::SeqCst);
			}),
		);
		assert_eq!(callbacks.load(Ordering::SeqCst), 1);
		assert_eq!(first.unwrap(), second.unwrap());
		assert_eq!(rpc.polls(), 3);

		// already confirmed: same outcome, no new race, no callback
		let again = resolver
			.resolve(hash, |_| {
				callbacks.fetch_add(1, Ordering::SeqCst);
			})
			.await
			.unwrap();
		assert_eq!(again.receipt.transaction_hash, hash);
		assert_eq!(callbacks.load(Ordering::SeqCst), 1);
		assert_eq!(rpc.polls(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timed_out_hash_can_be_resolved_again() {
		let rpc = ScriptedSource::new("rpc", Some(4));
		let resolver = resolver(&[rpc.clone()], 2);
		let hash = TxHash::repeat_byte(6);

		assert_eq!(resolver.resolve(hash, |_| {}).await, Err(ReceiptError::Timeout(hash)));
		let mut fired = false;
		let confirmation = resolver.resolve(hash, |_| fired = true).await.unwrap();
		assert!(fired);
		assert_eq!(confirmation.receipt.block_number, Some(4));
	}

	#[tokio::test(start_paused = true)]
	async fn test_extracts_configured_event() {
		let contract = Address::repeat_byte(0x11);
		let filter = EventFilter::new(contract, "IntentSettled(bytes32,address,uint256)", 1);
		let id = B256::repeat_byte(0x42);
		let source = Arc::new(ScriptedSource {
			name: "rpc",
			ready_at: Some(1),
			polls: AtomicU32::new(0),
			logs: vec![ReceiptLog {
				address: contract,
				topics: vec![filter.topic0, id],
				data: Bytes::new(),
			}],
		});
		let resolver = ReceiptResolver::new(
			vec![Watcher::new(source, Duration::from_secs(1), 5)],
			CancellationToken::new(),
		)
		.with_filter(filter);

		let confirmation = resolver.resolve(TxHash::repeat_byte(4), |_| {}).await.unwrap();
		assert_eq!(confirmation.extracted, Some(id));
	}
}
