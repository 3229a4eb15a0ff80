//! Keeps the displayed quote for an observed pair fresh.
//!
//! [`QuoteState`] is the synchronous core: every input change, timer tick and
//! fetch response goes through it and it answers with at most one fetch to
//! issue. [`QuoteStore::observe`] wraps a state in a session task that owns
//! the ticker and in-flight fetches and publishes a [`QuoteView`] whenever it
//! changes.

use crate::{QuoteError, QuoteInterface, QuoteRequest, RouteClassifier, TradeType};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use swap_types::{Address, Clock, DisplayQuote, Quote, Route, Token, U256};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

/// What the user has entered.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteInput {
	pub token_in: Option<Token>,
	pub token_out: Option<Token>,
	/// Human-readable amount of `token_in`.
	pub amount: String,
	pub slippage_percent: Decimal,
}

impl QuoteInput {
	pub fn new(token_in: Token, token_out: Token, amount: impl Into<String>) -> Self {
		Self {
			token_in: Some(token_in),
			token_out: Some(token_out),
			amount: amount.into(),
			slippage_percent: Decimal::new(5, 1),
		}
	}

	pub fn with_slippage(mut self, percent: Decimal) -> Self {
		self.slippage_percent = percent;
		self
	}
}

/// Identifies what a quote was requested for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
	pub token_in: Address,
	pub token_out: Address,
	pub amount_in: U256,
}

/// Adopted quotes by pair, shared by every session of a store.
#[derive(Debug, Clone, Default)]
pub struct QuoteCache {
	inner: Arc<DashMap<PairKey, Quote>>,
}

impl QuoteCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the cached quote for `key` if it is still live; expired entries
	/// are evicted.
	pub fn get_live(&self, key: &PairKey, now: DateTime<Utc>, ttl: Duration) -> Option<Quote> {
		let quote = self.inner.get(key).map(|q| q.clone())?;
		if quote.is_live(now, ttl) {
			Some(quote)
		} else {
			self.inner.remove(key);
			None
		}
	}

	pub fn insert(&self, key: PairKey, quote: Quote) {
		self.inner.insert(key, quote);
	}

	pub fn remove(&self, key: &PairKey) {
		self.inner.remove(key);
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}
}

/// Timing knobs for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteSettings {
	/// How long an adopted quote is valid.
	pub ttl: Duration,
	/// Remaining lifetime at which one early refetch is issued.
	pub refetch_threshold: Duration,
	pub tick: Duration,
	/// Reverse requests closer together than this are ignored.
	pub reverse_debounce: Duration,
}

impl Default for QuoteSettings {
	fn default() -> Self {
		Self {
			ttl: Duration::from_secs(15),
			refetch_threshold: Duration::from_secs(3),
			tick: Duration::from_secs(1),
			reverse_debounce: Duration::from_millis(500),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteStatus {
	/// Nothing to quote yet.
	Idle,
	Invalid(String),
	Loading,
	Refreshing,
	Ready,
	NoLiquidity,
	Error(String),
	/// Wrap and unwrap are 1:1 and never priced.
	NotRequired,
}

/// Snapshot published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteView {
	pub route: Option<Route>,
	pub quote: Option<DisplayQuote>,
	pub time_left: Duration,
	pub status: QuoteStatus,
	pub token_in: Option<Token>,
	pub token_out: Option<Token>,
	pub amount: String,
}

/// A fetch the caller must perform and report back through
/// [`QuoteState::on_response`] with the same `key` and `seq`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOrder {
	pub key: PairKey,
	/// Issue order; higher is newer.
	pub seq: u64,
	pub request: QuoteRequest,
}

pub struct QuoteState {
	classifier: RouteClassifier,
	settings: QuoteSettings,
	cache: QuoteCache,
	clock: Arc<dyn Clock>,
	input: QuoteInput,
	key: Option<PairKey>,
	route: Option<Route>,
	display: Option<DisplayQuote>,
	/// Latest adopted quote for `key`.
	live: Option<Quote>,
	time_left: Duration,
	running: bool,
	refetch_issued: bool,
	in_flight: usize,
	status: QuoteStatus,
	clock_generation: u64,
	next_seq: u64,
	/// First sequence number issued for the current `key`.
	pair_seq: u64,
	/// Newest sequence number answered for the current `key`.
	latest_seq: u64,
}

impl QuoteState {
	pub fn new(
		classifier: RouteClassifier,
		settings: QuoteSettings,
		cache: QuoteCache,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			classifier,
			settings,
			cache,
			clock,
			input: QuoteInput {
				token_in: None,
				token_out: None,
				amount: String::new(),
				slippage_percent: Decimal::ZERO,
			},
			key: None,
			route: None,
			display: None,
			live: None,
			time_left: Duration::ZERO,
			running: false,
			refetch_issued: false,
			in_flight: 0,
			status: QuoteStatus::Idle,
			clock_generation: 0,
			next_seq: 0,
			pair_seq: 0,
			latest_seq: 0,
		}
	}

	pub fn settings(&self) -> &QuoteSettings {
		&self.settings
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	pub fn pair_key(&self) -> Option<&PairKey> {
		self.key.as_ref()
	}

	/// Bumped whenever the countdown restarts from the TTL.
	pub fn clock_generation(&self) -> u64 {
		self.clock_generation
	}

	pub fn view(&self) -> QuoteView {
		QuoteView {
			route: self.route,
			quote: self.display.clone(),
			time_left: self.time_left,
			status: self.status.clone(),
			token_in: self.input.token_in.clone(),
			token_out: self.input.token_out.clone(),
			amount: self.input.amount.clone(),
		}
	}

	fn restart_clock(&mut self) {
		self.time_left = self.settings.ttl;
		self.running = true;
		self.refetch_issued = false;
		self.clock_generation += 1;
	}

	fn stop(&mut self, status: QuoteStatus) {
		if let Some(key) = self.key.take() {
			self.cache.remove(&key);
		}
		self.display = None;
		self.live = None;
		self.running = false;
		self.refetch_issued = false;
		self.in_flight = 0;
		self.time_left = Duration::ZERO;
		self.status = status;
	}

	fn validate(&self, input: &QuoteInput) -> Result<(Token, Token, U256), QuoteStatus> {
		let (Some(token_in), Some(token_out)) = (&input.token_in, &input.token_out) else {
			return Err(QuoteStatus::Idle);
		};
		if input.amount.trim().is_empty() {
			return Err(QuoteStatus::Idle);
		}
		if token_in.address == token_out.address && token_in.symbol == token_out.symbol {
			return Err(QuoteStatus::Invalid("Select two different tokens".to_string()));
		}
		let amount = token_in
			.parse_positive_amount(&input.amount)
			.map_err(|e| QuoteStatus::Invalid(e.to_string()))?;
		Ok((token_in.clone(), token_out.clone(), amount))
	}

	/// Applies new user input.
	pub fn set_input(&mut self, input: QuoteInput) -> Option<FetchOrder> {
		let slippage_changed = input.slippage_percent != self.input.slippage_percent;
		let validated = self.validate(&input);
		self.route = match (&input.token_in, &input.token_out) {
			(Some(a), Some(b)) => Some(self.classifier.classify(a, b)),
			_ => None,
		};
		self.input = input;

		let (token_in, token_out, amount_in) = match validated {
			Ok(valid) => valid,
			Err(status) => {
				self.stop(status);
				return None;
			}
		};

		if self.route.is_some_and(|r| r.is_one_to_one()) {
			self.stop(QuoteStatus::NotRequired);
			return None;
		}

		let key = PairKey {
			token_in: token_in.address,
			token_out: token_out.address,
			amount_in,
		};

		if self.key.as_ref() == Some(&key) {
			return if slippage_changed {
				self.issue_fetch()
			} else {
				None
			};
		}

		self.key = Some(key.clone());
		self.in_flight = 0;
		self.pair_seq = self.next_seq;
		self.latest_seq = self.next_seq;
		self.live = self.cache.get_live(&key, self.clock.now(), self.settings.ttl);
		self.display = self.live.clone().map(DisplayQuote::Live);
		self.restart_clock();
		self.issue_fetch()
	}

	fn issue_fetch(&mut self) -> Option<FetchOrder> {
		let key = self.key.clone()?;
		let token_in = self.input.token_in.as_ref()?;
		let token_out = self.input.token_out.as_ref()?;

		let request = QuoteRequest {
			token_in: self.classifier.pricing_address(token_in),
			token_out: self.classifier.pricing_address(token_out),
			amount_in: key.amount_in,
			slippage_percent: self.input.slippage_percent,
			trade_type: TradeType::ExactIn,
			requested_at: self.clock.now(),
		};
		let seq = self.next_seq;
		self.next_seq += 1;

		self.in_flight += 1;
		if let Some(DisplayQuote::Live(quote)) = self.display.take() {
			self.display = Some(DisplayQuote::Cached(quote));
		}
		self.status = if self.display.is_some() {
			QuoteStatus::Refreshing
		} else {
			QuoteStatus::Loading
		};

		Some(FetchOrder { key, seq, request })
	}

	/// Advances the countdown by one tick.
	pub fn on_tick(&mut self) -> Option<FetchOrder> {
		if !self.running {
			return None;
		}

		self.time_left = self.time_left.saturating_sub(self.settings.tick);
		if self.time_left.is_zero() {
			debug!("Quote expired, forcing refetch");
			self.time_left = self.settings.ttl;
			self.clock_generation += 1;
			return self.issue_fetch();
		}

		if self.time_left <= self.settings.refetch_threshold && !self.refetch_issued {
			self.refetch_issued = true;
			debug!(time_left = ?self.time_left, "Refetch threshold reached");
			return self.issue_fetch();
		}
		None
	}

	fn settle_display(&mut self) {
		if self.in_flight > 0 {
			return;
		}
		if let Some(DisplayQuote::Cached(quote)) = self.display.take() {
			self.display = Some(DisplayQuote::Live(quote));
		}
	}

	fn settle_status(&mut self) {
		if self.display.is_none() {
			return;
		}
		self.status = if self.in_flight > 0 {
			QuoteStatus::Refreshing
		} else {
			QuoteStatus::Ready
		};
	}

	/// Handles the result of the fetch issued as `seq`. Returns true when the
	/// quote was adopted.
	///
	/// A response is only applied if nothing newer for the same pair has been
	/// answered, so a slow early request never overwrites a later one.
	pub fn on_response(
		&mut self,
		key: PairKey,
		seq: u64,
		result: Result<Quote, QuoteError>,
	) -> bool {
		if self.key.as_ref() != Some(&key) || seq < self.pair_seq {
			debug!("Dropping quote for a stale pair");
			return false;
		}
		self.in_flight = self.in_flight.saturating_sub(1);

		if seq < self.latest_seq {
			debug!(seq, latest = self.latest_seq, "Dropping out-of-order quote response");
			self.settle_display();
			self.settle_status();
			return false;
		}
		self.latest_seq = seq;

		let quote = match result {
			Ok(quote) => quote,
			Err(QuoteError::NoLiquidity) => {
				self.cache.remove(&key);
				self.display = None;
				self.live = None;
				self.status = QuoteStatus::NoLiquidity;
				return false;
			}
			Err(e) => {
				warn!(error = %e, "Quote fetch failed");
				self.settle_display();
				self.status = QuoteStatus::Error(e.to_string());
				return false;
			}
		};

		// a synthetic overlay is replaced by any genuine quote for the new pair
		let synthetic = matches!(self.display, Some(DisplayQuote::SyntheticInverted(_)));
		let same = self
			.live
			.as_ref()
			.is_some_and(|live| live.identity() == quote.identity());
		if !synthetic && same {
			self.cache.insert(key, quote);
			self.settle_display();
			self.settle_status();
			return false;
		}

		self.cache.insert(key, quote.clone());
		self.live = Some(quote.clone());
		self.display = Some(if self.in_flight > 0 {
			DisplayQuote::Cached(quote)
		} else {
			DisplayQuote::Live(quote)
		});
		self.status = if self.in_flight > 0 {
			QuoteStatus::Refreshing
		} else {
			QuoteStatus::Ready
		};
		self.restart_clock();
		true
	}

	/// Swaps the pair direction. The previous output amount becomes the new
	/// input amount and the reciprocal quote is shown until a real one lands.
	pub fn reverse(&mut self) -> Option<FetchOrder> {
		let (Some(token_in), Some(token_out)) =
			(self.input.token_in.clone(), self.input.token_out.clone())
		else {
			return None;
		};

		let previous = self.display.as_ref().map(|d| d.quote().clone());
		let amount = match (&previous, self.route) {
			(Some(quote), Some(Route::Swap)) => token_out
				.format_amount(quote.amount_out)
				.unwrap_or_else(|_| self.input.amount.clone()),
			_ => self.input.amount.clone(),
		};

		let input = QuoteInput {
			token_in: Some(token_out),
			token_out: Some(token_in),
			amount,
			slippage_percent: self.input.slippage_percent,
		};
		let order = self.set_input(input);

		if self.display.is_none() && order.is_some() {
			if let Some(quote) = previous {
				self.display = Some(DisplayQuote::SyntheticInverted(quote.inverted()));
				self.status = QuoteStatus::Refreshing;
			}
		}
		order
	}
}

enum QuoteCommand {
	SetInput(QuoteInput),
	Reverse,
}

/// Spawns quote sessions that share one source and cache.
#[derive(Clone)]
pub struct QuoteStore {
	source: Arc<dyn QuoteInterface>,
	classifier: RouteClassifier,
	settings: QuoteSettings,
	cache: QuoteCache,
	clock: Arc<dyn Clock>,
}

impl QuoteStore {
	pub fn new(
		source: Arc<dyn QuoteInterface>,
		classifier: RouteClassifier,
		settings: QuoteSettings,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			source,
			classifier,
			settings,
			cache: QuoteCache::new(),
			clock,
		}
	}

	pub fn cache(&self) -> &QuoteCache {
		&self.cache
	}

	pub fn classifier(&self) -> &RouteClassifier {
		&self.classifier
	}

	/// Starts observing `input`. Timers and fetches stop when the returned
	/// handle is dropped.
	pub fn observe(&self, input: QuoteInput) -> QuoteHandle {
		let mut state = QuoteState::new(
			self.classifier.clone(),
			self.settings,
			self.cache.clone(),
			self.clock.clone(),
		);
		let initial = state.set_input(input);

		let (commands, receiver) = mpsc::unbounded_channel();
		let (view_tx, view) = watch::channel(state.view());
		let session = QuoteSession {
			state,
			source: self.source.clone(),
			fetches: JoinSet::new(),
		};
		let task = tokio::spawn(session.run(initial, receiver, view_tx));

		QuoteHandle {
			commands,
			view,
			task,
		}
	}
}

struct QuoteSession {
	state: QuoteState,
	source: Arc<dyn QuoteInterface>,
	fetches: JoinSet<(PairKey, u64, Result<Quote, QuoteError>)>,
}

impl QuoteSession {
	fn spawn_fetch(&mut self, order: Option<FetchOrder>) {
		let Some(FetchOrder { key, seq, request }) = order else {
			return;
		};
		let source = self.source.clone();
		self.fetches.spawn(async move {
			let result = source.fetch_quote(&request).await;
			(key, seq, result)
		});
	}

	async fn run(
		mut self,
		initial: Option<FetchOrder>,
		mut commands: mpsc::UnboundedReceiver<QuoteCommand>,
		view_tx: watch::Sender<QuoteView>,
	) {
		let settings = *self.state.settings();
		let mut ticker = tokio::time::interval_at(Instant::now() + settings.tick, settings.tick);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut last_reverse: Option<Instant> = None;

		self.spawn_fetch(initial);

		loop {
			let generation = self.state.clock_generation();

			tokio::select! {
				command = commands.recv() => match command {
					Some(QuoteCommand::SetInput(input)) => {
						let order = self.state.set_input(input);
						self.spawn_fetch(order);
					}
					Some(QuoteCommand::Reverse) => {
						let now = Instant::now();
						let debounced = last_reverse
							.is_some_and(|at| now.duration_since(at) < settings.reverse_debounce);
						if debounced {
							debug!("Ignoring reverse inside debounce window");
						} else {
							last_reverse = Some(now);
							let order = self.state.reverse();
							self.spawn_fetch(order);
						}
					}
					None => break,
				},
				_ = ticker.tick(), if self.state.is_running() => {
					let order = self.state.on_tick();
					self.spawn_fetch(order);
				}
				Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => match joined {
					Ok((key, seq, result)) => {
						self.state.on_response(key, seq, result);
					}
					Err(e) if e.is_cancelled() => {}
					Err(e) => warn!(error = %e, "Quote fetch task failed"),
				},
			}

			if self.state.pair_key().is_none() {
				self.fetches.abort_all();
			}
			if self.state.clock_generation() != generation {
				ticker.reset();
			}

			let next = self.state.view();
			view_tx.send_if_modified(|current| {
				if *current != next {
					*current = next;
					true
				} else {
					false
				}
			});
		}
		debug!("Quote session closed");
	}
}

/// Observer side of a quote session.
pub struct QuoteHandle {
	commands: mpsc::UnboundedSender<QuoteCommand>,
	view: watch::Receiver<QuoteView>,
	task: JoinHandle<()>,
}

impl QuoteHandle {
	pub fn set_input(&self, input: QuoteInput) {
		if self.commands.send(QuoteCommand::SetInput(input)).is_err() {
			warn!("Quote session is gone");
		}
	}

	pub fn reverse(&self) {
		if self.commands.send(QuoteCommand::Reverse).is_err() {
			warn!("Quote session is gone");
		}
	}

	pub fn current(&self) -> QuoteView {
		self.view.borrow().clone()
	}

	/// Waits for the next published view.
	pub async fn changed(&mut self) -> Option<QuoteView> {
		self.view.changed().await.ok()?;
		Some(self.view.borrow_and_update().clone())
	}

	pub fn stream(&self) -> WatchStream<QuoteView> {
		WatchStream::new(self.view.clone())
	}
}

impl Drop for QuoteHandle {
	fn drop(&mut self) {
		self.task.abort();
	}
}
