//! The swap engine.
//!
//! [`SwapEngineBuilder`] turns a [`SwapConfig`] into the running components:
//! quote store, slippage calculator, intent builder, settlement router and
//! receipt resolver. [`SwapEngine`] drives them and publishes [`SwapEvent`]s
//! on its [`EventBus`].

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swap_config::{FallbackConfig, IntentConfig, NonceSourceKind, QuoteConfig, SwapConfig};
use swap_intent::{
	intent_settled_signature, ContractNonceSource, IntentBuilder, IntentError, IntentSettings,
	NonceSource, SettlementContract, TimestampNonceSource,
};
use swap_quote::{
	QuoteError, QuoteHandle, QuoteInput, QuoteInterface, QuoteSettings, QuoteStore,
	RouteClassifier, SlippageCalculator, SlippageContext, SlippageMode,
};
use swap_receipt::implementations::wallet::WalletReceiptSource;
use swap_receipt::{EventFilter, ReceiptError, ReceiptResolver, ReceiptSource, Watcher};
use swap_settlement::{
	reverted_message, BackendError, ExecutionBackend, FallbackStrategy, SettlementError,
	SettlementRouter, SwapRequest,
};
use swap_types::{
	Address, ChainId, Clock, Confirmation, FailureKind, Intent, ReceiptEvent, Route,
	SettlementAttempt, SettlementEvent, SwapEvent, SystemClock, Token, TokenRegistry, TxHash, U256,
};
use swap_wallet::{WalletError, WalletInterface, WalletResolver};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub mod event_bus;

pub use event_bus::EventBus;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("No settlement contract deployed on chain {0}")]
	UnsupportedChain(ChainId),
	#[error(transparent)]
	Quote(#[from] QuoteError),
	#[error(transparent)]
	Wallet(#[from] WalletError),
	#[error(transparent)]
	Intent(#[from] IntentError),
	#[error(transparent)]
	Backend(#[from] BackendError),
	#[error(transparent)]
	Settlement(#[from] SettlementError),
	#[error(transparent)]
	Receipt(#[from] ReceiptError),
}

pub struct SwapEngine {
	config: SwapConfig,
	tokens: TokenRegistry,
	classifier: RouteClassifier,
	wallets: Arc<WalletResolver>,
	quotes: QuoteStore,
	slippage: SlippageCalculator,
	router: Arc<SettlementRouter>,
	resolver: ReceiptResolver,
	contract: Option<SettlementContract>,
	event_bus: EventBus,
}

impl SwapEngine {
	pub fn config(&self) -> &SwapConfig {
		&self.config
	}

	pub fn tokens(&self) -> &TokenRegistry {
		&self.tokens
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn wallets(&self) -> &Arc<WalletResolver> {
		&self.wallets
	}

	pub fn router(&self) -> &Arc<SettlementRouter> {
		&self.router
	}

	pub fn slippage(&self) -> &SlippageCalculator {
		&self.slippage
	}

	pub fn classify(&self, token_in: &Token, token_out: &Token) -> Route {
		self.classifier.classify(token_in, token_out)
	}

	/// Starts an auto-refreshing quote session for `input`.
	pub fn observe_quote(&self, input: QuoteInput) -> QuoteHandle {
		self.quotes.observe(input)
	}

	/// Slippage percent to use for a trade. Automatic mode reads the current
	/// gas price from the wallet and carries on without it if that fails.
	pub async fn effective_slippage(
		&self,
		mode: SlippageMode,
		token_in: &Token,
		token_out: &Token,
		amount_in: U256,
	) -> Result<Decimal, EngineError> {
		let gas_price_wei = match mode {
			SlippageMode::Manual(_) => None,
			SlippageMode::Auto => match self.wallets.wallet().await?.gas_price().await {
				Ok(price) => Some(price),
				Err(e) => {
					warn!(error = %e, "Gas price unavailable for automatic slippage");
					None
				}
			},
		};
		let ctx = SlippageContext {
			token_in,
			token_out,
			amount_in,
			gas_price_wei,
		};
		Ok(self.slippage.effective(mode, &ctx)?)
	}

	/// Runs one settlement attempt and publishes its lifecycle events.
	///
	/// Returns once the attempt is terminal; call
	/// [`SwapEngine::wait_for_receipt`] to follow it on chain.
	pub async fn swap(&self, request: SwapRequest) -> Result<SettlementAttempt, EngineError> {
		let route = match (&request.token_in, &request.token_out) {
			(Some(token_in), Some(token_out)) => Some(self.classifier.classify(token_in, token_out)),
			_ => None,
		};
		let previous = self.router.current().id;
		let forwarder = self.forward_status(previous, route);

		let result = self.router.confirm(request).await;
		match &result {
			Err(SettlementError::InvalidInput(_)) | Err(SettlementError::AttemptInProgress) => {
				forwarder.abort()
			}
			_ => {
				if let Err(e) = forwarder.await {
					warn!(error = %e, "Status forwarder failed");
				}
			}
		}

		match result {
			Ok(attempt) => {
				if let Some(hash) = attempt.hash {
					self.publish(SwapEvent::Settlement(SettlementEvent::Submitted {
						attempt_id: attempt.id,
						hash,
					}));
				}
				Ok(attempt)
			}
			Err(err) => {
				let attempt = self.router.current();
				if attempt.id != previous {
					if let Some(error) = attempt.error {
						self.publish(SwapEvent::Settlement(SettlementEvent::Failed {
							attempt_id: attempt.id,
							kind: error.kind,
							message: error.message,
						}));
					}
				}
				Err(err.into())
			}
		}
	}

	/// Republishes router status changes for the next attempt until it is
	/// terminal.
	fn forward_status(&self, previous: Uuid, route: Option<Route>) -> JoinHandle<()> {
		let mut updates = self.router.subscribe();
		let bus = self.event_bus.clone();
		tokio::spawn(async move {
			let mut announced = previous;
			while updates.changed().await.is_ok() {
				let attempt = updates.borrow_and_update().clone();
				if attempt.id == previous || attempt.id.is_nil() {
					continue;
				}
				if attempt.id != announced {
					announced = attempt.id;
					if let (Some(path), Some(route)) = (attempt.path, route) {
						bus.publish(SwapEvent::Settlement(SettlementEvent::Started {
							attempt_id: attempt.id,
							path,
							route,
						}))
						.ok();
					}
				}
				bus.publish(SwapEvent::Settlement(SettlementEvent::StatusChanged {
					attempt_id: attempt.id,
					status: attempt.status,
				}))
				.ok();
				if attempt.status.is_terminal() {
					break;
				}
			}
		})
	}

	/// Resolves the receipt of a successful attempt and records it on the
	/// attempt. Fallback results have nothing on chain and yield `None`.
	///
	/// A reverted transaction fails the attempt and is returned as
	/// [`SettlementError::SettlementFailed`].
	pub async fn wait_for_receipt(
		&self,
		attempt: &SettlementAttempt,
	) -> Result<Option<Confirmation>, EngineError> {
		let Some(hash) = attempt.hash.and_then(|h| h.on_chain()) else {
			return Ok(None);
		};
		let attempt_id = attempt.id;
		let result = self
			.resolver
			.resolve(hash, |confirmation| {
				self.router.apply_confirmation(attempt_id, confirmation.clone());
				self.publish(SwapEvent::Receipt(ReceiptEvent::Confirmed {
					attempt_id,
					confirmation: confirmation.clone(),
				}));
			})
			.await;

		match result {
			Ok(confirmation) if !confirmation.receipt.success => {
				let message = reverted_message(&confirmation);
				self.publish(SwapEvent::Settlement(SettlementEvent::Failed {
					attempt_id,
					kind: FailureKind::SettlementFailed,
					message: message.clone(),
				}));
				Err(SettlementError::SettlementFailed(message).into())
			}
			Ok(confirmation) => Ok(Some(confirmation)),
			Err(ReceiptError::Timeout(hash)) => {
				self.publish(SwapEvent::Receipt(ReceiptEvent::TimedOut { attempt_id }));
				Err(ReceiptError::Timeout(hash).into())
			}
			Err(e) => Err(e.into()),
		}
	}

	/// The terminal outcome of the latest attempt, yielded once.
	pub fn take_notification(&self) -> Option<SettlementAttempt> {
		self.router.take_notification()
	}

	/// Clears a finished attempt. Ignored while one is in progress.
	pub fn reset(&self) -> bool {
		let reset = self.router.reset();
		if reset {
			self.publish(SwapEvent::Settlement(SettlementEvent::Reset));
		}
		reset
	}

	fn contract(&self) -> Result<SettlementContract, EngineError> {
		self.contract
			.ok_or(EngineError::UnsupportedChain(self.config.network.chain_id))
	}

	/// Cancels an unsettled intent signed by the connected account.
	pub async fn cancel_intent(&self, intent: &Intent) -> Result<TxHash, EngineError> {
		let contract = self.contract()?;
		let wallet = self.wallets.wallet().await?;
		Ok(contract.cancel_intent(wallet.as_ref(), intent).await?)
	}

	pub async fn claim_refund(&self, token: Address) -> Result<TxHash, EngineError> {
		let contract = self.contract()?;
		let wallet = self.wallets.wallet().await?;
		Ok(contract.claim_refund(wallet.as_ref(), token).await?)
	}

	/// Refund held by the settlement contract for the connected account.
	pub async fn pending_refund(&self, token: Address) -> Result<U256, EngineError> {
		let contract = self.contract()?;
		let wallet = self.wallets.wallet().await?;
		let maker = wallet.address().await?;
		Ok(contract.pending_refund(wallet.as_ref(), maker, token).await?)
	}

	/// Stops every receipt resolution in progress.
	pub fn shutdown(&self) {
		info!("Shutting down swap engine");
		self.resolver.shutdown();
	}

	fn publish(&self, event: SwapEvent) {
		// no subscribers is fine
		self.event_bus.publish(event).ok();
	}
}

// Type aliases for factory functions
type WalletFactory =
	Box<dyn Fn(&toml::Value) -> Result<Arc<dyn WalletInterface>, WalletError> + Send>;
type QuoteSourceFactory =
	Box<dyn Fn(&toml::Value) -> Result<Arc<dyn QuoteInterface>, QuoteError> + Send>;
type BackendFactory =
	Box<dyn Fn(&toml::Value) -> Result<Arc<dyn ExecutionBackend>, BackendError> + Send>;
type ReceiptSourceFactory =
	Box<dyn Fn(&toml::Value) -> Result<Arc<dyn ReceiptSource>, ReceiptError> + Send>;

/// Builds a [`SwapEngine`] from configuration, selecting implementations by
/// the `implementation` key of each pluggable section.
pub struct SwapEngineBuilder {
	config: SwapConfig,
	clock: Arc<dyn Clock>,
	shutdown: CancellationToken,
	wallet_factories: HashMap<String, WalletFactory>,
	quote_factories: HashMap<String, QuoteSourceFactory>,
	backend_factories: HashMap<String, BackendFactory>,
	receipt_factories: HashMap<String, ReceiptSourceFactory>,
}

impl SwapEngineBuilder {
	/// A builder with every built-in implementation registered.
	pub fn new(config: SwapConfig) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
			shutdown: CancellationToken::new(),
			wallet_factories: HashMap::new(),
			quote_factories: HashMap::new(),
			backend_factories: HashMap::new(),
			receipt_factories: HashMap::new(),
		}
		.with_wallet_factory(
			"local",
			swap_wallet::implementations::local::create_local_wallet,
		)
		.with_wallet_factory(
			"simulated",
			swap_wallet::implementations::simulated::create_simulated_wallet,
		)
		.with_quote_factory(
			"http",
			swap_quote::implementations::http::create_http_quote_source,
		)
		.with_backend_factory(
			"http",
			swap_settlement::implementations::http::create_http_backend,
		)
		.with_receipt_factory(
			"jsonrpc",
			swap_receipt::implementations::database::create_database_source,
		)
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Parent token for receipt resolution; cancelling it stops every watcher.
	pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
		self.shutdown = shutdown;
		self
	}

	pub fn with_wallet_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Arc<dyn WalletInterface>, WalletError> + Send + 'static,
	{
		self.wallet_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_quote_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Arc<dyn QuoteInterface>, QuoteError> + Send + 'static,
	{
		self.quote_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_backend_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Arc<dyn ExecutionBackend>, BackendError> + Send + 'static,
	{
		self.backend_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_receipt_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Arc<dyn ReceiptSource>, ReceiptError> + Send + 'static,
	{
		self.receipt_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn build(self) -> Result<SwapEngine, EngineError> {
		let config = self.config;
		let chain_id = config.network.chain_id;
		let tokens = config.token_registry();
		let classifier = RouteClassifier::new(
			config.network.native_symbol.clone(),
			config.network.wrapped_native.clone(),
		);

		// Wallet
		let wallet_factory = lookup(&self.wallet_factories, "wallet", &config.wallet.implementation)?;
		let wallet = wallet_factory(&wallet_settings(&config))?;
		let wallets = Arc::new(WalletResolver::fixed(wallet));

		// Quotes and slippage
		let quote_factory = lookup(
			&self.quote_factories,
			"quote source",
			&config.quote.source.implementation,
		)?;
		let quotes = QuoteStore::new(
			quote_factory(&config.quote.source.as_value())?,
			classifier.clone(),
			quote_settings(&config.quote),
			self.clock.clone(),
		);
		let slippage = SlippageCalculator::new(
			config.slippage.default_percent,
			config.slippage.max_percent,
			config.slippage.stable_symbols.clone(),
		)?;

		// Intents
		let nonces: Arc<dyn NonceSource> = match config.intent.nonce_source {
			NonceSourceKind::Contract => Arc::new(ContractNonceSource::new()),
			NonceSourceKind::Timestamp => Arc::new(TimestampNonceSource::new(self.clock.clone())),
		};
		let intents = Arc::new(IntentBuilder::new(
			intent_settings(&config.intent, slippage.max_percent())?,
			nonces,
			self.clock.clone(),
		));
		let contract = config.intent.deployment(chain_id).map(SettlementContract::new);

		// Settlement
		let fallback = fallback_strategy(&config.settlement.fallback);
		let backend_factory = lookup(
			&self.backend_factories,
			"execution backend",
			&config.settlement.backend.implementation,
		)?;
		let router = Arc::new(SettlementRouter::new(
			wallets.clone(),
			classifier.clone(),
			intents,
			backend_factory(&config.settlement.backend.as_value())?,
			fallback.clone(),
			self.clock.clone(),
		));

		// Receipts
		let receipt = &config.receipt;
		let mut watchers = vec![Watcher::new(
			Arc::new(WalletReceiptSource::new(wallets.clone())),
			Duration::from_millis(receipt.rpc_poll_interval_ms),
			receipt.rpc_max_attempts,
		)];
		if let Some(database) = &receipt.database {
			let factory = lookup(&self.receipt_factories, "receipt source", &database.implementation)?;
			watchers.push(Watcher::new(
				factory(&database.as_value())?,
				Duration::from_millis(receipt.db_poll_interval_ms),
				receipt.db_max_attempts,
			));
		}
		let receipt_sources = watchers.len();
		let mut resolver = ReceiptResolver::new(watchers, self.shutdown);
		match (&receipt.event, contract) {
			(Some(event), _) => {
				let emitter = event
					.contract
					.or_else(|| contract.map(|c| c.address()))
					.ok_or_else(|| {
						EngineError::Configuration(
							"receipt.event.contract is required without a settlement deployment"
								.to_string(),
						)
					})?;
				resolver =
					resolver.with_filter(EventFilter::new(emitter, &event.signature, event.topic_index));
			}
			// intentId of IntentSettled
			(None, Some(contract)) => {
				resolver = resolver.with_filter(EventFilter::with_topic0(
					contract.address(),
					intent_settled_signature(),
					1,
				));
			}
			(None, None) => {}
		}

		info!(
			chain_id,
			wallet = %config.wallet.implementation,
			receipt_sources,
			fallback = fallback.is_enabled(),
			"Swap engine built"
		);

		Ok(SwapEngine {
			event_bus: EventBus::new(config.engine.event_capacity),
			tokens,
			classifier,
			wallets,
			quotes,
			slippage,
			router,
			resolver,
			contract,
			config,
		})
	}
}

fn lookup<'a, T>(
	factories: &'a HashMap<String, T>,
	kind: &str,
	name: &str,
) -> Result<&'a T, EngineError> {
	factories
		.get(name)
		.ok_or_else(|| EngineError::Configuration(format!("Unknown {} implementation: {}", kind, name)))
}

/// The wallet table, with chain id and RPC URL taken from `[network]` unless
/// the wallet overrides them.
fn wallet_settings(config: &SwapConfig) -> toml::Value {
	let mut table = config.wallet.config.clone();
	table
		.entry("chain_id")
		.or_insert_with(|| toml::Value::Integer(config.network.chain_id as i64));
	table
		.entry("rpc_url")
		.or_insert_with(|| toml::Value::String(config.network.rpc_url.clone()));
	toml::Value::Table(table)
}

fn quote_settings(config: &QuoteConfig) -> QuoteSettings {
	QuoteSettings {
		ttl: config.ttl(),
		refetch_threshold: Duration::from_secs(config.refetch_threshold_seconds),
		tick: config.tick(),
		reverse_debounce: config.reverse_debounce(),
	}
}

fn intent_settings(config: &IntentConfig, max_slippage: Decimal) -> Result<IntentSettings, EngineError> {
	let minutes = |name: &str, value: u64| {
		u32::try_from(value)
			.map_err(|_| EngineError::Configuration(format!("intent.{} is out of range", name)))
	};
	Ok(IntentSettings {
		domain_name: config.domain_name.clone(),
		domain_version: config.domain_version.clone(),
		min_deadline_minutes: minutes("min_deadline_minutes", config.min_deadline_minutes)?,
		max_deadline_minutes: minutes("max_deadline_minutes", config.max_deadline_minutes)?,
		default_deadline_minutes: minutes("default_deadline_minutes", config.default_deadline_minutes)?,
		max_slippage_percent: max_slippage,
		deployments: config.deployments.clone(),
	})
}

fn fallback_strategy(config: &FallbackConfig) -> FallbackStrategy {
	if !config.enabled {
		return FallbackStrategy::disabled();
	}
	FallbackStrategy::enabled(
		config.delays_ms.iter().copied().map(Duration::from_millis).collect(),
		config.notice.clone(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;
	use swap_config::ConfigLoader;
	use swap_quote::QuoteStatus;
	use swap_settlement::SwapRequest;
	use swap_types::{Quote, SettlementHash, SettlementPath, SettlementStatus};
	use swap_wallet::implementations::simulated::SimulatedWallet;
	use tokio::sync::broadcast;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const CHAIN: u64 = 11155111;
	const SETTLEMENT: &str = "0x1111111111111111111111111111111111111111";

	fn config(quote_api: &str, backend: &str, deployments: bool) -> SwapConfig {
		let deployments = if deployments {
			format!("[intent.deployments]\n{} = \"{}\"\n", CHAIN, SETTLEMENT)
		} else {
			String::new()
		};
		let toml = format!(
			r#"
[network]
chain_id = {chain}
rpc_url = "http://127.0.0.1:8545"

[network.wrapped_native]
address = "0xfFf9976782d46CC05630D1f6eBAb18b2324d6B14"
symbol = "WETH"
decimals = 18
name = "Wrapped Ether"

[[tokens]]
address = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"
symbol = "USDC"
decimals = 6
name = "USD Coin"

[wallet]
implementation = "simulated"

[quote.source]
implementation = "http"
api_url = "{quote_api}"

[intent]
nonce_source = "timestamp"

{deployments}
[settlement.backend]
implementation = "http"
url = "{backend}"
timeout_ms = 500

[receipt]
rpc_poll_interval_ms = 50
rpc_max_attempts = 5
"#,
			chain = CHAIN,
			quote_api = quote_api,
			backend = backend,
			deployments = deployments,
		);
		ConfigLoader::new()
			.with_env_prefix("FASTSWAP_CORE_TEST_")
			.load_str(&toml)
			.unwrap()
	}

	fn engine_with(config: SwapConfig, wallet: Arc<SimulatedWallet>) -> SwapEngine {
		SwapEngineBuilder::new(config)
			.with_wallet_factory("simulated", move |_| {
				let wallet: Arc<dyn WalletInterface> = wallet.clone();
				Ok(wallet)
			})
			.build()
			.unwrap()
	}

	fn drain(events: &mut broadcast::Receiver<SwapEvent>) -> Vec<SwapEvent> {
		let mut out = Vec::new();
		while let Ok(event) = events.try_recv() {
			out.push(event);
		}
		out
	}

	fn usdc(engine: &SwapEngine) -> Token {
		engine.tokens().by_symbol("USDC").unwrap().clone()
	}

	fn priced_request(engine: &SwapEngine) -> SwapRequest {
		let weth = engine.tokens().wrapped_native().clone();
		SwapRequest {
			token_in: Some(usdc(engine)),
			token_out: Some(weth),
			amount: "100".to_string(),
			quote: Some(Quote {
				amount_in: U256::from(100_000_000u64),
				amount_out: U256::from(50_000_000_000_000_000u64),
				exchange_rate: 0.0005,
				price_impact: 0.02,
				min_out: U256::ZERO,
				fee: 500,
				gas_estimate: 150_000,
				fetched_at: SystemClock.now(),
			}),
			slippage_percent: Decimal::from_str("0.5").unwrap(),
			deadline_minutes: Some(20),
		}
	}

	#[test]
	fn test_unknown_implementation_is_rejected() {
		let mut config = config("http://127.0.0.1:1", "http://127.0.0.1:1", true);
		config.wallet.implementation = "hardware".to_string();
		let err = SwapEngineBuilder::new(config).build().err().unwrap();
		assert!(matches!(err, EngineError::Configuration(_)));
	}

	#[test]
	fn test_wallet_settings_inherit_network() {
		let config = config("http://127.0.0.1:1", "http://127.0.0.1:1", true);
		let settings = wallet_settings(&config);
		assert_eq!(settings["chain_id"].as_integer(), Some(CHAIN as i64));
		assert_eq!(settings["rpc_url"].as_str(), Some("http://127.0.0.1:8545"));
		assert!(SwapEngineBuilder::new(config).build().is_ok());
	}

	#[tokio::test]
	async fn test_wrap_swap_publishes_events_and_confirms() {
		let wallet = Arc::new(SimulatedWallet::random(CHAIN));
		let engine = engine_with(
			config("http://127.0.0.1:1", "http://127.0.0.1:1", true),
			wallet.clone(),
		);
		let mut events = engine.event_bus().subscribe();

		let request = SwapRequest {
			token_in: Some(engine.tokens().native().clone()),
			token_out: Some(engine.tokens().wrapped_native().clone()),
			amount: "1".to_string(),
			quote: None,
			slippage_percent: Decimal::from_str("0.5").unwrap(),
			deadline_minutes: None,
		};
		let attempt = engine.swap(request).await.unwrap();
		assert_eq!(attempt.path, Some(SettlementPath::Wrap));
		assert_eq!(
			wallet.sent_transactions()[0].value,
			U256::from(1_000_000_000_000_000_000u128)
		);

		let confirmation = engine.wait_for_receipt(&attempt).await.unwrap().unwrap();
		assert_eq!(confirmation.source, "rpc");
		assert!(confirmation.receipt.success);
		assert_eq!(engine.router().current().confirmation, Some(confirmation));

		let events = drain(&mut events);
		assert!(matches!(
			events.first(),
			Some(SwapEvent::Settlement(SettlementEvent::Started {
				path: SettlementPath::Wrap,
				route: Route::Wrap,
				..
			}))
		));
		assert!(events.iter().any(|e| matches!(
			e,
			SwapEvent::Settlement(SettlementEvent::StatusChanged {
				status: SettlementStatus::Success,
				..
			})
		)));
		assert!(events
			.iter()
			.any(|e| matches!(e, SwapEvent::Settlement(SettlementEvent::Submitted { .. }))));
		assert!(events
			.iter()
			.any(|e| matches!(e, SwapEvent::Receipt(ReceiptEvent::Confirmed { .. }))));

		assert!(engine.take_notification().is_some());
		assert!(engine.reset());
	}

	#[tokio::test]
	async fn test_reverted_receipt_fails_attempt() {
		let wallet = Arc::new(SimulatedWallet::random(CHAIN));
		wallet.set_reverting(true);
		let engine = engine_with(
			config("http://127.0.0.1:1", "http://127.0.0.1:1", true),
			wallet.clone(),
		);
		let mut events = engine.event_bus().subscribe();

		let request = SwapRequest {
			token_in: Some(engine.tokens().native().clone()),
			token_out: Some(engine.tokens().wrapped_native().clone()),
			amount: "1".to_string(),
			quote: None,
			slippage_percent: Decimal::from_str("0.5").unwrap(),
			deadline_minutes: None,
		};
		let attempt = engine.swap(request).await.unwrap();
		assert_eq!(attempt.status, SettlementStatus::Success);
		assert!(engine.take_notification().is_some());

		let err = engine.wait_for_receipt(&attempt).await.unwrap_err();
		assert!(matches!(
			err,
			EngineError::Settlement(SettlementError::SettlementFailed(_))
		));

		let current = engine.router().current();
		assert_eq!(current.status, SettlementStatus::Error);
		assert_eq!(
			current.error.map(|e| e.kind),
			Some(FailureKind::SettlementFailed)
		);
		assert!(current.confirmation.is_some_and(|c| !c.receipt.success));
		assert_eq!(
			engine.take_notification().map(|n| n.status),
			Some(SettlementStatus::Error)
		);
		assert!(drain(&mut events).iter().any(|e| matches!(
			e,
			SwapEvent::Settlement(SettlementEvent::Failed {
				kind: FailureKind::SettlementFailed,
				..
			})
		)));
	}

	#[tokio::test]
	async fn test_permit_swap_relays_signed_intent() {
		let backend = MockServer::start().await;
		let tx_hash = TxHash::repeat_byte(0xab);
		Mock::given(method("POST"))
			.and(path("/fastswap"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"txHash": tx_hash,
				"status": "submitted"
			})))
			.expect(1)
			.mount(&backend)
			.await;

		let wallet = Arc::new(SimulatedWallet::random(CHAIN));
		let engine = engine_with(config("http://127.0.0.1:1", &backend.uri(), true), wallet.clone());

		let attempt = engine.swap(priced_request(&engine)).await.unwrap();
		assert_eq!(attempt.hash, Some(SettlementHash::OnChain(tx_hash)));
		assert_eq!(wallet.signed_payloads().len(), 1);
		assert_eq!(
			wallet.signed_payloads()[0].verifying_contract,
			Address::from_str(SETTLEMENT).unwrap()
		);
	}

	#[tokio::test]
	async fn test_backend_down_publishes_failure() {
		let wallet = Arc::new(SimulatedWallet::random(CHAIN));
		let engine = engine_with(
			config("http://127.0.0.1:1", "http://127.0.0.1:1", true),
			wallet,
		);
		let mut events = engine.event_bus().subscribe();

		let err = engine.swap(priced_request(&engine)).await.unwrap_err();
		assert!(matches!(
			err,
			EngineError::Settlement(SettlementError::BackendUnavailable(_))
		));
		assert!(drain(&mut events).iter().any(|e| matches!(
			e,
			SwapEvent::Settlement(SettlementEvent::Failed {
				kind: FailureKind::BackendUnavailable,
				..
			})
		)));
	}

	#[tokio::test]
	async fn test_invalid_input_publishes_nothing() {
		let wallet = Arc::new(SimulatedWallet::random(CHAIN));
		let engine = engine_with(
			config("http://127.0.0.1:1", "http://127.0.0.1:1", true),
			wallet,
		);
		let mut events = engine.event_bus().subscribe();

		let mut request = priced_request(&engine);
		request.slippage_percent = Decimal::from(150);
		let err = engine.swap(request).await.unwrap_err();
		assert!(matches!(err, EngineError::Settlement(SettlementError::InvalidInput(_))));
		assert!(drain(&mut events).is_empty());
	}

	#[tokio::test]
	async fn test_cancel_intent_needs_deployment() {
		let wallet = Arc::new(SimulatedWallet::random(CHAIN));
		let engine = engine_with(
			config("http://127.0.0.1:1", "http://127.0.0.1:1", false),
			wallet.clone(),
		);
		let intent = Intent {
			maker: wallet.address().await.unwrap(),
			recipient: wallet.address().await.unwrap(),
			token_in: usdc(&engine).address,
			token_out: engine.tokens().wrapped_native().address,
			amount_in: U256::from(1u64),
			min_out: U256::from(1u64),
			deadline: 1,
			nonce: U256::from(1u64),
			ref_id: swap_types::B256::ZERO,
		};
		assert!(matches!(
			engine.cancel_intent(&intent).await,
			Err(EngineError::UnsupportedChain(CHAIN))
		));

		let engine = engine_with(
			config("http://127.0.0.1:1", "http://127.0.0.1:1", true),
			wallet.clone(),
		);
		engine.cancel_intent(&intent).await.unwrap();
		let sent = wallet.sent_transactions();
		assert_eq!(sent.last().unwrap().to, Address::from_str(SETTLEMENT).unwrap());
	}

	#[tokio::test]
	async fn test_quote_observation() {
		let quotes = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/quote"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"amountOut": "50000000000000000",
				"exchangeRate": 0.0005,
				"priceImpact": 0.02,
				"fee": 500,
				"gasEstimate": 150000
			})))
			.mount(&quotes)
			.await;

		let wallet = Arc::new(SimulatedWallet::random(CHAIN));
		let engine = engine_with(config(&quotes.uri(), "http://127.0.0.1:1", true), wallet);
		let weth = engine.tokens().wrapped_native().clone();
		let mut handle = engine.observe_quote(QuoteInput::new(usdc(&engine), weth, "100"));

		let view = loop {
			let view = handle.changed().await.unwrap();
			if view.status == QuoteStatus::Ready {
				break view;
			}
		};
		let quote = view.quote.unwrap();
		assert_eq!(quote.quote().amount_out, U256::from(50_000_000_000_000_000u64));
	}

	#[tokio::test]
	async fn test_manual_slippage_passthrough() {
		let wallet = Arc::new(SimulatedWallet::random(CHAIN));
		let engine = engine_with(
			config("http://127.0.0.1:1", "http://127.0.0.1:1", true),
			wallet,
		);
		let weth = engine.tokens().wrapped_native().clone();
		let percent = engine
			.effective_slippage(
				SlippageMode::Manual(Decimal::from(1)),
				&usdc(&engine),
				&weth,
				U256::from(100_000_000u64),
			)
			.await
			.unwrap();
		assert_eq!(percent, Decimal::from(1));

		let auto = engine
			.effective_slippage(SlippageMode::Auto, &usdc(&engine), &weth, U256::from(100_000_000u64))
			.await
			.unwrap();
		assert!(auto > Decimal::ZERO && auto <= engine.slippage().max_percent());
	}
}
