//! Configuration types for the swap engine.

use crate::serde_helpers::{deserialize_chain_id_map, serialize_chain_id_map};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use swap_types::{Address, ChainId, Token, TokenRegistry};

/// Complete engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwapConfig {
	#[serde(default)]
	pub engine: EngineSettings,
	pub network: NetworkConfig,
	/// Tradable tokens besides the native and wrapped-native ones
	#[serde(default)]
	pub tokens: Vec<Token>,
	pub wallet: ImplementationConfig,
	pub quote: QuoteConfig,
	#[serde(default)]
	pub slippage: SlippageConfig,
	#[serde(default)]
	pub intent: IntentConfig,
	pub settlement: SettlementConfig,
	#[serde(default)]
	pub receipt: ReceiptConfig,
}

impl SwapConfig {
	pub fn token_registry(&self) -> TokenRegistry {
		TokenRegistry::new(
			Token::native(&self.network.native_symbol, &self.network.native_name),
			self.network.wrapped_native.clone(),
			self.tokens.clone(),
		)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// Capacity of the event bus channel
	#[serde(default = "default_event_capacity")]
	pub event_capacity: usize,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			log_level: default_log_level(),
			event_capacity: default_event_capacity(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub chain_id: ChainId,
	pub rpc_url: String,
	#[serde(default = "default_native_symbol")]
	pub native_symbol: String,
	#[serde(default = "default_native_name")]
	pub native_name: String,
	/// Canonical wrapped-native token (WETH)
	pub wrapped_native: Token,
}

/// Selects an implementation by name and carries its own settings, which the
/// implementation's factory validates against its schema.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImplementationConfig {
	pub implementation: String,
	#[serde(flatten)]
	pub config: toml::Table,
}

impl ImplementationConfig {
	pub fn as_value(&self) -> toml::Value {
		toml::Value::Table(self.config.clone())
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoteConfig {
	/// How long a quote stays live after it was fetched
	#[serde(default = "default_quote_ttl")]
	pub ttl_seconds: u64,
	/// Remaining seconds at which a single early refetch is issued
	#[serde(default = "default_refetch_threshold")]
	pub refetch_threshold_seconds: u64,
	#[serde(default = "default_tick_ms")]
	pub tick_ms: u64,
	/// Reverse requests closer together than this are ignored
	#[serde(default = "default_reverse_debounce_ms")]
	pub reverse_debounce_ms: u64,
	pub source: ImplementationConfig,
}

impl QuoteConfig {
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_seconds)
	}

	pub fn tick(&self) -> Duration {
		Duration::from_millis(self.tick_ms)
	}

	pub fn reverse_debounce(&self) -> Duration {
		Duration::from_millis(self.reverse_debounce_ms)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlippageConfig {
	/// Manual slippage used when none is given, in percent
	#[serde(default = "default_slippage_percent")]
	pub default_percent: f64,
	/// Upper bound for any slippage, in percent
	#[serde(default = "default_max_slippage_percent")]
	pub max_percent: f64,
	/// Derive slippage from trade size and gas price instead of the manual value
	#[serde(default)]
	pub auto: bool,
	/// Pairs made only of these symbols get the tighter stable-pair base
	#[serde(default = "default_stable_symbols")]
	pub stable_symbols: Vec<String>,
}

impl Default for SlippageConfig {
	fn default() -> Self {
		Self {
			default_percent: default_slippage_percent(),
			max_percent: default_max_slippage_percent(),
			auto: false,
			stable_symbols: default_stable_symbols(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NonceSourceKind {
	/// `getMinNonce`/`isNonceUsed` on the settlement contract
	#[default]
	Contract,
	/// Monotonic millisecond timestamp, for non-adversarial testing only
	Timestamp,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntentConfig {
	#[serde(default = "default_domain_name")]
	pub domain_name: String,
	#[serde(default = "default_domain_version")]
	pub domain_version: String,
	#[serde(default = "default_min_deadline")]
	pub min_deadline_minutes: u64,
	#[serde(default = "default_max_deadline")]
	pub max_deadline_minutes: u64,
	#[serde(default = "default_deadline")]
	pub default_deadline_minutes: u64,
	#[serde(default)]
	pub nonce_source: NonceSourceKind,
	/// Settlement contract per chain id
	#[serde(
		default,
		deserialize_with = "deserialize_chain_id_map",
		serialize_with = "serialize_chain_id_map"
	)]
	pub deployments: HashMap<ChainId, Address>,
}

impl Default for IntentConfig {
	fn default() -> Self {
		Self {
			domain_name: default_domain_name(),
			domain_version: default_domain_version(),
			min_deadline_minutes: default_min_deadline(),
			max_deadline_minutes: default_max_deadline(),
			default_deadline_minutes: default_deadline(),
			nonce_source: NonceSourceKind::default(),
			deployments: HashMap::new(),
		}
	}
}

impl IntentConfig {
	/// The settlement contract for `chain_id`, ignoring placeholder zero addresses.
	pub fn deployment(&self, chain_id: ChainId) -> Option<Address> {
		self.deployments
			.get(&chain_id)
			.copied()
			.filter(|address| !address.is_zero())
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettlementConfig {
	pub backend: ImplementationConfig,
	#[serde(default)]
	pub fallback: FallbackConfig,
}

/// Synthetic settlement used when the execution backend is down. Only for
/// exercising the signing flow end to end; off unless enabled here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_fallback_delays")]
	pub delays_ms: Vec<u64>,
	#[serde(default = "default_fallback_notice")]
	pub notice: String,
}

impl Default for FallbackConfig {
	fn default() -> Self {
		Self {
			enabled: false,
			delays_ms: default_fallback_delays(),
			notice: default_fallback_notice(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiptConfig {
	#[serde(default = "default_poll_interval_ms")]
	pub rpc_poll_interval_ms: u64,
	#[serde(default = "default_rpc_max_attempts")]
	pub rpc_max_attempts: u32,
	/// Out-of-band receipt database, raced against the wallet RPC
	#[serde(default)]
	pub database: Option<ImplementationConfig>,
	#[serde(default = "default_poll_interval_ms")]
	pub db_poll_interval_ms: u64,
	#[serde(default = "default_db_max_attempts")]
	pub db_max_attempts: u32,
	/// Event whose indexed value is extracted from the winning receipt
	#[serde(default)]
	pub event: Option<EventFilterConfig>,
}

impl Default for ReceiptConfig {
	fn default() -> Self {
		Self {
			rpc_poll_interval_ms: default_poll_interval_ms(),
			rpc_max_attempts: default_rpc_max_attempts(),
			database: None,
			db_poll_interval_ms: default_poll_interval_ms(),
			db_max_attempts: default_db_max_attempts(),
			event: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventFilterConfig {
	/// Emitting contract; defaults to the chain's settlement deployment
	pub contract: Option<Address>,
	/// Canonical event signature, e.g. `Transfer(address,address,uint256)`
	pub signature: String,
	/// Topic index of the value to extract (topic 0 is the signature hash)
	pub topic_index: usize,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_event_capacity() -> usize {
	256
}

fn default_native_symbol() -> String {
	"ETH".to_string()
}

fn default_native_name() -> String {
	"Ether".to_string()
}

fn default_quote_ttl() -> u64 {
	15
}

fn default_refetch_threshold() -> u64 {
	3
}

fn default_tick_ms() -> u64 {
	1000
}

fn default_reverse_debounce_ms() -> u64 {
	500
}

fn default_slippage_percent() -> f64 {
	0.5
}

fn default_max_slippage_percent() -> f64 {
	50.0
}

fn default_stable_symbols() -> Vec<String> {
	vec!["USDC".to_string(), "USDT".to_string(), "DAI".to_string()]
}

fn default_domain_name() -> String {
	"FastSettlement".to_string()
}

fn default_domain_version() -> String {
	"2.1".to_string()
}

fn default_min_deadline() -> u64 {
	1
}

fn default_max_deadline() -> u64 {
	1440
}

fn default_deadline() -> u64 {
	30
}

fn default_fallback_delays() -> Vec<u64> {
	vec![1000, 1500]
}

fn default_fallback_notice() -> String {
	"fallback settlement: execution backend unavailable, nothing was broadcast".to_string()
}

fn default_poll_interval_ms() -> u64 {
	1000
}

fn default_rpc_max_attempts() -> u32 {
	120
}

fn default_db_max_attempts() -> u32 {
	30
}
