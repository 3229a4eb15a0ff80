//! Configuration loading for the swap engine.
//!
//! Reads a TOML file, substitutes `${VAR}` references from the environment,
//! applies `FASTSWAP_*` overrides and validates the result.

mod serde_helpers;
pub mod types;

pub use types::*;

use regex::Regex;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "FASTSWAP_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<SwapConfig, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		debug!(path = %file_path, "Read configuration file");
		self.load_str(&content)
	}

	/// Parses configuration from TOML text, running the same substitution,
	/// overrides and validation as [`ConfigLoader::load`].
	pub fn load_str(&self, content: &str) -> Result<SwapConfig, ConfigError> {
		let substituted = substitute_env_vars(content)?;

		let mut config: SwapConfig =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config);
		validate_config(&config)?;

		Ok(config)
	}

	fn apply_env_overrides(&self, config: &mut SwapConfig) {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.engine.log_level = log_level;
		}

		if let Ok(rpc_url) = env::var(format!("{}RPC_URL", self.env_prefix)) {
			config.network.rpc_url = rpc_url;
		}

		if let Ok(backend_url) = env::var(format!("{}BACKEND_URL", self.env_prefix)) {
			config.settlement.backend.config.insert(
				"url".to_string(),
				toml::Value::String(backend_url),
			);
		}
	}
}

/// Replaces every `${VAR_NAME}` with the value of that environment variable.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;

	let mut result = content.to_string();
	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

fn validate_config(config: &SwapConfig) -> Result<(), ConfigError> {
	let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

	if config.network.chain_id == 0 {
		return invalid("network.chain_id must be non-zero".to_string());
	}
	if config.network.wrapped_native.address.is_zero() {
		return invalid("network.wrapped_native.address must not be the zero address".to_string());
	}

	let quote = &config.quote;
	if quote.ttl_seconds == 0 || quote.tick_ms == 0 {
		return invalid("quote.ttl_seconds and quote.tick_ms must be positive".to_string());
	}
	if quote.refetch_threshold_seconds >= quote.ttl_seconds {
		return invalid(format!(
			"quote.refetch_threshold_seconds ({}) must be below quote.ttl_seconds ({})",
			quote.refetch_threshold_seconds, quote.ttl_seconds
		));
	}

	let slippage = &config.slippage;
	if !(0.0..=100.0).contains(&slippage.max_percent) {
		return invalid(format!(
			"slippage.max_percent must be within [0, 100], got {}",
			slippage.max_percent
		));
	}
	if !(0.0..=slippage.max_percent).contains(&slippage.default_percent) {
		return invalid(format!(
			"slippage.default_percent must be within [0, {}], got {}",
			slippage.max_percent, slippage.default_percent
		));
	}

	let intent = &config.intent;
	if intent.min_deadline_minutes == 0 || intent.min_deadline_minutes > intent.max_deadline_minutes {
		return invalid(format!(
			"intent deadline bounds [{}, {}] are invalid",
			intent.min_deadline_minutes, intent.max_deadline_minutes
		));
	}
	if !(intent.min_deadline_minutes..=intent.max_deadline_minutes)
		.contains(&intent.default_deadline_minutes)
	{
		return invalid(format!(
			"intent.default_deadline_minutes ({}) is outside the deadline bounds",
			intent.default_deadline_minutes
		));
	}
	if intent.deployment(config.network.chain_id).is_none() {
		warn!(
			chain_id = config.network.chain_id,
			"No settlement deployment configured; permit-path swaps will be rejected"
		);
	}

	if config.settlement.fallback.enabled {
		warn!("Fallback settlement strategy is enabled; backend outages will produce synthetic results");
	}

	let receipt = &config.receipt;
	if receipt.rpc_max_attempts == 0 || receipt.rpc_poll_interval_ms == 0 {
		return invalid("receipt RPC polling needs a positive interval and attempt budget".to_string());
	}
	if receipt.database.is_some() && (receipt.db_max_attempts == 0 || receipt.db_poll_interval_ms == 0)
	{
		return invalid("receipt database polling needs a positive interval and attempt budget".to_string());
	}

	for token in &config.tokens {
		if token.decimals > 77 {
			return invalid(format!("token {} has too many decimals", token.symbol));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const BASE: &str = r#"
[network]
chain_id = 11155111
rpc_url = "https://rpc.sepolia.example"

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
implementation = "local"
private_key = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"

[quote.source]
implementation = "http"
api_url = "https://quotes.example"

[intent.deployments]
11155111 = "0x1111111111111111111111111111111111111111"

[settlement.backend]
implementation = "http"
url = "https://backend.example"
"#;

	#[test]
	fn test_defaults_applied() {
		let config = ConfigLoader::new()
			.with_env_prefix("FASTSWAP_TEST_DEFAULTS_")
			.load_str(BASE)
			.unwrap();

		assert_eq!(config.quote.ttl_seconds, 15);
		assert_eq!(config.quote.refetch_threshold_seconds, 3);
		assert_eq!(config.quote.reverse_debounce_ms, 500);
		assert_eq!(config.slippage.default_percent, 0.5);
		assert_eq!(config.slippage.max_percent, 50.0);
		assert_eq!(config.intent.min_deadline_minutes, 1);
		assert_eq!(config.intent.max_deadline_minutes, 1440);
		assert_eq!(config.intent.domain_name, "FastSettlement");
		assert!(!config.settlement.fallback.enabled);
		assert_eq!(config.receipt.db_max_attempts, 30);
		assert_eq!(config.wallet.implementation, "local");
		assert!(config.wallet.config.contains_key("private_key"));
		assert!(config.intent.deployment(11155111).is_some());
		assert!(config.intent.deployment(1).is_none());

		let registry = config.token_registry();
		assert_eq!(registry.tokens().len(), 3);
		assert!(registry.native().is_native_sentinel());
	}

	#[test]
	fn test_zero_deployment_is_unknown() {
		let content = BASE.replace(
			"11155111 = \"0x1111111111111111111111111111111111111111\"",
			"11155111 = \"0x0000000000000000000000000000000000000000\"",
		);
		let config = ConfigLoader::new().load_str(&content).unwrap();
		assert!(config.intent.deployment(11155111).is_none());
	}

	#[test]
	fn test_env_substitution() {
		env::set_var("FASTSWAP_TEST_QUOTE_URL", "https://substituted.example");
		let content = BASE.replace("https://quotes.example", "${FASTSWAP_TEST_QUOTE_URL}");
		let config = ConfigLoader::new().load_str(&content).unwrap();
		assert_eq!(
			config.quote.source.config.get("api_url").and_then(|v| v.as_str()),
			Some("https://substituted.example")
		);

		let missing = BASE.replace("https://quotes.example", "${FASTSWAP_TEST_DOES_NOT_EXIST}");
		assert!(matches!(
			ConfigLoader::new().load_str(&missing),
			Err(ConfigError::EnvVarNotFound(var)) if var == "FASTSWAP_TEST_DOES_NOT_EXIST"
		));
	}

	#[test]
	fn test_env_overrides() {
		env::set_var("FASTSWAP_OVR_RPC_URL", "https://override.example");
		env::set_var("FASTSWAP_OVR_LOG_LEVEL", "debug");
		let config = ConfigLoader::new()
			.with_env_prefix("FASTSWAP_OVR_")
			.load_str(BASE)
			.unwrap();
		assert_eq!(config.network.rpc_url, "https://override.example");
		assert_eq!(config.engine.log_level, "debug");
	}

	#[test]
	fn test_validation_rejects_bad_bounds() {
		let bad_slippage = format!("{}\n[slippage]\ndefault_percent = 60.0\n", BASE);
		assert!(matches!(
			ConfigLoader::new().load_str(&bad_slippage),
			Err(ConfigError::ValidationError(_))
		));

		let bad_deadline = BASE.replace(
			"[intent.deployments]",
			"[intent]\nmin_deadline_minutes = 10\nmax_deadline_minutes = 5\n\n[intent.deployments]",
		);
		assert!(matches!(
			ConfigLoader::new().load_str(&bad_deadline),
			Err(ConfigError::ValidationError(_))
		));

		let bad_threshold = BASE.replace(
			"[quote.source]",
			"[quote]\nttl_seconds = 3\nrefetch_threshold_seconds = 3\n\n[quote.source]",
		);
		assert!(matches!(
			ConfigLoader::new().load_str(&bad_threshold),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(BASE.as_bytes()).unwrap();

		let config = ConfigLoader::new()
			.with_file(file.path())
			.load()
			.await
			.unwrap();
		assert_eq!(config.network.chain_id, 11155111);

		let missing = ConfigLoader::new()
			.with_file("/definitely/not/here.toml")
			.load()
			.await;
		assert!(matches!(missing, Err(ConfigError::FileNotFound(_))));
	}
}
