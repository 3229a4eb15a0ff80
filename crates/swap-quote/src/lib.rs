//! Quoting for the swap engine.
//!
//! This crate holds the quote source abstraction, route classification,
//! slippage derivation and the [`QuoteStore`] that keeps a displayed quote
//! fresh for an observed pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use swap_types::{Address, ConfigSchema, Quote, U256};
use thiserror::Error;

pub mod implementations {
	pub mod http;
}

pub mod route;
pub mod slippage;
pub mod store;

pub use route::RouteClassifier;
pub use slippage::{SlippageCalculator, SlippageContext, SlippageMode};
pub use store::{
	PairKey, QuoteCache, QuoteHandle, QuoteInput, QuoteSettings, QuoteState, QuoteStatus,
	QuoteStore, QuoteView,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuoteError {
	/// Local pre-flight failure; never reaches the network.
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	/// The quote API has no route for the pair.
	#[error("No liquidity found for this pair")]
	NoLiquidity,
	#[error("Network error: {0}")]
	Network(String),
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeType {
	#[default]
	ExactIn,
	ExactOut,
}

impl TradeType {
	pub fn as_str(&self) -> &'static str {
		match self {
			TradeType::ExactIn => "exactIn",
			TradeType::ExactOut => "exactOut",
		}
	}
}

/// Parameters sent to a quote source. Token addresses are pricing addresses,
/// so the native asset appears as its wrapped token.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
	pub token_in: Address,
	pub token_out: Address,
	pub amount_in: U256,
	pub slippage_percent: Decimal,
	pub trade_type: TradeType,
	/// Issue time on the caller's clock; becomes the quote's `fetched_at`.
	pub requested_at: DateTime<Utc>,
}

/// A source of price quotes.
#[async_trait]
pub trait QuoteInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	async fn fetch_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError>;
}

/// Builds a quote source from its implementation name and settings table.
pub fn create_quote_source(
	implementation: &str,
	config: &toml::Value,
) -> Result<Arc<dyn QuoteInterface>, QuoteError> {
	match implementation {
		"http" => implementations::http::create_http_quote_source(config),
		other => Err(QuoteError::Configuration(format!(
			"Unknown quote source implementation: {}",
			other
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_create_quote_source() {
		let config: toml::Value = toml::from_str("api_url = \"http://127.0.0.1:3001\"").unwrap();
		assert!(create_quote_source("http", &config).is_ok());
		assert!(matches!(
			create_quote_source("grpc", &config),
			Err(QuoteError::Configuration(_))
		));
	}
}
