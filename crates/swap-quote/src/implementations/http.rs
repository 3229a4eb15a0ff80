//! Quote source backed by the REST quote API.
//!
//! `GET {api_url}/quote?tokenIn&tokenOut&amountIn&slippage&tradeType` returns
//! a JSON quote. A 404, an `error` mentioning liquidity or a zero output all
//! mean the pair has no route.

use crate::{QuoteError, QuoteInterface, QuoteRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use swap_types::{
	apply_slippage_bps, percent_to_bps, ConfigSchema, Field, FieldType, Quote, Schema,
	ValidationError, U256,
};
use tracing::debug;

const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
	amount_out: Option<String>,
	#[serde(default)]
	exchange_rate: f64,
	#[serde(default)]
	price_impact: f64,
	min_out: Option<String>,
	#[serde(default)]
	fee: u32,
	#[serde(default)]
	gas_estimate: u64,
	error: Option<String>,
}

fn parse_u256(field: &str, value: &str) -> Result<U256, QuoteError> {
	value
		.parse::<U256>()
		.map_err(|e| QuoteError::InvalidResponse(format!("{}: {}", field, e)))
}

pub struct HttpQuoteSource {
	client: reqwest::Client,
	api_url: String,
}

impl HttpQuoteSource {
	pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, QuoteError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| QuoteError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			api_url: api_url.into().trim_end_matches('/').to_string(),
		})
	}

	fn into_quote(request: &QuoteRequest, body: QuoteResponse) -> Result<Quote, QuoteError> {
		if let Some(error) = body.error {
			return Err(if error.to_lowercase().contains("liquidity") {
				QuoteError::NoLiquidity
			} else {
				QuoteError::InvalidResponse(error)
			});
		}

		let amount_out = body
			.amount_out
			.as_deref()
			.ok_or_else(|| QuoteError::InvalidResponse("missing amountOut".to_string()))
			.and_then(|v| parse_u256("amountOut", v))?;
		if amount_out.is_zero() {
			return Err(QuoteError::NoLiquidity);
		}

		let min_out = match body.min_out.as_deref() {
			Some(v) => parse_u256("minOut", v)?,
			None => {
				let bps = percent_to_bps(request.slippage_percent)
					.map_err(|e| QuoteError::InvalidInput(e.to_string()))?;
				apply_slippage_bps(amount_out, bps)
					.map_err(|e| QuoteError::InvalidResponse(e.to_string()))?
			}
		};

		Ok(Quote {
			amount_in: request.amount_in,
			amount_out,
			exchange_rate: body.exchange_rate,
			price_impact: body.price_impact,
			min_out,
			fee: body.fee,
			gas_estimate: body.gas_estimate,
			fetched_at: request.requested_at,
		})
	}
}

/// Configuration schema for HttpQuoteSource.
pub struct HttpQuoteSchema;

impl ConfigSchema for HttpQuoteSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("api_url", FieldType::Url)],
			vec![Field::new(
				"timeout_ms",
				FieldType::Integer {
					min: Some(1),
					max: Some(60_000),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl QuoteInterface for HttpQuoteSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpQuoteSchema)
	}

	async fn fetch_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
		let url = format!("{}/quote", self.api_url);
		debug!(token_in = %request.token_in, token_out = %request.token_out, amount_in = %request.amount_in, "Fetching quote");

		let response = self
			.client
			.get(&url)
			.query(&[
				("tokenIn", request.token_in.to_string()),
				("tokenOut", request.token_out.to_string()),
				("amountIn", request.amount_in.to_string()),
				("slippage", request.slippage_percent.to_string()),
				("tradeType", request.trade_type.as_str().to_string()),
			])
			.send()
			.await
			.map_err(|e| QuoteError::Network(e.to_string()))?;

		let status = response.status();
		if status == reqwest::StatusCode::NOT_FOUND {
			return Err(QuoteError::NoLiquidity);
		}
		if !status.is_success() {
			// error bodies may still carry a liquidity hint
			let text = response.text().await.unwrap_or_default();
			if text.to_lowercase().contains("liquidity") {
				return Err(QuoteError::NoLiquidity);
			}
			return Err(QuoteError::Network(format!("Quote API returned {}", status)));
		}

		let body: QuoteResponse = response
			.json()
			.await
			.map_err(|e| QuoteError::InvalidResponse(e.to_string()))?;
		Self::into_quote(request, body)
	}
}

/// Factory function to create an HTTP quote source from configuration.
///
/// Configuration parameters:
/// - `api_url`: Base URL of the quote API (required)
/// - `timeout_ms`: Request timeout in milliseconds (default 5000)
pub fn create_http_quote_source(
	config: &toml::Value,
) -> Result<Arc<dyn QuoteInterface>, QuoteError> {
	HttpQuoteSchema
		.validate(config)
		.map_err(|e| QuoteError::Configuration(e.to_string()))?;

	let api_url = config
		.get("api_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| QuoteError::Configuration("api_url is required".to_string()))?;
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	Ok(Arc::new(HttpQuoteSource::new(
		api_url,
		Duration::from_millis(timeout_ms),
	)?))
}
