//! Receipts from an out-of-band database exposing `eth_getTransactionReceipt`
//! over JSON-RPC.
//!
//! A receipt only counts once the database has recorded its `status`.

use crate::{ReceiptError, ReceiptSource};
use alloy::primitives::U64;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use swap_types::{
	ConfigSchema, Field, FieldType, Receipt, ReceiptLog, Schema, TxHash, ValidationError,
};
use tracing::debug;

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Deserialize)]
struct RpcResponse {
	result: Option<RpcReceipt>,
	error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
	code: i64,
	message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
	transaction_hash: TxHash,
	block_number: Option<U64>,
	status: Option<String>,
	#[serde(default)]
	logs: Vec<ReceiptLog>,
}

impl RpcReceipt {
	fn into_receipt(self) -> Option<Receipt> {
		let status = self.status?;
		Some(Receipt {
			transaction_hash: self.transaction_hash,
			block_number: self.block_number.map(|n| n.to::<u64>()),
			success: status == "0x1",
			logs: self.logs,
		})
	}
}

pub struct DatabaseReceiptSource {
	client: reqwest::Client,
	url: String,
}

impl DatabaseReceiptSource {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ReceiptError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ReceiptError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url: url.into(),
		})
	}
}

/// Configuration schema for DatabaseReceiptSource.
pub struct DatabaseReceiptSchema;

impl ConfigSchema for DatabaseReceiptSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::Url)],
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
impl ReceiptSource for DatabaseReceiptSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(DatabaseReceiptSchema)
	}

	fn name(&self) -> &str {
		"database"
	}

	async fn fetch(&self, hash: TxHash) -> Result<Option<Receipt>, ReceiptError> {
		let body = serde_json::json!({
			"jsonrpc": "2.0",
			"method": "eth_getTransactionReceipt",
			"params": [hash],
			"id": 1,
		});

		let response = self
			.client
			.post(&self.url)
			.json(&body)
			.send()
			.await
			.map_err(|e| ReceiptError::Source(e.to_string()))?;

		if !response.status().is_success() {
			return Err(ReceiptError::Source(format!("HTTP {}", response.status())));
		}

		let parsed: RpcResponse = response
			.json()
			.await
			.map_err(|e| ReceiptError::Source(format!("Invalid JSON-RPC response: {}", e)))?;

		if let Some(error) = parsed.error {
			return Err(ReceiptError::Source(format!(
				"JSON-RPC error {}: {}",
				error.code, error.message
			)));
		}

		let receipt = parsed.result.and_then(RpcReceipt::into_receipt);
		if receipt.is_none() {
			debug!(tx_hash = %hash, "Receipt not yet in database");
		}
		Ok(receipt)
	}
}

/// Factory function to create a database receipt source from configuration.
///
/// Configuration parameters:
/// - `url`: JSON-RPC endpoint of the receipt database (required)
/// - `timeout_ms`: Per-request timeout in milliseconds (default 5000)
pub fn create_database_source(
	config: &toml::Value,
) -> Result<Arc<dyn ReceiptSource>, ReceiptError> {
	DatabaseReceiptSchema
		.validate(config)
		.map_err(|e| ReceiptError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| ReceiptError::Configuration("url is required".to_string()))?;
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	Ok(Arc::new(DatabaseReceiptSource::new(
		url,
		Duration::from_millis(timeout_ms),
	)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{body_partial_json, method};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn source(server: &MockServer) -> DatabaseReceiptSource {
		DatabaseReceiptSource::new(server.uri(), Duration::from_secs(2)).unwrap()
	}

	#[tokio::test]
	async fn test_receipt_with_status() {
		let server = MockServer::start().await;
		let hash = TxHash::repeat_byte(0xab);
		Mock::given(method("POST"))
			.and(body_partial_json(serde_json::json!({
				"method": "eth_getTransactionReceipt"
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"jsonrpc": "2.0",
				"id": 1,
				"result": {
					"transactionHash": hash,
					"blockNumber": "0x10",
					"status": "0x1",
					"logs": [{
						"address": "0x1111111111111111111111111111111111111111",
						"topics": ["0x4242424242424242424242424242424242424242424242424242424242424242"],
						"data": "0x",
						"logIndex": "0x0"
					}]
				}
			})))
			.mount(&server)
			.await;

		let receipt = source(&server).fetch(hash).await.unwrap().unwrap();
		assert_eq!(receipt.block_number, Some(16));
		assert!(receipt.success);
		assert_eq!(receipt.logs.len(), 1);
	}

	#[tokio::test]
	async fn test_missing_status_is_pending() {
		let server = MockServer::start().await;
		let hash = TxHash::repeat_byte(0xab);
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"jsonrpc": "2.0",
				"id": 1,
				"result": { "transactionHash": hash, "blockNumber": null }
			})))
			.mount(&server)
			.await;
		assert_eq!(source(&server).fetch(hash).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_reverted_and_null() {
		let server = MockServer::start().await;
		let hash = TxHash::repeat_byte(0xcd);
		Mock::given(method("POST"))
			.and(body_partial_json(serde_json::json!({ "params": [hash] })))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"jsonrpc": "2.0",
				"id": 1,
				"result": { "transactionHash": hash, "status": "0x0" }
			})))
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"jsonrpc": "2.0",
				"id": 1,
				"result": null
			})))
			.mount(&server)
			.await;

		let receipt = source(&server).fetch(hash).await.unwrap().unwrap();
		assert!(!receipt.success);
		assert_eq!(source(&server).fetch(TxHash::repeat_byte(1)).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_rpc_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"jsonrpc": "2.0",
				"id": 1,
				"error": { "code": -32000, "message": "backend down" }
			})))
			.mount(&server)
			.await;
		assert!(matches!(
			source(&server).fetch(TxHash::repeat_byte(1)).await,
			Err(ReceiptError::Source(_))
		));
	}

	#[test]
	fn test_factory_requires_url() {
		let config: toml::Value = toml::from_str("timeout_ms = 100").unwrap();
		assert!(create_database_source(&config).is_err());
		let config: toml::Value = toml::from_str("url = \"http://localhost:8545\"").unwrap();
		assert!(create_database_source(&config).is_ok());
	}
}
