//! HTTP client for the execution backend.

use crate::{
	refusal, BackendError, EthSwapRequest, EthSwapResponse, ExecutionBackend, IntentSubmission,
	IntentSubmitted,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use swap_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub struct HttpExecutionBackend {
	client: reqwest::Client,
	url: String,
}

impl HttpExecutionBackend {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| BackendError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url: url.into().trim_end_matches('/').to_string(),
		})
	}

	async fn post<B: Serialize + Sync, R: DeserializeOwned>(
		&self,
		path: &str,
		body: &B,
	) -> Result<R, BackendError> {
		let url = format!("{}{}", self.url, path);
		debug!(url = %url, "Posting to execution backend");

		let response = self
			.client
			.post(&url)
			.json(body)
			.send()
			.await
			.map_err(|e| BackendError::Unavailable(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let text = response.text().await.unwrap_or_default();
			warn!(status = %status, body = %text, "Execution backend returned an error status");
			return Err(BackendError::Unavailable(format!("HTTP {}", status)));
		}

		response
			.json()
			.await
			.map_err(|e| BackendError::InvalidResponse(e.to_string()))
	}
}

/// Configuration schema for HttpExecutionBackend.
pub struct HttpBackendSchema;

impl ConfigSchema for HttpBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::Url)],
			vec![Field::new(
				"timeout_ms",
				FieldType::Integer {
					min: Some(1),
					max: Some(120_000),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl ExecutionBackend for HttpExecutionBackend {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpBackendSchema)
	}

	async fn request_eth_swap(
		&self,
		request: &EthSwapRequest,
	) -> Result<EthSwapResponse, BackendError> {
		let response: EthSwapResponse = self.post("/fastswap/eth", request).await?;
		if let Some(reason) = refusal(&response.status, response.error.as_deref()) {
			return Err(BackendError::Rejected(reason));
		}
		if response.to.is_none() {
			return Err(BackendError::InvalidResponse("missing `to`".to_string()));
		}
		Ok(response)
	}

	async fn submit_intent(
		&self,
		submission: &IntentSubmission,
	) -> Result<IntentSubmitted, BackendError> {
		let response: IntentSubmitted = self.post("/fastswap", submission).await?;
		if let Some(reason) = refusal(&response.status, response.error.as_deref()) {
			return Err(BackendError::Rejected(reason));
		}
		Ok(response)
	}
}

/// Factory function to create an HTTP execution backend from configuration.
///
/// Configuration parameters:
/// - `url`: Base URL of the execution service (required)
/// - `timeout_ms`: Request timeout in milliseconds (default 10000)
pub fn create_http_backend(
	config: &toml::Value,
) -> Result<Arc<dyn ExecutionBackend>, BackendError> {
	HttpBackendSchema
		.validate(config)
		.map_err(|e| BackendError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| BackendError::Configuration("url is required".to_string()))?;
	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	Ok(Arc::new(HttpExecutionBackend::new(
		url,
		Duration::from_millis(timeout_ms),
	)?))
}
