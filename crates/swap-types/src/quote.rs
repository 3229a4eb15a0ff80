//! Quote types and the quote currently shown to the user.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A price quote for `amount_in` of one token into another.
///
/// Produced by the quote collaborator and never mutated afterwards. Liveness
/// is derived from `fetched_at` and a TTL, not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
	pub amount_in: U256,
	pub amount_out: U256,
	/// Output per unit of input, in human units.
	pub exchange_rate: f64,
	/// Price impact in percent.
	pub price_impact: f64,
	pub min_out: U256,
	/// Pool fee tier in hundredths of a basis point (500, 3000, 10000).
	pub fee: u32,
	pub gas_estimate: u64,
	pub fetched_at: DateTime<Utc>,
}

/// Composite identity used to decide whether a response is a new quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuoteIdentity {
	amount_out: U256,
	exchange_rate_bits: u64,
	fee: u32,
}

impl Quote {
	pub fn identity(&self) -> QuoteIdentity {
		QuoteIdentity {
			amount_out: self.amount_out,
			exchange_rate_bits: self.exchange_rate.to_bits(),
			fee: self.fee,
		}
	}

	pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
		self.fetched_at + chrono::Duration::milliseconds(ttl.as_millis() as i64)
	}

	pub fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
		now < self.expires_at(ttl)
	}

	/// The same quote seen from the other direction: amounts swapped, the
	/// exchange rate replaced by its reciprocal and `min_out` scaled so the
	/// slippage ratio is preserved.
	pub fn inverted(&self) -> Quote {
		let exchange_rate = if self.exchange_rate > 0.0 {
			1.0 / self.exchange_rate
		} else {
			0.0
		};
		let min_out = if self.amount_out.is_zero() {
			U256::ZERO
		} else {
			self.amount_in
				.checked_mul(self.min_out)
				.map(|v| v / self.amount_out)
				.unwrap_or(self.amount_in)
		};

		Quote {
			amount_in: self.amount_out,
			amount_out: self.amount_in,
			exchange_rate,
			price_impact: self.price_impact,
			min_out,
			fee: self.fee,
			gas_estimate: self.gas_estimate,
			fetched_at: self.fetched_at,
		}
	}

	pub fn price_impact_severity(&self) -> PriceImpactSeverity {
		PriceImpactSeverity::from_percent(self.price_impact)
	}
}

/// The quote currently presented. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "quote", rename_all = "camelCase")]
pub enum DisplayQuote {
	/// The latest adopted quote for the current pair.
	Live(Quote),
	/// A previously adopted quote shown while a refetch is in flight.
	Cached(Quote),
	/// Reciprocal of the previous direction's quote, shown right after the
	/// pair was reversed and until a genuine quote arrives.
	SyntheticInverted(Quote),
}

impl DisplayQuote {
	pub fn quote(&self) -> &Quote {
		match self {
			DisplayQuote::Live(q) | DisplayQuote::Cached(q) | DisplayQuote::SyntheticInverted(q) => q,
		}
	}

	pub fn into_quote(self) -> Quote {
		match self {
			DisplayQuote::Live(q) | DisplayQuote::Cached(q) | DisplayQuote::SyntheticInverted(q) => q,
		}
	}

	/// Only a live or cached quote came from the quote API for this pair.
	pub fn is_authoritative(&self) -> bool {
		!matches!(self, DisplayQuote::SyntheticInverted(_))
	}
}

/// Coarse bucket for price impact display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceImpactSeverity {
	Low,
	Medium,
	High,
}

impl PriceImpactSeverity {
	pub fn from_percent(impact: f64) -> Self {
		let abs = impact.abs();
		if abs < 1.0 {
			PriceImpactSeverity::Low
		} else if abs < 3.0 {
			PriceImpactSeverity::Medium
		} else {
			PriceImpactSeverity::High
		}
	}
}

/// Formats a price impact percentage for display.
pub fn format_price_impact(impact: f64) -> String {
	let abs = impact.abs();
	if abs < 0.01 {
		return "<0.01%".to_string();
	}
	let sign = if impact >= 0.0 { "" } else { "-" };
	format!("{}{:.2}%", sign, abs)
}
