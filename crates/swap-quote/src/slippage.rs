//! Effective slippage, either the user's manual setting or derived from
//! trade size and gas price.

use crate::QuoteError;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use swap_types::{Token, U256};

const STABLE_BASE_BPS: u32 = 10;
const VOLATILE_BASE_BPS: u32 = 50;
const BPS_PER_DECADE: u32 = 10;
const MAX_SIZE_BUMP_BPS: u32 = 100;
const AUTO_MIN_BPS: u32 = 10;
const AUTO_MAX_BPS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlippageMode {
	/// Percent, e.g. `0.5`.
	Manual(Decimal),
	Auto,
}

/// What the automatic mode looks at.
#[derive(Debug, Clone)]
pub struct SlippageContext<'a> {
	pub token_in: &'a Token,
	pub token_out: &'a Token,
	pub amount_in: U256,
	pub gas_price_wei: Option<u128>,
}

#[derive(Debug, Clone)]
pub struct SlippageCalculator {
	default_percent: Decimal,
	max_percent: Decimal,
	stable_symbols: Vec<String>,
}

impl SlippageCalculator {
	pub fn new(default_percent: f64, max_percent: f64, stable_symbols: Vec<String>) -> Result<Self, QuoteError> {
		let to_decimal = |v: f64| {
			Decimal::from_f64(v)
				.map(|d| d.normalize())
				.ok_or_else(|| QuoteError::Configuration(format!("Invalid slippage value {}", v)))
		};
		Ok(Self {
			default_percent: to_decimal(default_percent)?,
			max_percent: to_decimal(max_percent)?,
			stable_symbols,
		})
	}

	pub fn default_percent(&self) -> Decimal {
		self.default_percent
	}

	pub fn max_percent(&self) -> Decimal {
		self.max_percent
	}

	/// Parses a user-entered percentage; an empty string means the default.
	pub fn parse_manual(&self, input: &str) -> Result<SlippageMode, QuoteError> {
		let trimmed = input.trim().trim_end_matches('%');
		if trimmed.is_empty() {
			return Ok(SlippageMode::Manual(self.default_percent));
		}
		let value = Decimal::from_str(trimmed)
			.map_err(|_| QuoteError::InvalidInput(format!("Invalid slippage: {}", input)))?;
		self.validate(value)?;
		Ok(SlippageMode::Manual(value))
	}

	pub fn validate(&self, percent: Decimal) -> Result<(), QuoteError> {
		if percent < Decimal::ZERO || percent > self.max_percent {
			return Err(QuoteError::InvalidInput(format!(
				"Slippage must be between 0% and {}%, got {}%",
				self.max_percent, percent
			)));
		}
		Ok(())
	}

	/// The slippage percent to use for this trade.
	pub fn effective(&self, mode: SlippageMode, ctx: &SlippageContext<'_>) -> Result<Decimal, QuoteError> {
		match mode {
			SlippageMode::Manual(percent) => {
				self.validate(percent)?;
				Ok(percent)
			}
			SlippageMode::Auto => Ok(self.auto(ctx)),
		}
	}

	fn is_stable_pair(&self, ctx: &SlippageContext<'_>) -> bool {
		let stable = |t: &Token| {
			self.stable_symbols
				.iter()
				.any(|s| s.eq_ignore_ascii_case(&t.symbol))
		};
		stable(ctx.token_in) && stable(ctx.token_out)
	}

	fn auto(&self, ctx: &SlippageContext<'_>) -> Decimal {
		let mut bps = if self.is_stable_pair(ctx) {
			STABLE_BASE_BPS
		} else {
			VOLATILE_BASE_BPS
		};

		// one bump per decade of the human amount above 1
		let whole_digits = ctx
			.token_in
			.format_amount(ctx.amount_in)
			.ok()
			.map(|s| s.split('.').next().unwrap_or_default().trim_start_matches('0').len())
			.unwrap_or(0);
		let decades = whole_digits.saturating_sub(1) as u32;
		bps += (decades * BPS_PER_DECADE).min(MAX_SIZE_BUMP_BPS);

		if let Some(wei) = ctx.gas_price_wei {
			let gwei = wei / 1_000_000_000;
			if gwei > 100 {
				bps += 50;
			} else if gwei > 50 {
				bps += 20;
			}
		}

		let bps = bps.clamp(AUTO_MIN_BPS, AUTO_MAX_BPS);
		let percent = Decimal::new(bps as i64, 2);
		percent.min(self.max_percent)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use swap_types::Address;

	fn calculator() -> SlippageCalculator {
		SlippageCalculator::new(
			0.5,
			50.0,
			vec!["USDC".to_string(), "USDT".to_string()],
		)
		.unwrap()
	}

	fn token(symbol: &str, decimals: u8) -> Token {
		Token::new(Address::repeat_byte(decimals), symbol, decimals, symbol)
	}

	#[test]
	fn test_manual_bounds() {
		let calc = calculator();
		assert_eq!(
			calc.parse_manual("").unwrap(),
			SlippageMode::Manual(Decimal::from_str("0.5").unwrap())
		);
		assert_eq!(
			calc.parse_manual("1.5%").unwrap(),
			SlippageMode::Manual(Decimal::from_str("1.5").unwrap())
		);
		assert!(calc.parse_manual("50").is_ok());
		assert!(matches!(calc.parse_manual("150"), Err(QuoteError::InvalidInput(_))));
		assert!(matches!(calc.parse_manual("-1"), Err(QuoteError::InvalidInput(_))));
		assert!(calc.parse_manual("abc").is_err());
	}

	#[test]
	fn test_auto_small_volatile_trade() {
		let calc = calculator();
		let weth = token("WETH", 18);
		let usdc = token("USDC", 6);
		let ctx = SlippageContext {
			token_in: &weth,
			token_out: &usdc,
			amount_in: U256::from(500_000_000_000_000_000u128), // 0.5
			gas_price_wei: Some(10_000_000_000),
		};
		assert_eq!(
			calc.effective(SlippageMode::Auto, &ctx).unwrap(),
			Decimal::from_str("0.5").unwrap()
		);
	}

	#[test]
	fn test_auto_grows_with_size_and_gas() {
		let calc = calculator();
		let weth = token("WETH", 18);
		let usdc = token("USDC", 6);
		let ctx = SlippageContext {
			token_in: &usdc,
			token_out: &weth,
			amount_in: U256::from(25_000_000_000u64), // 25,000 USDC: 4 decades
			gas_price_wei: Some(120_000_000_000),
		};
		// 50 base + 40 size + 50 gas
		assert_eq!(
			calc.effective(SlippageMode::Auto, &ctx).unwrap(),
			Decimal::from_str("1.4").unwrap()
		);
	}

	#[test]
	fn test_auto_stable_pair() {
		let calc = calculator();
		let usdc = token("USDC", 6);
		let usdt = token("usdt", 6);
		let ctx = SlippageContext {
			token_in: &usdc,
			token_out: &usdt,
			amount_in: U256::from(5_000_000u64),
			gas_price_wei: None,
		};
		assert_eq!(
			calc.effective(SlippageMode::Auto, &ctx).unwrap(),
			Decimal::from_str("0.1").unwrap()
		);
	}
}
