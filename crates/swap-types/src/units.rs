//! Fixed-point conversion between human-readable decimal strings and integer
//! base units, plus basis-point slippage arithmetic.
//!
//! Amounts never pass through floating point. Strings are validated up front so
//! that callers get a precise error (empty, malformed, too many decimals) rather
//! than whatever the underlying parser reports.

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Denominator for basis-point arithmetic.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Errors that can occur while converting amounts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitsError {
	#[error("Amount is empty")]
	Empty,
	#[error("Malformed amount: {0}")]
	Malformed(String),
	#[error("Amount {amount} has more than {decimals} decimal places")]
	TooPrecise { amount: String, decimals: u8 },
	#[error("Amount must be greater than zero")]
	NotPositive,
	#[error("Slippage of {0} basis points is out of range")]
	BpsOutOfRange(String),
	#[error("Arithmetic overflow")]
	Overflow,
	#[error("Conversion failed: {0}")]
	Conversion(String),
}

/// Parses a decimal string such as `"1.5"` into base units for a token with
/// `decimals` decimals.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
	let trimmed = amount.trim();
	if trimmed.is_empty() {
		return Err(UnitsError::Empty);
	}

	let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
	if whole.is_empty() && fraction.is_empty() {
		return Err(UnitsError::Malformed(trimmed.to_string()));
	}
	let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
	if !is_digits(whole) || !is_digits(fraction) {
		return Err(UnitsError::Malformed(trimmed.to_string()));
	}
	if fraction.len() > decimals as usize {
		return Err(UnitsError::TooPrecise {
			amount: trimmed.to_string(),
			decimals,
		});
	}

	let whole = if whole.is_empty() { "0" } else { whole };
	let normalized = if fraction.is_empty() {
		whole.to_string()
	} else {
		format!("{}.{}", whole, fraction)
	};

	parse_units(&normalized, decimals)
		.map(Into::into)
		.map_err(|e| UnitsError::Conversion(e.to_string()))
}

/// Same as [`parse_amount`] but rejects zero.
pub fn parse_positive_amount(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
	let value = parse_amount(amount, decimals)?;
	if value.is_zero() {
		return Err(UnitsError::NotPositive);
	}
	Ok(value)
}

/// Formats base units as a decimal string without trailing zeros.
pub fn format_amount(amount: U256, decimals: u8) -> Result<String, UnitsError> {
	let formatted =
		format_units(amount, decimals).map_err(|e| UnitsError::Conversion(e.to_string()))?;

	if !formatted.contains('.') {
		return Ok(formatted);
	}
	let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
	Ok(trimmed.to_string())
}

/// Converts a slippage percentage (`0.5` meaning 0.5%) into whole basis points,
/// rounding half away from zero.
pub fn percent_to_bps(percent: Decimal) -> Result<u32, UnitsError> {
	if percent.is_sign_negative() && !percent.is_zero() {
		return Err(UnitsError::BpsOutOfRange(percent.to_string()));
	}

	let bps = (percent * Decimal::ONE_HUNDRED)
		.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
		.to_u32()
		.ok_or_else(|| UnitsError::BpsOutOfRange(percent.to_string()))?;

	if bps > BPS_DENOMINATOR {
		return Err(UnitsError::BpsOutOfRange(percent.to_string()));
	}
	Ok(bps)
}

/// `amount_out * (10000 - bps) / 10000`, floored.
pub fn apply_slippage_bps(amount_out: U256, bps: u32) -> Result<U256, UnitsError> {
	if bps > BPS_DENOMINATOR {
		return Err(UnitsError::BpsOutOfRange(bps.to_string()));
	}

	let kept = U256::from(BPS_DENOMINATOR - bps);
	let scaled = amount_out.checked_mul(kept).ok_or(UnitsError::Overflow)?;
	Ok(scaled / U256::from(BPS_DENOMINATOR))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn test_parse_amount() {
		assert_eq!(
			parse_amount("1.0", 18).unwrap(),
			U256::from(1_000_000_000_000_000_000u128)
		);
		assert_eq!(parse_amount("0.5", 6).unwrap(), U256::from(500_000u64));
		assert_eq!(parse_amount(".25", 2).unwrap(), U256::from(25u64));
		assert_eq!(parse_amount("42", 0).unwrap(), U256::from(42u64));
	}

	#[test]
	fn test_parse_amount_rejects_bad_input() {
		assert_eq!(parse_amount("", 18), Err(UnitsError::Empty));
		assert_eq!(parse_amount("   ", 18), Err(UnitsError::Empty));
		assert!(matches!(parse_amount(".", 18), Err(UnitsError::Malformed(_))));
		assert!(matches!(parse_amount("-1", 18), Err(UnitsError::Malformed(_))));
		assert!(matches!(parse_amount("1e5", 18), Err(UnitsError::Malformed(_))));
		assert!(matches!(
			parse_amount("0.1234567", 6),
			Err(UnitsError::TooPrecise { decimals: 6, .. })
		));
		assert_eq!(parse_positive_amount("0.000", 6), Err(UnitsError::NotPositive));
	}

	#[test]
	fn test_format_amount_trims_zeros() {
		let one_and_half = U256::from(1_500_000_000_000_000_000u128);
		assert_eq!(format_amount(one_and_half, 18).unwrap(), "1.5");
		assert_eq!(format_amount(U256::from(2_000_000u64), 6).unwrap(), "2");
		assert_eq!(format_amount(U256::ZERO, 6).unwrap(), "0");
	}

	#[test]
	fn test_percent_to_bps_rounds_half_away_from_zero() {
		assert_eq!(percent_to_bps(Decimal::from_str("0.5").unwrap()).unwrap(), 50);
		assert_eq!(percent_to_bps(Decimal::from_str("0.125").unwrap()).unwrap(), 13);
		assert_eq!(percent_to_bps(Decimal::from_str("0.005").unwrap()).unwrap(), 1);
		assert_eq!(percent_to_bps(Decimal::from(50)).unwrap(), 5000);
		assert!(percent_to_bps(Decimal::from(101)).is_err());
		assert!(percent_to_bps(Decimal::from(-1)).is_err());
	}

	#[test]
	fn test_apply_slippage_is_exact_and_bounded() {
		let amount_out = U256::from(1_000_000u64);
		assert_eq!(apply_slippage_bps(amount_out, 50).unwrap(), U256::from(995_000u64));
		assert_eq!(apply_slippage_bps(amount_out, 0).unwrap(), amount_out);
		assert_eq!(apply_slippage_bps(amount_out, 5000).unwrap(), U256::from(500_000u64));

		// floor division on awkward values
		let odd = U256::from(999u64);
		assert_eq!(apply_slippage_bps(odd, 33).unwrap(), U256::from(995u64));

		for bps in [0u32, 1, 49, 50, 2500, 4999, 5000] {
			for raw in [1u64, 7, 1_000, 123_456_789, u64::MAX] {
				let amount = U256::from(raw);
				let min_out = apply_slippage_bps(amount, bps).unwrap();
				let expected =
					amount * U256::from(BPS_DENOMINATOR - bps) / U256::from(BPS_DENOMINATOR);
				assert_eq!(min_out, expected);
				assert!(min_out <= amount);
			}
		}
	}

	#[test]
	fn test_apply_slippage_overflow() {
		assert_eq!(apply_slippage_bps(U256::MAX, 50), Err(UnitsError::Overflow));
		assert!(apply_slippage_bps(U256::from(1u64), 10_001).is_err());
	}
}
