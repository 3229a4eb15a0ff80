//! Token reference data and lookup.

use crate::units::{format_amount, parse_amount, parse_positive_amount, UnitsError};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ERC-20 token, or the chain's native asset when `address` is zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
	pub address: Address,
	pub symbol: String,
	pub decimals: u8,
	#[serde(default)]
	pub name: String,
}

impl Token {
	pub fn new(
		address: Address,
		symbol: impl Into<String>,
		decimals: u8,
		name: impl Into<String>,
	) -> Self {
		Self {
			address,
			symbol: symbol.into(),
			decimals,
			name: name.into(),
		}
	}

	/// The native asset sentinel (zero address, 18 decimals).
	pub fn native(symbol: impl Into<String>, name: impl Into<String>) -> Self {
		Self::new(Address::ZERO, symbol, 18, name)
	}

	pub fn is_native_sentinel(&self) -> bool {
		self.address.is_zero()
	}

	pub fn parse_amount(&self, amount: &str) -> Result<U256, UnitsError> {
		parse_amount(amount, self.decimals)
	}

	pub fn parse_positive_amount(&self, amount: &str) -> Result<U256, UnitsError> {
		parse_positive_amount(amount, self.decimals)
	}

	pub fn format_amount(&self, amount: U256) -> Result<String, UnitsError> {
		format_amount(amount, self.decimals)
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.symbol)
	}
}

/// Known tokens for one network, including the native asset and its canonical
/// wrapped representation.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
	native: Token,
	wrapped_native: Token,
	tokens: Vec<Token>,
}

impl TokenRegistry {
	pub fn new(native: Token, wrapped_native: Token, tokens: Vec<Token>) -> Self {
		let mut all = vec![native.clone(), wrapped_native.clone()];
		for token in tokens {
			if !all.iter().any(|t| t.address == token.address && t.symbol == token.symbol) {
				all.push(token);
			}
		}
		Self {
			native,
			wrapped_native,
			tokens: all,
		}
	}

	pub fn native(&self) -> &Token {
		&self.native
	}

	pub fn wrapped_native(&self) -> &Token {
		&self.wrapped_native
	}

	pub fn tokens(&self) -> &[Token] {
		&self.tokens
	}

	/// Looks up a token by symbol, case-insensitively.
	pub fn by_symbol(&self, symbol: &str) -> Option<&Token> {
		self.tokens
			.iter()
			.find(|t| t.symbol.eq_ignore_ascii_case(symbol))
	}

	pub fn by_address(&self, address: &Address) -> Option<&Token> {
		self.tokens.iter().find(|t| &t.address == address)
	}

	/// Resolves either a hex address or a symbol.
	pub fn resolve(&self, key: &str) -> Option<&Token> {
		match key.parse::<Address>() {
			Ok(address) => self.by_address(&address),
			Err(_) => self.by_symbol(key),
		}
	}

	/// Address used when pricing `token`: the native asset is priced as the
	/// wrapped-native token.
	pub fn pricing_address(&self, token: &Token) -> Address {
		if token.is_native_sentinel() || token.symbol.eq_ignore_ascii_case(&self.native.symbol) {
			self.wrapped_native.address
		} else {
			token.address
		}
	}
}
