//! Route classification for a token pair.

use swap_types::{Address, Route, SettlementPath, Token};

/// Decides whether a pair is a native wrap, an unwrap or a priced swap.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
	native_symbol: String,
	wrapped_native: Token,
}

impl RouteClassifier {
	pub fn new(native_symbol: impl Into<String>, wrapped_native: Token) -> Self {
		Self {
			native_symbol: native_symbol.into(),
			wrapped_native,
		}
	}

	pub fn wrapped_native(&self) -> &Token {
		&self.wrapped_native
	}

	pub fn is_native(&self, token: &Token) -> bool {
		token.is_native_sentinel() || token.symbol.eq_ignore_ascii_case(&self.native_symbol)
	}

	pub fn is_wrapped_native(&self, token: &Token) -> bool {
		token.address == self.wrapped_native.address
			|| token.symbol.eq_ignore_ascii_case(&self.wrapped_native.symbol)
	}

	pub fn classify(&self, token_in: &Token, token_out: &Token) -> Route {
		if self.is_native(token_in) && self.is_wrapped_native(token_out) {
			Route::Wrap
		} else if self.is_wrapped_native(token_in) && self.is_native(token_out) {
			Route::Unwrap
		} else {
			Route::Swap
		}
	}

	/// Execution path once the user confirms.
	pub fn settlement_path(&self, token_in: &Token, token_out: &Token) -> SettlementPath {
		match self.classify(token_in, token_out) {
			Route::Wrap => SettlementPath::Wrap,
			Route::Unwrap => SettlementPath::Unwrap,
			Route::Swap if self.is_native(token_in) => SettlementPath::DirectEth,
			Route::Swap => SettlementPath::Permit,
		}
	}

	/// Address used for pricing: native is priced as the wrapped token.
	pub fn pricing_address(&self, token: &Token) -> Address {
		if self.is_native(token) {
			self.wrapped_native.address
		} else {
			token.address
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tokens() -> (RouteClassifier, Token, Token, Token) {
		let weth = Token::new(Address::repeat_byte(0xee), "WETH", 18, "Wrapped Ether");
		let usdc = Token::new(Address::repeat_byte(0x0c), "USDC", 6, "USD Coin");
		let eth = Token::native("ETH", "Ether");
		(RouteClassifier::new("ETH", weth.clone()), eth, weth, usdc)
	}

	#[test]
	fn test_classify() {
		let (classifier, eth, weth, usdc) = tokens();
		assert_eq!(classifier.classify(&eth, &weth), Route::Wrap);
		assert_eq!(classifier.classify(&weth, &eth), Route::Unwrap);
		assert_eq!(classifier.classify(&usdc, &weth), Route::Swap);
		assert_eq!(classifier.classify(&eth, &usdc), Route::Swap);
		assert_eq!(classifier.classify(&usdc, &eth), Route::Swap);
	}

	#[test]
	fn test_classify_by_symbol_case_insensitive() {
		let (classifier, _, weth, _) = tokens();
		// native identified by symbol even with a non-zero placeholder address
		let eth_like = Token::new(Address::repeat_byte(0x01), "eth", 18, "Ether");
		let weth_by_symbol = Token::new(Address::repeat_byte(0x02), "weth", 18, "");
		assert_eq!(classifier.classify(&eth_like, &weth_by_symbol), Route::Wrap);
		assert_eq!(classifier.classify(&weth, &eth_like), Route::Unwrap);
	}

	#[test]
	fn test_wrap_and_unwrap_are_inverse() {
		let (classifier, eth, weth, usdc) = tokens();
		for (a, b) in [(&eth, &weth), (&weth, &eth), (&usdc, &weth)] {
			let forward = classifier.classify(a, b);
			let backward = classifier.classify(b, a);
			match forward {
				Route::Wrap => assert_eq!(backward, Route::Unwrap),
				Route::Unwrap => assert_eq!(backward, Route::Wrap),
				Route::Swap => assert_eq!(backward, Route::Swap),
			}
		}
	}

	#[test]
	fn test_settlement_path() {
		let (classifier, eth, weth, usdc) = tokens();
		assert_eq!(classifier.settlement_path(&eth, &weth), SettlementPath::Wrap);
		assert_eq!(classifier.settlement_path(&weth, &eth), SettlementPath::Unwrap);
		assert_eq!(classifier.settlement_path(&eth, &usdc), SettlementPath::DirectEth);
		assert_eq!(classifier.settlement_path(&usdc, &eth), SettlementPath::Permit);
		assert_eq!(classifier.settlement_path(&weth, &usdc), SettlementPath::Permit);
	}

	#[test]
	fn test_pricing_address() {
		let (classifier, eth, weth, usdc) = tokens();
		assert_eq!(classifier.pricing_address(&eth), weth.address);
		assert_eq!(classifier.pricing_address(&usdc), usdc.address);
	}
}
