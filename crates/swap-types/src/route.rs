use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution route for a token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
	/// Native asset into its wrapped token, 1:1.
	Wrap,
	/// Wrapped token back into the native asset, 1:1.
	Unwrap,
	/// Anything priced by the quote API.
	Swap,
}

impl Route {
	/// Wrap and unwrap never need a quote, slippage or price impact.
	pub fn is_one_to_one(&self) -> bool {
		matches!(self, Route::Wrap | Route::Unwrap)
	}
}

impl fmt::Display for Route {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Route::Wrap => write!(f, "wrap"),
			Route::Unwrap => write!(f, "unwrap"),
			Route::Swap => write!(f, "swap"),
		}
	}
}
