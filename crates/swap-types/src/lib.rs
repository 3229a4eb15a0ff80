//! Shared domain types for the fastswap engine.
//!
//! Every other crate in the workspace depends on this one for tokens, quotes,
//! intents, settlement attempts, receipts, unit math and configuration schema
//! validation.

pub mod clock;
pub mod events;
pub mod intent;
pub mod quote;
pub mod receipt;
pub mod route;
pub mod settlement;
pub mod token;
pub mod transaction;
pub mod units;
pub mod utils;
pub mod validation;

pub use clock::*;
pub use events::*;
pub use intent::*;
pub use quote::*;
pub use receipt::*;
pub use route::*;
pub use settlement::*;
pub use token::*;
pub use transaction::*;
pub use units::{
	apply_slippage_bps, format_amount, parse_amount, parse_positive_amount, percent_to_bps,
	UnitsError, BPS_DENOMINATOR,
};
pub use utils::truncate_hash;
pub use validation::*;

// Re-export commonly used ethereum types
pub use alloy::primitives::{Address, Bytes, TxHash, B256, U256};

/// Chain identifier
pub type ChainId = u64;
