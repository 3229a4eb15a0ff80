//! Wrapped-native token calls.

use alloy::sol;
use alloy::sol_types::SolCall;
use swap_types::{Address, Bytes, WalletTransaction, U256};

sol! {
	interface IWETH {
		function deposit() external payable;
		function withdraw(uint256 wad) external;
	}
}

/// `deposit()` carrying `amount` of the native asset.
pub fn deposit_tx(weth: Address, amount: U256) -> WalletTransaction {
	WalletTransaction::call(weth, Bytes::from(IWETH::depositCall {}.abi_encode())).with_value(amount)
}

/// `withdraw(amount)`.
pub fn withdraw_tx(weth: Address, amount: U256) -> WalletTransaction {
	WalletTransaction::call(
		weth,
		Bytes::from(IWETH::withdrawCall { wad: amount }.abi_encode()),
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_deposit_and_withdraw_encoding() {
		let weth = Address::repeat_byte(0xee);
		let one = U256::from(1_000_000_000_000_000_000u128);

		let deposit = deposit_tx(weth, one);
		assert_eq!(deposit.to, weth);
		assert_eq!(deposit.value, one);
		assert_eq!(deposit.data.as_ref(), &[0xd0, 0xe3, 0x0d, 0xb0]);

		let withdraw = withdraw_tx(weth, one);
		assert_eq!(withdraw.value, U256::ZERO);
		assert_eq!(&withdraw.data[..4], &[0x2e, 0x1a, 0x7d, 0x4d]);
		assert_eq!(IWETH::withdrawCall::abi_decode(&withdraw.data).unwrap().wad, one);
	}
}
