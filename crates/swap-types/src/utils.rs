use alloy::primitives::B256;

/// Shortens a hash for log output, e.g. `0xa096...a0b4`.
pub fn truncate_hash(hash: &B256) -> String {
	let full = hash.to_string();
	if full.len() <= 12 {
		full
	} else {
		format!("{}...{}", &full[..6], &full[full.len() - 4..])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn test_truncate_hash() {
		let hash =
			B256::from_str("0xa096c418fd1192ba7f5b506beea682a633f9ab82911fa3d7a249b8d80889a0b4")
				.unwrap();
		assert_eq!(truncate_hash(&hash), "0xa096...a0b4");
	}
}
