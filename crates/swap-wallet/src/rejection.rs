//! Recognising user rejections and turning provider errors into short
//! user-facing messages.

const REJECTION_PATTERNS: &[&str] = &[
	"rejected",
	"user denied",
	"user cancelled",
	"user canceled",
	"4001",
	"action_cancelled",
	"action_canceled",
];

/// True when a wallet or provider error message means the user declined.
pub fn is_rejection_message(message: &str) -> bool {
	let lower = message.to_lowercase();
	REJECTION_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Maps an error message to something presentable for `operation`
/// ("swap", "wrap", ...).
pub fn friendly_error_message(message: &str, operation: &str) -> String {
	if is_rejection_message(message) {
		return format!("{} cancelled", capitalize(operation));
	}

	let lower = message.to_lowercase();
	let friendly = if lower.contains("insufficient funds") {
		"Insufficient funds for gas fees"
	} else if lower.contains("insufficient balance") {
		"Insufficient balance"
	} else if lower.contains("deadline") || lower.contains("expired") {
		"Transaction deadline expired. Please try again"
	} else if lower.contains("timeout") || lower.contains("timed out") {
		"Request timed out. Please try again"
	} else if lower.contains("network") || lower.contains("connection") {
		"Network error. Please check your connection and try again"
	} else {
		return message.to_string();
	};
	friendly.to_string()
}

fn capitalize(word: &str) -> String {
	let mut chars = word.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}
