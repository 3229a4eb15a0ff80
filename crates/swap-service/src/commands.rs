//! Subcommand handlers for the `fastswap` binary.

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use swap_config::SwapConfig;
use swap_core::{EngineError, SwapEngine, SwapEngineBuilder};
use swap_quote::{QuoteInput, QuoteStatus, QuoteView, SlippageMode};
use swap_settlement::{SettlementError, SwapRequest};
use swap_types::{format_price_impact, Clock, Intent, Quote, Route, SystemClock, Token};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long `swap` waits for an authoritative quote before giving up.
const QUOTE_WAIT: Duration = Duration::from_secs(30);

pub struct SwapArgs {
	pub from: String,
	pub to: String,
	pub amount: String,
	pub slippage: Option<String>,
	pub auto_slippage: bool,
	pub deadline_minutes: Option<u32>,
	pub wait: bool,
	/// Where to write the signed intent, for a later `cancel`.
	pub intent_out: Option<PathBuf>,
}

fn resolve_token(engine: &SwapEngine, key: &str) -> Result<Token> {
	engine
		.tokens()
		.resolve(key)
		.cloned()
		.ok_or_else(|| anyhow!("Unknown token: {}", key))
}

/// One line describing the quote session's state.
pub fn describe_view(view: &QuoteView) -> String {
	let symbols = match (&view.token_in, &view.token_out) {
		(Some(token_in), Some(token_out)) => Some((token_in, token_out)),
		_ => None,
	};
	match &view.status {
		QuoteStatus::Idle => "Enter an amount".to_string(),
		QuoteStatus::Invalid(message) => format!("Invalid input: {}", message),
		QuoteStatus::Loading => "Fetching quote...".to_string(),
		QuoteStatus::NoLiquidity => "No liquidity found for this pair".to_string(),
		QuoteStatus::Error(message) => format!("Quote unavailable: {}", message),
		QuoteStatus::NotRequired => match symbols {
			Some((token_in, token_out)) => format!(
				"{} {} -> {} {} (1:1, no quote needed)",
				view.amount, token_in.symbol, view.amount, token_out.symbol
			),
			None => "No quote needed".to_string(),
		},
		QuoteStatus::Ready | QuoteStatus::Refreshing => {
			let (Some(display), Some((token_in, token_out))) = (&view.quote, symbols) else {
				return "Fetching quote...".to_string();
			};
			let quote = display.quote();
			let estimated = if display.is_authoritative() { "" } else { " (estimated)" };
			let refreshing = if view.status == QuoteStatus::Refreshing {
				" | refreshing".to_string()
			} else {
				format!(" | refresh in {}s", view.time_left.as_secs())
			};
			format!(
				"{} {} -> {} {}{} | min {} | impact {} ({:?}){}",
				view.amount,
				token_in.symbol,
				human_amount(token_out, quote.amount_out),
				token_out.symbol,
				estimated,
				human_amount(token_out, quote.min_out),
				format_price_impact(quote.price_impact),
				quote.price_impact_severity(),
				refreshing,
			)
		}
	}
}

fn human_amount(token: &Token, amount: swap_types::U256) -> String {
	token
		.format_amount(amount)
		.unwrap_or_else(|_| amount.to_string())
}

/// Prints quote updates until the session ends or `shutdown` fires.
pub async fn quote(
	engine: &SwapEngine,
	from: &str,
	to: &str,
	amount: &str,
	shutdown: CancellationToken,
) -> Result<()> {
	let token_in = resolve_token(engine, from)?;
	let token_out = resolve_token(engine, to)?;

	let handle = engine.observe_quote(QuoteInput::new(token_in, token_out, amount));
	let mut views = handle.stream();

	let mut last = String::new();
	loop {
		let view = tokio::select! {
			_ = shutdown.cancelled() => break,
			view = views.next() => view,
		};
		let Some(view) = view else {
			break;
		};
		let line = describe_view(&view);
		// countdown ticks would otherwise flood the terminal
		if line != last {
			println!("{}", line);
			last = line;
		}
	}
	Ok(())
}

/// Waits for the first authoritative quote of a priced pair.
async fn await_quote(engine: &SwapEngine, input: QuoteInput) -> Result<Quote> {
	let mut handle = engine.observe_quote(input);
	let wait = async {
		let mut view = handle.current();
		loop {
			match &view.status {
				QuoteStatus::Ready => {
					if let Some(display) = view.quote.as_ref().filter(|d| d.is_authoritative()) {
						return Ok::<Quote, anyhow::Error>(display.quote().clone());
					}
				}
				QuoteStatus::NoLiquidity => bail!("No liquidity found for this pair"),
				QuoteStatus::Error(message) => bail!("Quote unavailable: {}", message),
				QuoteStatus::Invalid(message) => bail!("Invalid input: {}", message),
				_ => {}
			}
			view = handle
				.changed()
				.await
				.ok_or_else(|| anyhow!("Quote session ended"))?;
		}
	};
	tokio::time::timeout(QUOTE_WAIT, wait)
		.await
		.context("Timed out waiting for a quote")?
}

pub async fn swap(engine: &SwapEngine, args: SwapArgs) -> Result<()> {
	let token_in = resolve_token(engine, &args.from)?;
	let token_out = resolve_token(engine, &args.to)?;
	let amount_in = token_in
		.parse_positive_amount(&args.amount)
		.with_context(|| format!("Invalid amount: {}", args.amount))?;

	let mode = if args.auto_slippage || (engine.config().slippage.auto && args.slippage.is_none()) {
		SlippageMode::Auto
	} else {
		engine
			.slippage()
			.parse_manual(args.slippage.as_deref().unwrap_or(""))?
	};
	let slippage_percent = engine
		.effective_slippage(mode, &token_in, &token_out, amount_in)
		.await?;

	let route = engine.classify(&token_in, &token_out);
	let quote = match route {
		Route::Swap => {
			let input = QuoteInput::new(token_in.clone(), token_out.clone(), args.amount.clone())
				.with_slippage(slippage_percent);
			Some(await_quote(engine, input).await?)
		}
		_ => None,
	};
	info!(
		route = ?route,
		slippage_percent = %slippage_percent,
		"Confirming swap {} {} -> {}",
		args.amount,
		token_in.symbol,
		token_out.symbol
	);

	let request = SwapRequest {
		token_in: Some(token_in),
		token_out: Some(token_out),
		amount: args.amount,
		quote,
		slippage_percent,
		deadline_minutes: args.deadline_minutes,
	};

	let attempt = match engine.swap(request).await {
		Ok(attempt) => attempt,
		Err(EngineError::Settlement(SettlementError::UserRejected(message))) => {
			println!("{}", message);
			return Ok(());
		}
		Err(e) => return Err(e.into()),
	};

	let notification = engine.take_notification().unwrap_or_else(|| attempt.clone());
	println!("{}", notification.status_message());
	if let Some(hash) = attempt.hash {
		println!("Settlement: {}", hash);
	}
	if let Some(intent) = &attempt.intent {
		match &args.intent_out {
			Some(path) => {
				save_intent(intent, path).await?;
				println!("Signed intent saved to {}", path.display());
			}
			None => println!("Pass --intent-out FILE to keep the signed intent for cancel"),
		}
	}

	if !args.wait {
		return Ok(());
	}
	match engine.wait_for_receipt(&attempt).await {
		Ok(Some(confirmation)) => {
			println!(
				"Transaction confirmed (block {}, via {})",
				confirmation
					.receipt
					.block_number
					.map(|n| n.to_string())
					.unwrap_or_else(|| "pending".to_string()),
				confirmation.source
			);
			if let Some(value) = confirmation.extracted {
				println!("Event value: {}", value);
			}
		}
		Ok(None) => println!("Settled off-chain; no receipt to follow"),
		Err(EngineError::Receipt(e)) => warn!(error = %e, "Receipt not resolved"),
		Err(e) => return Err(e.into()),
	}
	engine.reset();
	Ok(())
}

/// Writes `intent` as the JSON that `cancel` reads back.
pub async fn save_intent(intent: &Intent, path: &Path) -> Result<()> {
	let json = serde_json::to_string_pretty(intent).context("Failed to encode intent")?;
	tokio::fs::write(path, json)
		.await
		.with_context(|| format!("Failed to write intent to {:?}", path))
}

pub async fn cancel(engine: &SwapEngine, path: &Path) -> Result<()> {
	let content = tokio::fs::read_to_string(path)
		.await
		.with_context(|| format!("Failed to read intent from {:?}", path))?;
	let intent: Intent = serde_json::from_str(&content).context("Invalid intent JSON")?;
	if intent.is_expired(SystemClock.now_secs()) {
		println!("Intent expired at {}; it can no longer settle", intent.deadline);
		return Ok(());
	}

	let hash = engine.cancel_intent(&intent).await?;
	println!("Cancellation submitted: {}", hash);
	Ok(())
}

pub async fn refund(engine: &SwapEngine, token: &str) -> Result<()> {
	let token = resolve_token(engine, token)?;
	let pending = engine.pending_refund(token.address).await?;
	if pending.is_zero() {
		println!("No refund pending for {}", token.symbol);
		return Ok(());
	}
	println!("Claiming {} {}", human_amount(&token, pending), token.symbol);
	let hash = engine.claim_refund(token.address).await?;
	println!("Refund claim submitted: {}", hash);
	Ok(())
}

/// Builds the engine without touching the network, which runs every
/// implementation's schema check.
pub fn validate(config: SwapConfig) -> Result<()> {
	let chain_id = config.network.chain_id;
	let deployment = config.intent.deployment(chain_id);
	let tokens = config.tokens.len();
	SwapEngineBuilder::new(config)
		.build()
		.context("Configuration is invalid")?;

	println!("Configuration is valid");
	println!("  chain id:   {}", chain_id);
	println!("  tokens:     {}", tokens);
	match deployment {
		Some(address) => println!("  settlement: {}", address),
		None => println!("  settlement: none (permit swaps disabled)"),
	}
	Ok(())
}
