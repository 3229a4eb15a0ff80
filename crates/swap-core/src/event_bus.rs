//! Broadcast channel carrying [`SwapEvent`]s to any number of observers.

use swap_types::SwapEvent;
use tokio::sync::broadcast;

/// Event bus for broadcasting engine events to multiple subscribers.
///
/// Slow subscribers lag and lose the oldest events once `capacity` is
/// exceeded; publishers never block.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<SwapEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Receives every event published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
		self.sender.subscribe()
	}

	/// Publishes to all current subscribers.
	///
	/// Fails only when nobody is subscribed, which callers usually ignore.
	pub fn publish(&self, event: SwapEvent) -> Result<(), broadcast::error::SendError<SwapEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use swap_types::SettlementEvent;

	#[tokio::test]
	async fn test_publish_reaches_every_subscriber() {
		let bus = EventBus::new(8);
		assert!(bus.publish(SwapEvent::Settlement(SettlementEvent::Reset)).is_err());

		let mut a = bus.subscribe();
		let mut b = bus.clone().subscribe();
		bus.publish(SwapEvent::Settlement(SettlementEvent::Reset)).unwrap();

		assert!(matches!(a.recv().await, Ok(SwapEvent::Settlement(SettlementEvent::Reset))));
		assert!(matches!(b.recv().await, Ok(SwapEvent::Settlement(SettlementEvent::Reset))));
	}
}
