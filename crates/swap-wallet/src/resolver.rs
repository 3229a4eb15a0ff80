//! Ordered wallet resolution.
//!
//! The active wallet is found in a fixed order: the explicitly connected
//! wallet, then the list of discovered wallets (preferring a named one), then
//! the process-wide default. Components receive the resolver as a dependency
//! instead of reaching for a global.

use crate::{WalletError, WalletInterface};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Where a resolved wallet came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletSource {
	Connector,
	Discovered(String),
	Global,
}

#[derive(Clone)]
pub struct ResolvedWallet {
	pub wallet: Arc<dyn WalletInterface>,
	pub source: WalletSource,
}

struct DiscoveredWallet {
	name: String,
	wallet: Arc<dyn WalletInterface>,
}

pub struct WalletResolver {
	connector: RwLock<Option<Arc<dyn WalletInterface>>>,
	discovered: RwLock<Vec<DiscoveredWallet>>,
	global: Option<Arc<dyn WalletInterface>>,
	preferred: Option<String>,
}

impl Default for WalletResolver {
	fn default() -> Self {
		Self::new()
	}
}

impl WalletResolver {
	pub fn new() -> Self {
		Self {
			connector: RwLock::new(None),
			discovered: RwLock::new(Vec::new()),
			global: None,
			preferred: None,
		}
	}

	/// Resolver that always yields `wallet`.
	pub fn fixed(wallet: Arc<dyn WalletInterface>) -> Self {
		Self::new().with_global(wallet)
	}

	pub fn with_global(mut self, wallet: Arc<dyn WalletInterface>) -> Self {
		self.global = Some(wallet);
		self
	}

	/// Name to prefer when scanning discovered wallets.
	pub fn with_preferred(mut self, name: impl Into<String>) -> Self {
		self.preferred = Some(name.into());
		self
	}

	pub async fn connect(&self, wallet: Arc<dyn WalletInterface>) {
		*self.connector.write().await = Some(wallet);
	}

	pub async fn disconnect(&self) {
		*self.connector.write().await = None;
	}

	pub async fn announce(&self, name: impl Into<String>, wallet: Arc<dyn WalletInterface>) {
		let name = name.into();
		let mut discovered = self.discovered.write().await;
		discovered.retain(|w| w.name != name);
		discovered.push(DiscoveredWallet { name, wallet });
	}

	pub async fn resolve(&self) -> Result<ResolvedWallet, WalletError> {
		if let Some(wallet) = self.connector.read().await.clone() {
			debug!("Resolved wallet from connector");
			return Ok(ResolvedWallet {
				wallet,
				source: WalletSource::Connector,
			});
		}

		{
			let discovered = self.discovered.read().await;
			let preferred = self.preferred.as_ref().and_then(|name| {
				discovered
					.iter()
					.find(|w| w.name.eq_ignore_ascii_case(name))
			});
			if let Some(found) = preferred.or_else(|| discovered.first()) {
				debug!(name = %found.name, "Resolved wallet from discovered list");
				return Ok(ResolvedWallet {
					wallet: found.wallet.clone(),
					source: WalletSource::Discovered(found.name.clone()),
				});
			}
		}

		if let Some(wallet) = &self.global {
			debug!("Resolved global wallet");
			return Ok(ResolvedWallet {
				wallet: wallet.clone(),
				source: WalletSource::Global,
			});
		}

		Err(WalletError::NotConnected)
	}

	/// Shorthand for the resolved wallet itself.
	pub async fn wallet(&self) -> Result<Arc<dyn WalletInterface>, WalletError> {
		Ok(self.resolve().await?.wallet)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::simulated::SimulatedWallet;

	fn wallet() -> Arc<dyn WalletInterface> {
		Arc::new(SimulatedWallet::random(1))
	}

	#[tokio::test]
	async fn test_resolution_order() {
		let resolver = WalletResolver::new().with_global(wallet());
		assert_eq!(resolver.resolve().await.unwrap().source, WalletSource::Global);

		resolver.announce("Rabby", wallet()).await;
		resolver.announce("MetaMask", wallet()).await;
		assert_eq!(
			resolver.resolve().await.unwrap().source,
			WalletSource::Discovered("Rabby".to_string())
		);

		resolver.connect(wallet()).await;
		assert_eq!(resolver.resolve().await.unwrap().source, WalletSource::Connector);

		resolver.disconnect().await;
		assert!(matches!(
			resolver.resolve().await.unwrap().source,
			WalletSource::Discovered(_)
		));
	}

	#[tokio::test]
	async fn test_preferred_discovered_wallet() {
		let resolver = WalletResolver::new().with_preferred("metamask");
		resolver.announce("Rabby", wallet()).await;
		resolver.announce("MetaMask", wallet()).await;
		assert_eq!(
			resolver.resolve().await.unwrap().source,
			WalletSource::Discovered("MetaMask".to_string())
		);
	}

	#[tokio::test]
	async fn test_nothing_to_resolve() {
		let resolver = WalletResolver::new();
		assert!(matches!(resolver.resolve().await, Err(WalletError::NotConnected)));
	}
}
