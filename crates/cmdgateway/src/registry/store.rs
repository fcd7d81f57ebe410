// Registry store for hot-reloadable registry management

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use tracing::{error, info, warn};

use super::client::RegistryClient;
use super::compiled::CompiledRegistry;
use super::error::RegistryError;
use super::types::Registry;

/// Store for the compiled registry with hot-reload support.
///
/// Readers take an `Arc` snapshot and never block; reloads install a whole
/// new snapshot.
#[derive(Debug, Clone)]
pub struct RegistryStore {
	/// Current compiled registry (atomically swappable)
	current: Arc<ArcSwap<CompiledRegistry>>,
	/// Client for reloads (None means static registry)
	client: Option<RegistryClient>,
}

impl Default for RegistryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl RegistryStore {
	/// Create a new empty registry store
	pub fn new() -> Self {
		Self {
			current: Arc::new(ArcSwap::from_pointee(CompiledRegistry::empty())),
			client: None,
		}
	}

	/// Create a store holding a fixed registry with no reload source
	pub fn from_registry(registry: Registry) -> Result<Self, RegistryError> {
		let store = Self::new();
		store.update(registry)?;
		Ok(store)
	}

	/// Initial load from a file. Any failure is returned to the caller, who
	/// is expected to refuse to serve without a registry.
	pub async fn load(client: RegistryClient) -> Result<Self, RegistryError> {
		let registry = client.fetch().await?;
		let store = Self {
			current: Arc::new(ArcSwap::from_pointee(CompiledRegistry::compile(registry)?)),
			client: Some(client),
		};
		info!(target: "cmdgateway", "Registry loaded with {} commands", store.get().len());
		Ok(store)
	}

	/// Get the current snapshot
	pub fn get(&self) -> Arc<CompiledRegistry> {
		self.current.load_full()
	}

	/// Get the configured client
	pub fn client(&self) -> Option<&RegistryClient> {
		self.client.as_ref()
	}

	/// Compile and install a new registry
	pub fn update(&self, registry: Registry) -> Result<(), RegistryError> {
		let compiled = CompiledRegistry::compile(registry)?;
		self.current.store(Arc::new(compiled));
		info!(target: "cmdgateway", "Registry updated successfully");
		Ok(())
	}

	/// Re-read the source. On failure the previous snapshot stays active.
	pub async fn reload(&self) -> Result<(), RegistryError> {
		let Some(client) = &self.client else {
			return Ok(());
		};

		let result = match client.fetch().await {
			Ok(registry) => self.update(registry),
			Err(e) => Err(e),
		};
		if let Err(e) = &result {
			error!(target: "cmdgateway", "Failed to reload registry, keeping previous: {}", e);
		}
		result
	}

	/// Start the background poller. Returns None for a store without a
	/// file source. The task runs until the handle is aborted.
	pub fn spawn_poller(&self, interval: Duration) -> Option<tokio::task::JoinHandle<()>> {
		let client = self.client.clone()?;
		let store = self.clone();

		Some(tokio::spawn(async move {
			info!(
				target: "cmdgateway",
				"Polling registry file {} every {:?}",
				client.path().display(),
				interval
			);

			let mut tracker = ModTimeTracker::default();
			loop {
				tokio::time::sleep(interval).await;

				let modified = match client.modified().await {
					Ok(modified) => modified,
					Err(e) => {
						warn!(target: "cmdgateway", "Failed to stat registry file: {}", e);
						continue;
					},
				};

				if tracker.observe(modified) {
					info!(target: "cmdgateway", "Registry file changed, reloading...");
					// failure is logged by reload; the old snapshot stays
					let _ = store.reload().await;
				}
			}
		}))
	}
}

/// Tracks the last observed modification time of the registry file.
///
/// The first observation only sets the baseline; later observations report
/// a change when the timestamp is strictly later than the baseline.
#[derive(Debug, Default, Clone)]
pub struct ModTimeTracker {
	last: Option<SystemTime>,
}

impl ModTimeTracker {
	/// Record an observation, returning true when a reload is due
	pub fn observe(&mut self, modified: SystemTime) -> bool {
		let changed = self.last.is_some_and(|last| modified > last);
		self.last = Some(modified);
		changed
	}

	pub fn last(&self) -> Option<SystemTime> {
		self.last
	}
}
