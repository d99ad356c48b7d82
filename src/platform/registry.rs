//! Lookup table from [`Platform`] to its adapter.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	platform::{Platform, PlatformAdapter},
};

/// Registered adapters, keyed by platform.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
	adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}
impl AdapterRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an adapter under the platform it reports, replacing any previous one.
	pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) -> &mut Self {
		self.adapters.insert(adapter.platform(), adapter);

		self
	}

	/// Builder-style variant of [`AdapterRegistry::register`].
	pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
		self.register(adapter);

		self
	}

	/// Resolves the adapter for a platform.
	pub fn get(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>, ConfigError> {
		self.adapters.get(&platform).cloned().ok_or(ConfigError::UnregisteredPlatform { platform })
	}

	/// Returns `true` when an adapter is registered for the platform.
	pub fn contains(&self, platform: Platform) -> bool {
		self.adapters.contains_key(&platform)
	}

	/// Registered platforms in declaration order.
	pub fn platforms(&self) -> Vec<Platform> {
		Platform::ALL.iter().copied().filter(|platform| self.contains(*platform)).collect()
	}
}
impl Debug for AdapterRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AdapterRegistry").field("platforms", &self.platforms()).finish()
	}
}
