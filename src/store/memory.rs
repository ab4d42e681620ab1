//! Thread-safe in-memory [`TokenStore`] implementation for tests and single-process runs.

// self
use crate::{
	_prelude::*,
	store::{CachedToken, StoreFuture, StoreKey, TokenStore},
};

/// Keeps snapshots in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<StoreKey, CachedToken>>>);
impl MemoryStore {
	/// Number of stored snapshots.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing has been stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Synchronous lookup for assertions.
	pub fn get(&self, key: &StoreKey) -> Option<CachedToken> {
		self.0.read().get(key).cloned()
	}
}
impl TokenStore for MemoryStore {
	fn save<'a>(&'a self, key: &'a StoreKey, token: CachedToken) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.write().insert(key.clone(), token);

			Ok(())
		})
	}

	fn load<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<CachedToken>> {
		Box::pin(async move { Ok(self.get(key)) })
	}
}
