//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{PlatformToken, PrincipalId, TokenId},
	store::{self, StoreError, StoreFuture, TokenStore, TokenTable},
};

type StoreMap = Arc<RwLock<TokenTable>>;

/// Thread-safe storage backend that keeps sealed tokens in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored tokens, invalidated ones included.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Reads a token regardless of its validity.
	pub fn peek(&self, id: TokenId) -> Option<PlatformToken> {
		self.0.read().get(&id).cloned()
	}
}
impl TokenStore for MemoryStore {
	fn create(&self, token: PlatformToken) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { store::create_in(&mut map.write(), token) })
	}

	fn fetch(&self, id: TokenId) -> StoreFuture<'_, Option<PlatformToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::fetch_from(&map.read(), id)) })
	}

	fn update(&self, token: PlatformToken) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { store::update_in(&mut map.write(), token) })
	}

	fn invalidate(&self, id: TokenId, instant: OffsetDateTime) -> StoreFuture<'_, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::invalidate_in(&mut map.write(), id, instant)) })
	}

	fn delete(&self, id: TokenId) -> StoreFuture<'_, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(&id).is_some()) })
	}

	fn list_for_principal<'a>(
		&'a self,
		principal: &'a PrincipalId,
	) -> StoreFuture<'a, Vec<PlatformToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::list_from(&map.read(), principal)) })
	}

	fn select_expiring(
		&self,
		before: OffsetDateTime,
		limit: usize,
	) -> StoreFuture<'_, Vec<PlatformToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::select_expiring_from(&map.read(), before, limit)) })
	}
}
