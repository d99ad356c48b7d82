//! Persistence contract for platform tokens and the built-in store implementations.
//!
//! Stores only ever hold sealed tokens: writes carrying plaintext secrets are
//! rejected with [`StoreError::PlaintextRejected`]. Invalidated tokens are excluded
//! from every lookup and accept no further writes except a hard delete.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{PlatformToken, PrincipalId, TokenId},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

pub(crate) type TokenTable = HashMap<TokenId, PlatformToken>;

/// Storage backend contract for sealed platform tokens.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Inserts a new token; identifiers must be unique.
	fn create(&self, token: PlatformToken) -> StoreFuture<'_, ()>;

	/// Fetches a valid token by identifier.
	fn fetch(&self, id: TokenId) -> StoreFuture<'_, Option<PlatformToken>>;

	/// Replaces a valid token with a new sealed version.
	fn update(&self, token: PlatformToken) -> StoreFuture<'_, ()>;

	/// Marks a token invalid; returns `false` when it was missing or already invalid.
	fn invalidate(&self, id: TokenId, instant: OffsetDateTime) -> StoreFuture<'_, bool>;

	/// Removes a token regardless of validity; returns `false` when it was missing.
	fn delete(&self, id: TokenId) -> StoreFuture<'_, bool>;

	/// Lists valid tokens owned by a principal, oldest first.
	fn list_for_principal<'a>(
		&'a self,
		principal: &'a PrincipalId,
	) -> StoreFuture<'a, Vec<PlatformToken>>;

	/// Valid, refreshable tokens expiring at or before `before`, soonest first, at most
	/// `limit` of them.
	fn select_expiring(
		&self,
		before: OffsetDateTime,
		limit: usize,
	) -> StoreFuture<'_, Vec<PlatformToken>>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// A write carried plaintext secrets.
	#[error("Token {id} has plaintext secrets and cannot be persisted.")]
	PlaintextRejected {
		/// Offending token.
		id: TokenId,
	},
	/// A token with the same identifier already exists.
	#[error("Token {id} already exists.")]
	Duplicate {
		/// Conflicting identifier.
		id: TokenId,
	},
	/// No token exists for the identifier.
	#[error("Token {id} does not exist.")]
	Missing {
		/// Identifier that failed to resolve.
		id: TokenId,
	},
	/// The token is invalidated and accepts no further writes.
	#[error("Token {id} is invalidated and can only be deleted.")]
	Invalidated {
		/// Invalidated token.
		id: TokenId,
	},
}

fn ensure_sealed(token: &PlatformToken) -> Result<(), StoreError> {
	if token.is_sealed() { Ok(()) } else { Err(StoreError::PlaintextRejected { id: token.id }) }
}

pub(crate) fn create_in(table: &mut TokenTable, token: PlatformToken) -> Result<(), StoreError> {
	ensure_sealed(&token)?;

	if table.contains_key(&token.id) {
		return Err(StoreError::Duplicate { id: token.id });
	}

	table.insert(token.id, token);

	Ok(())
}

pub(crate) fn fetch_from(table: &TokenTable, id: TokenId) -> Option<PlatformToken> {
	table.get(&id).filter(|token| token.is_valid).cloned()
}

pub(crate) fn update_in(table: &mut TokenTable, token: PlatformToken) -> Result<(), StoreError> {
	ensure_sealed(&token)?;

	match table.get(&token.id) {
		None => Err(StoreError::Missing { id: token.id }),
		Some(existing) if !existing.is_valid || !token.is_valid =>
			Err(StoreError::Invalidated { id: token.id }),
		Some(_) => {
			table.insert(token.id, token);

			Ok(())
		},
	}
}

pub(crate) fn invalidate_in(table: &mut TokenTable, id: TokenId, instant: OffsetDateTime) -> bool {
	match table.get_mut(&id) {
		Some(token) if token.is_valid => {
			token.invalidate(instant);

			true
		},
		_ => false,
	}
}

pub(crate) fn list_from(table: &TokenTable, principal: &PrincipalId) -> Vec<PlatformToken> {
	let mut tokens = table
		.values()
		.filter(|token| token.is_valid && &token.principal == principal)
		.cloned()
		.collect::<Vec<_>>();

	tokens.sort_by_key(|token| (token.created_at, token.id));

	tokens
}

pub(crate) fn select_expiring_from(table: &TokenTable, before: OffsetDateTime, limit: usize) -> Vec<PlatformToken> {
	let mut tokens = table
		.values()
		.filter(|token| {
			token.is_valid && token.can_refresh() && token.expires_at.is_some_and(|at| at <= before)
		})
		.cloned()
		.collect::<Vec<_>>();

	tokens.sort_by_key(|token| (token.expires_at, token.id));
	tokens.truncate(limit);

	tokens
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as _;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("database unreachable"));

		let source = broker_error
			.source()
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn store_error_can_be_serialized() {
		let id = TokenId::generate();
		let payload = serde_json::to_string(&StoreError::Invalidated { id })
			.expect("StoreError should serialize to JSON.");
		let round_trip: StoreError =
			serde_json::from_str(&payload).expect("Serialized error should deserialize from JSON.");

		assert_eq!(round_trip, StoreError::Invalidated { id });
	}
}
