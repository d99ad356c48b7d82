//! Simple file-backed [`TokenStore`] for lightweight deployments and bots.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{PlatformToken, PrincipalId, TokenId},
	store::{self, StoreError, StoreFuture, TokenStore, TokenTable},
};

/// Persists sealed tokens to a JSON file after each mutation.
///
/// Mutations are applied to a copy of the table and only become visible once the
/// snapshot has been written, so a failed write leaves memory and disk in agreement.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<TokenTable>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<TokenTable, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let tokens: Vec<PlatformToken> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		if let Some(token) = tokens.iter().find(|token| !token.is_sealed()) {
			return Err(StoreError::PlaintextRejected { id: token.id });
		}

		Ok(tokens.into_iter().map(|token| (token.id, token)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, contents: &TokenTable) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut snapshot = contents.values().collect::<Vec<_>>();

		snapshot.sort_by_key(|token| (token.created_at, token.id));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	/// Applies `mutate` to a working copy, persisting and committing it only when the
	/// mutation reports a change.
	fn mutate<T>(
		&self,
		mutate: impl FnOnce(&mut TokenTable) -> Result<(T, bool), StoreError>,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let mut working = guard.clone();
		let (value, changed) = mutate(&mut working)?;

		if changed {
			self.persist(&working)?;

			*guard = working;
		}

		Ok(value)
	}
}
impl TokenStore for FileStore {
	fn create(&self, token: PlatformToken) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|table| store::create_in(table, token).map(|()| ((), true)))
		})
	}

	fn fetch(&self, id: TokenId) -> StoreFuture<'_, Option<PlatformToken>> {
		Box::pin(async move { Ok(store::fetch_from(&self.inner.read(), id)) })
	}

	fn update(&self, token: PlatformToken) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|table| store::update_in(table, token).map(|()| ((), true)))
		})
	}

	fn invalidate(&self, id: TokenId, instant: OffsetDateTime) -> StoreFuture<'_, bool> {
		Box::pin(async move {
			self.mutate(|table| {
				let changed = store::invalidate_in(table, id, instant);

				Ok((changed, changed))
			})
		})
	}

	fn delete(&self, id: TokenId) -> StoreFuture<'_, bool> {
		Box::pin(async move {
			self.mutate(|table| {
				let removed = table.remove(&id).is_some();

				Ok((removed, removed))
			})
		})
	}

	fn list_for_principal<'a>(
		&'a self,
		principal: &'a PrincipalId,
	) -> StoreFuture<'a, Vec<PlatformToken>> {
		Box::pin(async move { Ok(store::list_from(&self.inner.read(), principal)) })
	}

	fn select_expiring(
		&self,
		before: OffsetDateTime,
		limit: usize,
	) -> StoreFuture<'_, Vec<PlatformToken>> {
		Box::pin(async move { Ok(store::select_expiring_from(&self.inner.read(), before, limit)) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::{_preludet::*, platform::Platform};

	fn temp_path() -> PathBuf {
		let unique = format!(
			"social_broker_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn create_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let token = sealed_token(
			token_builder(Platform::LinkedIn, "team-1")
				.access_token("AT1")
				.refresh_token("RT1")
				.expires_in(Duration::days(60)),
		);
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.create(token.clone()))
			.expect("Failed to save fixture token to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.fetch(token.id))
			.expect("Failed to fetch fixture token from file store.")
			.expect("File store lost token after reopen.");

		assert!(fetched.is_sealed());
		assert_eq!(fetched.access_token.expose(), token.access_token.expose());
		assert_eq!(fetched.expires_at, token.expires_at);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn rejected_writes_leave_the_snapshot_untouched() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let plaintext = token_builder(Platform::LinkedIn, "team-1")
			.access_token("AT1")
			.build()
			.expect("Plaintext fixture should build.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let err = rt
			.block_on(store.create(plaintext.clone()))
			.expect_err("Plaintext tokens must be rejected.");

		assert_eq!(err, StoreError::PlaintextRejected { id: plaintext.id });
		assert!(!path.exists());
	}
}
