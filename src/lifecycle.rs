//! Token lifecycle coordination with decrypt-on-use sealing, single-flight refresh, and
//! expiry sweeps.
//!
//! [`TokenLifecycle`] is the only component that opens sealed tokens outside an adapter
//! call. Every adapter operation runs through [`TokenLifecycle::with_decrypted_token`],
//! which re-seals the token once the operation finishes, fails, or is dropped. Operations
//! that write a token back to the store (refresh and validate) are serialized behind a
//! per-token guard, so concurrent callers observe one rotation and never persist secrets
//! read before it; the guard is never shared across tokens.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccountId, ConnectionSummary, PlatformToken, PrincipalId, TokenId},
	crypto::TokenCipher,
	error::{ConfigError, IntegrityError},
	obs::{self, OperationKind},
	platform::{
		AccountInfo, AdapterRegistry, OAuthTokenResponse, Platform, PlatformAdapter, PostAnalytics,
		PostContent, PublishResult, RateLimitInfo,
	},
	store::TokenStore,
};

const UNRESOLVED_ACCOUNT: &str = "unresolved";

/// Outcome of one [`TokenLifecycle::refresh_expiring`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSweep {
	/// Tokens refreshed (or found already fresh) and persisted.
	pub refreshed: Vec<TokenId>,
	/// Tokens whose principal must go through the authorization flow again.
	pub reauth_required: Vec<TokenId>,
	/// Tokens that failed for other reasons and may be retried by the next sweep.
	pub failed: Vec<TokenId>,
}
impl RefreshSweep {
	/// Number of tokens examined by the sweep.
	pub fn examined(&self) -> usize {
		self.refreshed.len() + self.reauth_required.len() + self.failed.len()
	}
}

/// Coordinates adapters, the credential cipher, and the token store.
#[derive(Clone)]
pub struct TokenLifecycle {
	store: Arc<dyn TokenStore>,
	cipher: TokenCipher,
	registry: AdapterRegistry,
	/// Shared metrics recorder for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	token_guards: Arc<Mutex<HashMap<TokenId, Arc<AsyncMutex<()>>>>>,
}
impl TokenLifecycle {
	/// Creates a coordinator over the provided collaborators.
	pub fn new(store: Arc<dyn TokenStore>, cipher: TokenCipher, registry: AdapterRegistry) -> Self {
		Self {
			store,
			cipher,
			registry,
			refresh_metrics: Default::default(),
			token_guards: Default::default(),
		}
	}

	/// Token store backing the coordinator.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Registered adapters.
	pub fn registry(&self) -> &AdapterRegistry {
		&self.registry
	}

	/// Runs `op` against the plaintext form of `token`, re-sealing it afterwards.
	///
	/// The token must be sealed on entry and is sealed again on every exit path: success,
	/// failure, and cancellation (dropping the returned future). When re-sealing fails the
	/// secrets are wiped instead and [`Error::Integrity`] is returned.
	pub async fn with_decrypted_token<T, F>(&self, token: &mut PlatformToken, op: F) -> Result<T>
	where
		F: AsyncFnOnce(&PlatformToken) -> Result<T>,
	{
		let guard = SealGuard::open(&self.cipher, token)?;
		let result = op(guard.token()).await;

		guard.seal()?;

		result
	}

	/// Builds the authorization URL for `platform`.
	pub fn authorization_url(&self, platform: Platform, state: &str, redirect_uri: &Url) -> Result<Url> {
		self.registry.get(platform)?.auth_redirect(state, redirect_uri)
	}

	/// Exchanges an authorization code for credentials without persisting them.
	pub async fn handle_callback(
		&self,
		platform: Platform,
		code: &str,
		redirect_uri: &Url,
	) -> Result<OAuthTokenResponse> {
		let adapter = self.registry.get(platform)?;

		obs::observe(
			platform,
			OperationKind::Callback,
			adapter.handle_oauth_callback(code, redirect_uri),
		)
		.await
	}

	/// Exchanges a code, resolves the platform account, and persists a sealed token.
	///
	/// `extra` entries (for example a Facebook `page_id`) are stored on the token.
	pub async fn connect(
		&self,
		principal: PrincipalId,
		platform: Platform,
		code: &str,
		redirect_uri: &Url,
		extra: BTreeMap<String, serde_json::Value>,
	) -> Result<ConnectionSummary> {
		let adapter = self.registry.get(platform)?;
		let response = obs::observe(
			platform,
			OperationKind::Callback,
			adapter.handle_oauth_callback(code, redirect_uri),
		)
		.await?;
		let mut builder = PlatformToken::builder(
			principal,
			platform,
			AccountId::new(UNRESOLVED_ACCOUNT).map_err(ConfigError::from)?,
		)
		.oauth_response(&response);

		for (key, value) in extra {
			builder = builder.extra(key, value);
		}

		let mut token = builder.build().map_err(ConfigError::from)?;
		let info = obs::observe(platform, OperationKind::AccountInfo, adapter.account_info(&token))
			.await
			.inspect_err(|_| token.scrub())?;

		token.account_id = AccountId::new(&info.id)
			.inspect_err(|_| token.scrub())
			.map_err(ConfigError::from)?;
		token.account_name = info.name;
		token.last_validated_at = Some(OffsetDateTime::now_utc());

		self.seal_fresh(&mut token)?;
		self.store.create(token.clone()).await?;

		#[cfg(feature = "tracing")]
		tracing::info!(
			platform = platform.as_str(),
			token_id = %token.id,
			"Platform account connected."
		);

		Ok(token.summary())
	}

	/// Publishes content with the stored token `id`.
	pub async fn publish(&self, id: TokenId, content: &PostContent) -> Result<PublishResult> {
		let (adapter, mut token) = self.load(id).await?;
		let platform = token.platform;

		self.with_decrypted_token(&mut token, async |open| {
			obs::observe(platform, OperationKind::Publish, adapter.post_content(open, content)).await
		})
		.await
	}

	/// Refreshes the stored token `id` when it is close to expiry, persisting rotated
	/// secrets.
	///
	/// Returns the sealed token as stored after the call. A token endpoint rejection that
	/// requires re-authentication invalidates the stored token.
	pub async fn refresh(&self, id: TokenId) -> Result<PlatformToken> {
		let guard = self.token_guard(id);
		let _singleflight = guard.lock().await;

		self.refresh_metrics.record_attempt();

		let result = self.refresh_locked(id).await;

		match &result {
			Ok(_) => self.refresh_metrics.record_success(),
			Err(_) => self.refresh_metrics.record_failure(),
		}

		result
	}

	/// Checks the stored token `id`; rejected tokens are invalidated, accepted ones are
	/// stamped with the validation instant.
	///
	/// Runs under the same per-token guard as [`TokenLifecycle::refresh`], so the token
	/// written back always carries the latest rotated secrets.
	pub async fn validate(&self, id: TokenId) -> Result<bool> {
		let guard = self.token_guard(id);
		let _exclusive = guard.lock().await;
		let (adapter, mut token) = self.load(id).await?;
		let platform = token.platform;
		let valid = self
			.with_decrypted_token(&mut token, async |open| {
				obs::observe(platform, OperationKind::Validate, adapter.validate_token(open)).await
			})
			.await?;
		let now = OffsetDateTime::now_utc();

		if valid {
			token.last_validated_at = Some(now);
			token.updated_at = now;

			self.store.update(token).await?;
		} else {
			self.invalidate(id, now, "validation rejected").await?;
		}

		Ok(valid)
	}

	/// Revokes the stored token `id` at the platform and invalidates it locally.
	pub async fn revoke(&self, id: TokenId) -> Result<()> {
		let (adapter, mut token) = self.load(id).await?;
		let platform = token.platform;

		self.with_decrypted_token(&mut token, async |open| {
			obs::observe(platform, OperationKind::Revoke, adapter.revoke_token(open)).await
		})
		.await?;
		self.invalidate(id, OffsetDateTime::now_utc(), "revoked").await?;

		Ok(())
	}

	/// Fetches the platform profile behind the stored token `id`.
	pub async fn account_info(&self, id: TokenId) -> Result<AccountInfo> {
		let (adapter, mut token) = self.load(id).await?;
		let platform = token.platform;

		self.with_decrypted_token(&mut token, async |open| {
			obs::observe(platform, OperationKind::AccountInfo, adapter.account_info(open)).await
		})
		.await
	}

	/// Fetches a rate-limit snapshot for the stored token `id`.
	pub async fn rate_limits(&self, id: TokenId) -> Result<RateLimitInfo> {
		let (adapter, mut token) = self.load(id).await?;
		let platform = token.platform;

		self.with_decrypted_token(&mut token, async |open| {
			obs::observe(platform, OperationKind::RateLimits, adapter.rate_limits(open)).await
		})
		.await
	}

	/// Fetches engagement counters for a post published with the stored token `id`.
	pub async fn post_analytics(&self, id: TokenId, post_id: &str) -> Result<PostAnalytics> {
		let (adapter, mut token) = self.load(id).await?;
		let platform = token.platform;

		self.with_decrypted_token(&mut token, async |open| {
			obs::observe(platform, OperationKind::Analytics, adapter.post_analytics(open, post_id))
				.await
		})
		.await
	}

	/// Valid, refreshable tokens expiring at or before `before`, soonest first, at most
	/// `limit` of them. Tokens are returned sealed.
	pub async fn select_expiring_soon(
		&self,
		before: OffsetDateTime,
		limit: usize,
	) -> Result<Vec<PlatformToken>> {
		Ok(self.store.select_expiring(before, limit).await?)
	}

	/// Refreshes every token returned by [`TokenLifecycle::select_expiring_soon`].
	///
	/// Individual failures are classified into the report rather than aborting the sweep;
	/// only the initial selection can fail the call.
	pub async fn refresh_expiring(&self, before: OffsetDateTime, limit: usize) -> Result<RefreshSweep> {
		let mut sweep = RefreshSweep::default();

		for token in self.select_expiring_soon(before, limit).await? {
			match self.refresh(token.id).await {
				Ok(_) => sweep.refreshed.push(token.id),
				Err(e) if e.requires_reauthentication() => sweep.reauth_required.push(token.id),
				Err(e) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(token_id = %token.id, error = %e, "Token refresh failed.");
					#[cfg(not(feature = "tracing"))]
					let _ = e;

					sweep.failed.push(token.id);
				},
			}
		}

		#[cfg(feature = "tracing")]
		tracing::info!(
			refreshed = sweep.refreshed.len(),
			reauth_required = sweep.reauth_required.len(),
			failed = sweep.failed.len(),
			"Refresh sweep finished."
		);

		Ok(sweep)
	}

	/// Drives `fut` until it completes or `cancel` fires.
	///
	/// Cancellation drops `fut`, aborting in-flight requests and backoff sleeps; tokens
	/// opened by the dropped operation are re-sealed by their guards.
	pub async fn until_cancelled<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T>
	where
		Fut: Future<Output = Result<T>>,
	{
		cancel.run_until_cancelled(fut).await.unwrap_or(Err(Error::Cancelled))
	}

	async fn refresh_locked(&self, id: TokenId) -> Result<PlatformToken> {
		let (adapter, mut token) = self.load(id).await?;
		let platform = token.platform;
		let outcome = self
			.with_decrypted_token(&mut token, async |open| {
				let rotated = obs::observe(
					platform,
					OperationKind::Refresh,
					adapter.refresh_token_if_needed(open),
				)
				.await?;
				let changed = rotated.access_token != open.access_token
					|| rotated.refresh_token != open.refresh_token
					|| rotated.expires_at != open.expires_at;

				Ok(changed.then_some(rotated))
			})
			.await;
		let rotated = match outcome {
			Ok(rotated) => rotated,
			Err(e) => {
				if matches!(e, Error::OAuthExchange { .. }) && e.requires_reauthentication() {
					self.invalidate(id, OffsetDateTime::now_utc(), "refresh rejected").await?;
					self.refresh_metrics.record_invalidation();
				}

				return Err(e);
			},
		};
		let Some(mut rotated) = rotated else {
			return Ok(token);
		};

		self.seal_fresh(&mut rotated)?;
		self.store.update(rotated.clone()).await?;

		#[cfg(feature = "tracing")]
		tracing::info!(platform = platform.as_str(), token_id = %id, "Token refreshed.");

		Ok(rotated)
	}

	async fn load(&self, id: TokenId) -> Result<(Arc<dyn PlatformAdapter>, PlatformToken)> {
		let token = self.store.fetch(id).await?.ok_or(Error::TokenNotFound { id })?;
		let adapter = self.registry.get(token.platform)?;

		Ok((adapter, token))
	}

	async fn invalidate(&self, id: TokenId, instant: OffsetDateTime, reason: &'static str) -> Result<()> {
		if self.store.invalidate(id, instant).await? {
			#[cfg(feature = "tracing")]
			tracing::warn!(token_id = %id, reason, "Token invalidated.");
		}
		#[cfg(not(feature = "tracing"))]
		let _ = reason;

		Ok(())
	}

	/// Seals a token that never went through [`SealGuard`], wiping it on failure.
	fn seal_fresh(&self, token: &mut PlatformToken) -> Result<(), IntegrityError> {
		self.cipher.encrypt_token(token).inspect_err(|_| token.scrub())
	}

	fn token_guard(&self, id: TokenId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.token_guards.lock();

		guards.entry(id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Debug for TokenLifecycle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenLifecycle")
			.field("registry", &self.registry)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

/// Keeps a token open for one operation and seals it again when released or dropped.
struct SealGuard<'a> {
	cipher: &'a TokenCipher,
	token: &'a mut PlatformToken,
	armed: bool,
}
impl<'a> SealGuard<'a> {
	fn open(cipher: &'a TokenCipher, token: &'a mut PlatformToken) -> Result<Self, IntegrityError> {
		cipher.decrypt_token(token)?;

		Ok(Self { cipher, token, armed: true })
	}

	fn token(&self) -> &PlatformToken {
		self.token
	}

	fn seal(mut self) -> Result<(), IntegrityError> {
		self.armed = false;

		Self::reseal(self.cipher, self.token)
	}

	fn reseal(cipher: &TokenCipher, token: &mut PlatformToken) -> Result<(), IntegrityError> {
		if token.is_sealed() {
			return Ok(());
		}

		cipher.encrypt_token(token).inspect_err(|_| token.scrub())
	}
}
impl Drop for SealGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			let _ = Self::reseal(self.cipher, self.token);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, store::MemoryStore};

	fn lifecycle() -> TokenLifecycle {
		TokenLifecycle::new(Arc::new(MemoryStore::default()), test_cipher(), AdapterRegistry::new())
	}

	#[tokio::test]
	async fn failed_operations_leave_the_token_sealed() {
		let lifecycle = lifecycle();
		let mut token = sealed_token(token_builder(Platform::LinkedIn, "team-1").access_token("AT1"));
		let sealed_access = token.access_token.clone();
		let err = lifecycle
			.with_decrypted_token(&mut token, async |open| {
				assert_eq!(open.access_token.expose(), "AT1");

				Err::<(), _>(Error::Cancelled)
			})
			.await
			.expect_err("The operation error should propagate.");

		assert!(matches!(err, Error::Cancelled));
		assert!(token.is_sealed());
		assert_ne!(token.access_token.expose(), "AT1");
		assert_ne!(token.access_token, sealed_access, "Re-sealing should use a fresh nonce.");
	}

	#[tokio::test]
	async fn dropped_operations_leave_the_token_sealed() {
		let lifecycle = lifecycle();
		let mut token = sealed_token(token_builder(Platform::LinkedIn, "team-1").access_token("AT1"));
		let cancel = CancellationToken::new();
		let trigger = cancel.clone();
		let result = TokenLifecycle::until_cancelled(
			&cancel,
			lifecycle.with_decrypted_token(&mut token, async |open| {
				assert!(!open.is_sealed());

				trigger.cancel();

				std::future::pending::<Result<()>>().await
			}),
		)
		.await;

		assert!(matches!(result, Err(Error::Cancelled)));
		assert!(token.is_sealed());
		assert_ne!(token.access_token.expose(), "AT1");
	}

	#[tokio::test]
	async fn plaintext_input_is_rejected_before_the_operation_runs() {
		let lifecycle = lifecycle();
		let mut token = token_builder(Platform::LinkedIn, "team-1")
			.access_token("AT1")
			.build()
			.expect("Plaintext fixture should build.");
		let err = lifecycle
			.with_decrypted_token(&mut token, async |_| -> Result<()> {
				panic!("Operation must not run for plaintext input.")
			})
			.await
			.expect_err("Plaintext input must be rejected.");

		assert!(matches!(err, Error::Integrity(IntegrityError::SealState { .. })));
	}

	#[tokio::test]
	async fn unknown_tokens_surface_not_found() {
		let id = TokenId::generate();

		assert!(matches!(
			lifecycle().publish(id, &PostContent::text("hello")).await,
			Err(Error::TokenNotFound { id: missing }) if missing == id
		));
	}

	#[test]
	fn sweep_reports_examined_count() {
		let sweep = RefreshSweep {
			refreshed: vec![TokenId::generate()],
			reauth_required: vec![TokenId::generate(), TokenId::generate()],
			failed: Vec::new(),
		};

		assert_eq!(sweep.examined(), 3);
	}
}
