//! The contract every platform integration satisfies.
//!
//! Every method receiving a [`PlatformToken`] expects plaintext secrets; tokens are
//! opened by the coordinator for the duration of a single call.

// self
use crate::{
	_prelude::*,
	auth::PlatformToken,
	platform::{
		AccountInfo, OAuthTokenResponse, Platform, PlatformCapabilities, PostAnalytics,
		PostContent, PublishResult, RateLimitInfo,
	},
};

/// Boxed future returned by adapter operations.
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Uniform interface over a third-party social platform.
pub trait PlatformAdapter
where
	Self: Send + Sync,
{
	/// Platform served by this adapter.
	fn platform(&self) -> Platform;

	/// Static limits and feature flags.
	fn capabilities(&self) -> PlatformCapabilities;

	/// Builds the authorization URL embedding `state` and the requested scopes.
	fn auth_redirect(&self, state: &str, redirect_uri: &Url) -> Result<Url>;

	/// Exchanges a one-time authorization code for credentials.
	///
	/// Non-success responses surface as [`Error::OAuthExchange`]; unparseable bodies as
	/// [`Error::Decode`].
	fn handle_oauth_callback<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> AdapterFuture<'a, OAuthTokenResponse>;

	/// Validates, uploads media, and publishes with bounded retry on rate limiting.
	fn post_content<'a>(
		&'a self,
		token: &'a PlatformToken,
		content: &'a PostContent,
	) -> AdapterFuture<'a, PublishResult>;

	/// Returns the token unchanged unless it is close to expiry, otherwise refreshes it.
	///
	/// Platforms without refresh support return [`Error::RefreshUnsupported`].
	fn refresh_token_if_needed<'a>(
		&'a self,
		token: &'a PlatformToken,
	) -> AdapterFuture<'a, PlatformToken>;

	/// Fetches the platform-side profile of the token owner.
	fn account_info<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, AccountInfo>;

	/// Returns `false` when the platform rejects the token as unauthorized.
	fn validate_token<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, bool>;

	/// Revokes the token at the platform.
	fn revoke_token<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, ()>;

	/// Fetches a rate-limit snapshot from the platform.
	fn rate_limits<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, RateLimitInfo>;

	/// Fetches engagement counters for a published post.
	fn post_analytics<'a>(
		&'a self,
		token: &'a PlatformToken,
		post_id: &'a str,
	) -> AdapterFuture<'a, PostAnalytics>;
}
