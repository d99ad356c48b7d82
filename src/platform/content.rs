//! Value types exchanged across the adapter contract.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
};

/// Content submitted for publishing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
	/// Post body.
	pub text: String,
	/// Publicly reachable media references, uploaded by the adapter when present.
	#[serde(default)]
	pub media_urls: Vec<Url>,
	/// Optional link shared alongside the text.
	#[serde(default)]
	pub link: Option<Url>,
	/// Platform-specific options (visibility, titles, ...).
	#[serde(default)]
	pub options: BTreeMap<String, serde_json::Value>,
}
impl PostContent {
	/// Creates text-only content.
	pub fn text(text: impl Into<String>) -> Self {
		Self { text: text.into(), ..Default::default() }
	}

	/// Attaches media references.
	pub fn with_media(mut self, media_urls: impl IntoIterator<Item = Url>) -> Self {
		self.media_urls.extend(media_urls);

		self
	}

	/// Attaches a link.
	pub fn with_link(mut self, link: Url) -> Self {
		self.link = Some(link);

		self
	}

	/// Sets a platform-specific option.
	pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.options.insert(key.into(), value.into());

		self
	}

	/// Reads a string option.
	pub fn option_str(&self, key: &str) -> Option<&str> {
		self.options.get(key).and_then(serde_json::Value::as_str)
	}

	/// Text length in Unicode scalar values.
	pub fn text_length(&self) -> usize {
		self.text.chars().count()
	}

	/// Returns `true` when there is nothing to publish.
	pub fn is_empty(&self) -> bool {
		self.text.trim().is_empty() && self.media_urls.is_empty() && self.link.is_none()
	}
}

/// Normalized outcome of a publish attempt that reached the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
	/// Platform-assigned post identifier.
	pub post_id: String,
	/// Canonical URL of the post.
	pub url: Option<Url>,
	/// Publish instant.
	pub published_at: OffsetDateTime,
	/// Whether the platform accepted the post.
	pub success: bool,
	/// Platform rejection reason, when `success` is false.
	pub error: Option<String>,
	/// Platform-specific metadata.
	#[serde(default)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl PublishResult {
	/// Builds a successful result.
	pub fn published(post_id: impl Into<String>, url: Option<Url>, published_at: OffsetDateTime) -> Self {
		Self {
			post_id: post_id.into(),
			url,
			published_at,
			success: true,
			error: None,
			extra: BTreeMap::new(),
		}
	}

	/// Adds a metadata entry.
	pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.extra.insert(key.into(), value.into());

		self
	}
}

/// Rate-limit snapshot fetched from the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
	/// Requests allowed in the current window.
	pub limit: u32,
	/// Requests left in the current window.
	pub remaining: u32,
	/// Instant the window resets.
	pub reset_at: OffsetDateTime,
}

/// Platform-side account profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
	/// Platform-side account identifier.
	pub id: String,
	/// Display name.
	pub name: String,
	/// Handle or username, if the platform has one.
	pub username: Option<String>,
	/// Contact email, if granted.
	pub email: Option<String>,
	/// Profile picture.
	pub avatar_url: Option<Url>,
	/// Public profile page.
	pub profile_url: Option<Url>,
}

/// Engagement snapshot for a published post.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAnalytics {
	/// Platform-assigned post identifier.
	pub post_id: String,
	/// Likes or reactions.
	pub likes: u64,
	/// Comments.
	pub comments: u64,
	/// Shares or reposts.
	pub shares: u64,
	/// Impressions, when the platform reports them.
	pub impressions: Option<u64>,
}

/// Credentials returned by a token endpoint.
#[derive(Clone, PartialEq)]
pub struct OAuthTokenResponse {
	/// Access token.
	pub access_token: TokenSecret,
	/// Refresh token; absent for platforms that never issue one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token.
	pub expires_in: Option<Duration>,
	/// Granted scopes.
	pub scope: ScopeSet,
	/// Token type, when reported.
	pub token_type: Option<String>,
}
impl Debug for OAuthTokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthTokenResponse")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("scope", &self.scope)
			.field("token_type", &self.token_type)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn content_builders_and_emptiness() {
		let link = Url::parse("https://example.com/post").expect("Link fixture should parse.");

		assert!(PostContent::text("  ").is_empty());
		assert!(!PostContent::text("").with_link(link).is_empty());

		let content = PostContent::text("héllo").with_option("visibility", "CONNECTIONS");

		assert_eq!(content.text_length(), 5);
		assert_eq!(content.option_str("visibility"), Some("CONNECTIONS"));
	}

	#[test]
	fn token_response_debug_redacts() {
		let response = OAuthTokenResponse {
			access_token: TokenSecret::new("AT-secret"),
			refresh_token: Some(TokenSecret::new("RT-secret")),
			expires_in: Some(Duration::days(60)),
			scope: ScopeSet::default(),
			token_type: None,
		};
		let debug = format!("{response:?}");

		assert!(!debug.contains("AT-secret"));
		assert!(!debug.contains("RT-secret"));
	}
}
