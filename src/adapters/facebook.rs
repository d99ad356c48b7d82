//! Facebook page adapter.
//!
//! Posts are published on behalf of a page whose id lives in the token's extra bag
//! under `page_id`; the stored access token is the page token. [`CAPABILITIES`] declares
//! no refresh support, so every refresh surfaces [`Error::RefreshUnsupported`].
//! A video must be the only attachment of its post.
//!
//! Graph API throttling arrives as HTTP 400/403 with error codes 4, 17, 32, or 613
//! rather than 429, so those codes are mapped onto [`Error::RateLimited`] too.

// crates.io
use reqwest::Method;
// self
use crate::{
	_prelude::*,
	adapters::{self, Backoff, RetryPolicy, TokioBackoff},
	auth::{PlatformToken, ScopeSet},
	error::{ConfigError, ValidationError},
	http::{HttpTransport, TransportRequest, TransportResponse},
	oauth::OAuthClient,
	platform::{
		AccountInfo, AdapterFuture, OAuthTokenResponse, Platform, PlatformAdapter,
		PlatformCapabilities, PlatformDescriptor, PlatformDescriptorBuilder, PlatformQuirks,
		PostAnalytics, PostContent, PublishResult, RateLimitInfo,
	},
};

/// Facebook page post limits.
pub const CAPABILITIES: PlatformCapabilities = PlatformCapabilities {
	max_text_length: 63_206,
	max_media_count: 10,
	supports_images: true,
	supports_video: true,
	supports_multi_media: true,
	supports_scheduling: true,
	supports_hashtags: true,
	max_video_size: 10 * 1024 * 1024 * 1024,
	supports_refresh: false,
};

/// Extra-bag key holding the target page id.
pub const PAGE_ID_KEY: &str = "page_id";

const AUTHORIZATION_ENDPOINT: &str = "https://www.facebook.com/v19.0/dialog/oauth";
const TOKEN_ENDPOINT: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
const API_BASE: &str = "https://graph.facebook.com/v19.0/";
const DEFAULT_SCOPES: [&str; 3] = ["pages_manage_posts", "pages_read_engagement", "pages_show_list"];
const THROTTLING_CODES: [i64; 4] = [4, 17, 32, 613];
const INVALID_TOKEN_CODE: i64 = 190;

/// Adapter for publishing to a Facebook page.
pub struct FacebookAdapter {
	descriptor: PlatformDescriptor,
	transport: Arc<dyn HttpTransport>,
	retry: RetryPolicy,
	backoff: Arc<dyn Backoff>,
}
impl FacebookAdapter {
	/// Returns a descriptor builder pre-filled with Graph API endpoints and page scopes.
	pub fn descriptor_builder() -> Result<PlatformDescriptorBuilder, ConfigError> {
		Ok(PlatformDescriptor::builder(Platform::Facebook)
			.authorization_endpoint(Url::parse(AUTHORIZATION_ENDPOINT)?)
			.token_endpoint(Url::parse(TOKEN_ENDPOINT)?)
			.api_base(Url::parse(API_BASE)?)
			.scopes(ScopeSet::new(DEFAULT_SCOPES)?)
			.quirks(PlatformQuirks { scope_delimiter: ',', ..Default::default() }))
	}

	/// Creates an adapter from a Facebook descriptor and a shared transport.
	pub fn new(
		descriptor: PlatformDescriptor,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		if descriptor.platform != Platform::Facebook {
			return Err(ConfigError::UnsupportedPlatform { platform: descriptor.platform });
		}

		Ok(Self {
			descriptor,
			transport,
			retry: RetryPolicy::default(),
			backoff: Arc::new(TokioBackoff),
		})
	}

	/// Overrides the publish retry policy.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides how the publish loop waits between attempts.
	pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
		self.backoff = backoff;

		self
	}

	fn oauth(&self) -> OAuthClient<'_> {
		OAuthClient::new(&self.descriptor, self.transport.as_ref())
	}

	fn api_request(&self, method: Method, path: &str, token: &PlatformToken) -> Result<TransportRequest> {
		let url = self.descriptor.api_url(path).map_err(ConfigError::from)?;

		Ok(TransportRequest::new(method, url).bearer(&token.access_token))
	}

	async fn call(
		&self,
		operation: &'static str,
		request: TransportRequest,
	) -> Result<TransportResponse> {
		let response = adapters::send(self.transport.as_ref(), operation, request).await?;
		let throttled = !response.is_success()
			&& graph_error_code(&response).is_some_and(|code| THROTTLING_CODES.contains(&code));

		if throttled {
			return Err(Error::RateLimited {
				platform: Platform::Facebook,
				retry_after: response.retry_after(),
			});
		}

		adapters::expect_success(Platform::Facebook, operation, response)
	}

	async fn publish(&self, token: &PlatformToken, content: &PostContent) -> Result<PublishResult> {
		adapters::ensure_usable(token)?;
		CAPABILITIES.validate(Platform::Facebook, content)?;

		let page_id = token
			.extra_str(PAGE_ID_KEY)
			.or_else(|| content.option_str(PAGE_ID_KEY))
			.filter(|id| !id.is_empty())
			.ok_or(ValidationError::MissingOption { platform: Platform::Facebook, key: PAGE_ID_KEY })?;

		if content.media_urls.len() > 1 && content.media_urls.iter().any(adapters::is_video) {
			return Err(ValidationError::MixedMedia { platform: Platform::Facebook }.into());
		}

		let page = adapters::path_segment(page_id);
		let request = match content.media_urls.as_slice() {
			[] => self
				.api_request(Method::POST, &format!("{page}/feed"), token)?
				.json(&FeedPost::new(content, Vec::new()))?,
			[single] if adapters::is_video(single) => self
				.api_request(Method::POST, &format!("{page}/videos"), token)?
				.json(&VideoPost { file_url: single.as_str(), description: &content.text })?,
			[single] => self
				.api_request(Method::POST, &format!("{page}/photos"), token)?
				.json(&PhotoPost { url: single.as_str(), caption: Some(&content.text), published: true })?,
			many => {
				let attached = self.upload_photos(token, &page, many).await?;

				self.api_request(Method::POST, &format!("{page}/feed"), token)?
					.json(&FeedPost::new(content, attached))?
			},
		};
		let created = self
			.retry
			.run(Platform::Facebook, self.backoff.as_ref(), |_| self.call("publish", request.clone()))
			.await?
			.json::<GraphCreated>("publish")?;
		let post_id = created.post_id.unwrap_or(created.id);
		let url = Url::parse(&format!("https://www.facebook.com/{post_id}")).ok();

		Ok(PublishResult::published(post_id, url, OffsetDateTime::now_utc())
			.with_extra(PAGE_ID_KEY, page_id))
	}

	async fn upload_photos(
		&self,
		token: &PlatformToken,
		page: &str,
		sources: &[Url],
	) -> Result<Vec<AttachedMedia>> {
		let mut attached = Vec::with_capacity(sources.len());

		for source in sources {
			let request = self
				.api_request(Method::POST, &format!("{page}/photos"), token)?
				.json(&PhotoPost { url: source.as_str(), caption: None, published: false })?;
			let uploaded = self.call("media_upload", request).await?.json::<GraphCreated>("media_upload")?;

			attached.push(AttachedMedia { media_fbid: uploaded.id });
		}

		Ok(attached)
	}

	async fn me(&self, token: &PlatformToken, fields: &str) -> Result<TransportResponse> {
		adapters::ensure_usable(token)?;

		let request = self.api_request(Method::GET, &format!("me?fields={fields}"), token)?;

		self.call("account_info", request).await
	}

	async fn validate(&self, token: &PlatformToken) -> Result<bool> {
		match self.me(token, "id").await {
			Ok(_) => Ok(true),
			Err(Error::Api { status: 401, .. }) => Ok(false),
			Err(Error::Api { status: 400, body, .. })
				if graph_error_code_from(body.as_bytes()) == Some(INVALID_TOKEN_CODE) =>
				Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn analytics(&self, token: &PlatformToken, post_id: &str) -> Result<PostAnalytics> {
		adapters::ensure_usable(token)?;

		let encoded = adapters::path_segment(post_id);
		let request = self.api_request(
			Method::GET,
			&format!("{encoded}?fields=likes.summary(true),comments.summary(true),shares"),
			token,
		)?;
		let stats = self.call("analytics", request).await?.json::<GraphPostStats>("post_stats")?;

		Ok(PostAnalytics {
			post_id: post_id.to_owned(),
			likes: stats.likes.map(|edge| edge.summary.total_count).unwrap_or_default(),
			comments: stats.comments.map(|edge| edge.summary.total_count).unwrap_or_default(),
			shares: stats.shares.map(|shares| shares.count).unwrap_or_default(),
			impressions: None,
		})
	}
}
impl Debug for FacebookAdapter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FacebookAdapter")
			.field("api_base", &self.descriptor.endpoints.api_base.as_str())
			.field("retry", &self.retry)
			.finish()
	}
}
impl PlatformAdapter for FacebookAdapter {
	fn platform(&self) -> Platform {
		Platform::Facebook
	}

	fn capabilities(&self) -> PlatformCapabilities {
		CAPABILITIES
	}

	fn auth_redirect(&self, state: &str, redirect_uri: &Url) -> Result<Url> {
		Ok(self.oauth().authorization_url(state, redirect_uri, &[]))
	}

	fn handle_oauth_callback<'a>(
		&'a self,
		code: &'a str,
		redirect_uri: &'a Url,
	) -> AdapterFuture<'a, OAuthTokenResponse> {
		Box::pin(async move { self.oauth().exchange_code(code, redirect_uri).await })
	}

	fn post_content<'a>(
		&'a self,
		token: &'a PlatformToken,
		content: &'a PostContent,
	) -> AdapterFuture<'a, PublishResult> {
		Box::pin(self.publish(token, content))
	}

	fn refresh_token_if_needed<'a>(
		&'a self,
		token: &'a PlatformToken,
	) -> AdapterFuture<'a, PlatformToken> {
		Box::pin(adapters::refresh_if_needed(
			Platform::Facebook,
			&CAPABILITIES,
			self.oauth(),
			self.descriptor.quirks.refresh_window,
			token,
		))
	}

	fn account_info<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, AccountInfo> {
		Box::pin(async move {
			let profile = self.me(token, "id,name,email").await?.json::<GraphProfile>("profile")?;

			Ok(AccountInfo {
				profile_url: Url::parse(&format!("https://www.facebook.com/{}", profile.id)).ok(),
				id: profile.id,
				name: profile.name,
				username: None,
				email: profile.email,
				avatar_url: None,
			})
		})
	}

	fn validate_token<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, bool> {
		Box::pin(self.validate(token))
	}

	fn revoke_token<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, ()> {
		Box::pin(async move {
			token.ensure_plaintext()?;

			let request = self.api_request(Method::DELETE, "me/permissions", token)?;

			self.call("revoke", request).await?;

			Ok(())
		})
	}

	fn rate_limits<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, RateLimitInfo> {
		Box::pin(async move {
			let response = self.me(token, "id").await?;

			Ok(rate_limits_from_app_usage(&response, OffsetDateTime::now_utc()))
		})
	}

	fn post_analytics<'a>(
		&'a self,
		token: &'a PlatformToken,
		post_id: &'a str,
	) -> AdapterFuture<'a, PostAnalytics> {
		Box::pin(self.analytics(token, post_id))
	}
}

#[derive(Debug, Serialize)]
struct FeedPost<'a> {
	message: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	link: Option<&'a str>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	attached_media: Vec<AttachedMedia>,
}
impl<'a> FeedPost<'a> {
	fn new(content: &'a PostContent, attached_media: Vec<AttachedMedia>) -> Self {
		Self { message: &content.text, link: content.link.as_ref().map(Url::as_str), attached_media }
	}
}

#[derive(Debug, Serialize)]
struct PhotoPost<'a> {
	url: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	caption: Option<&'a str>,
	published: bool,
}

#[derive(Debug, Serialize)]
struct VideoPost<'a> {
	file_url: &'a str,
	description: &'a str,
}

#[derive(Debug, Serialize)]
struct AttachedMedia {
	media_fbid: String,
}

#[derive(Debug, Deserialize)]
struct GraphCreated {
	id: String,
	#[serde(default)]
	post_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphProfile {
	id: String,
	#[serde(default)]
	name: String,
	#[serde(default)]
	email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphPostStats {
	#[serde(default)]
	likes: Option<GraphEdge>,
	#[serde(default)]
	comments: Option<GraphEdge>,
	#[serde(default)]
	shares: Option<GraphShares>,
}

#[derive(Debug, Deserialize)]
struct GraphEdge {
	summary: GraphSummary,
}

#[derive(Debug, Deserialize)]
struct GraphSummary {
	#[serde(default)]
	total_count: u64,
}

#[derive(Debug, Deserialize)]
struct GraphShares {
	#[serde(default)]
	count: u64,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
	error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
	code: i64,
}

#[derive(Debug, Default, Deserialize)]
struct AppUsage {
	#[serde(default)]
	call_count: u32,
	#[serde(default)]
	total_time: u32,
	#[serde(default)]
	total_cputime: u32,
}

fn graph_error_code(response: &TransportResponse) -> Option<i64> {
	graph_error_code_from(&response.body)
}

fn graph_error_code_from(body: &[u8]) -> Option<i64> {
	serde_json::from_slice::<GraphErrorEnvelope>(body).ok().map(|envelope| envelope.error.code)
}

// `X-App-Usage` reports percentages of a rolling one-hour window.
fn rate_limits_from_app_usage(response: &TransportResponse, now: OffsetDateTime) -> RateLimitInfo {
	let usage = response
		.header("x-app-usage")
		.and_then(|raw| serde_json::from_str::<AppUsage>(raw).ok())
		.unwrap_or_default();
	let used = usage.call_count.max(usage.total_time).max(usage.total_cputime).min(100);

	RateLimitInfo { limit: 100, remaining: 100 - used, reset_at: now + Duration::hours(1) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn app_usage_header_drives_the_snapshot() {
		let now = OffsetDateTime::now_utc();
		let response = TransportResponse::new(200, "{}")
			.with_header("X-App-Usage", "{\"call_count\":28,\"total_time\":35,\"total_cputime\":9}");
		let snapshot = rate_limits_from_app_usage(&response, now);

		assert_eq!(snapshot.limit, 100);
		assert_eq!(snapshot.remaining, 65);
		assert_eq!(snapshot.reset_at, now + Duration::hours(1));

		let untouched = rate_limits_from_app_usage(&TransportResponse::new(200, "{}"), now);

		assert_eq!(untouched.remaining, 100);
	}

	#[test]
	fn graph_error_codes_are_extracted() {
		assert_eq!(graph_error_code_from(b"{\"error\":{\"code\":613,\"message\":\"slow down\"}}"), Some(613));
		assert_eq!(graph_error_code_from(b"<html>"), None);
	}

	#[test]
	fn feed_payload_omits_empty_fields() {
		let content = PostContent::text("Hello page");
		let json = serde_json::to_value(FeedPost::new(&content, Vec::new()))
			.expect("Payload should serialize.");

		assert_eq!(json, serde_json::json!({ "message": "Hello page" }));
	}
}
