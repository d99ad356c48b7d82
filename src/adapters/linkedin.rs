//! LinkedIn member adapter; the reference implementation of the publish pipeline.
//!
//! Publishing runs as a fixed state machine: validate against [`CAPABILITIES`],
//! resolve the member URN through `/userinfo`, upload media (register an upload,
//! fetch the bytes, push them to LinkedIn) when present, then create the UGC post
//! under the shared [`RetryPolicy`]. A `201 Created` carries the post URN in the
//! `x-restli-id` header.

// crates.io
use reqwest::Method;
// self
use crate::{
	_prelude::*,
	adapters::{self, Backoff, RetryPolicy, TokioBackoff},
	auth::PlatformToken,
	error::{ConfigError, DecodeError},
	http::{HttpTransport, TransportRequest, TransportResponse},
	oauth::OAuthClient,
	platform::{
		AccountInfo, AdapterFuture, OAuthTokenResponse, Platform, PlatformAdapter,
		PlatformCapabilities, PlatformDescriptor, PlatformDescriptorBuilder, PlatformQuirks,
		PostAnalytics, PostContent, PublishResult, RateLimitInfo,
	},
};

/// LinkedIn limits for member shares.
pub const CAPABILITIES: PlatformCapabilities = PlatformCapabilities {
	max_text_length: 3_000,
	max_media_count: 9,
	supports_images: true,
	supports_video: true,
	supports_multi_media: true,
	supports_scheduling: false,
	supports_hashtags: true,
	max_video_size: 200 * 1024 * 1024,
	supports_refresh: true,
};

/// Daily share quota reported when LinkedIn omits rate-limit headers.
pub const DEFAULT_DAILY_QUOTA: u32 = 150;

const AUTHORIZATION_ENDPOINT: &str = "https://www.linkedin.com/oauth/v2/authorization";
const TOKEN_ENDPOINT: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const REVOCATION_ENDPOINT: &str = "https://www.linkedin.com/oauth/v2/revoke";
const API_BASE: &str = "https://api.linkedin.com/v2/";
const DEFAULT_SCOPES: [&str; 4] = ["email", "openid", "profile", "w_member_social"];
const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

/// Adapter for publishing as a LinkedIn member.
pub struct LinkedInAdapter {
	descriptor: PlatformDescriptor,
	transport: Arc<dyn HttpTransport>,
	retry: RetryPolicy,
	backoff: Arc<dyn Backoff>,
}
impl LinkedInAdapter {
	/// Returns a descriptor builder pre-filled with LinkedIn's production endpoints and
	/// default scopes; callers supply client credentials.
	pub fn descriptor_builder() -> Result<PlatformDescriptorBuilder, ConfigError> {
		Ok(PlatformDescriptor::builder(Platform::LinkedIn)
			.authorization_endpoint(Url::parse(AUTHORIZATION_ENDPOINT)?)
			.token_endpoint(Url::parse(TOKEN_ENDPOINT)?)
			.revocation_endpoint(Url::parse(REVOCATION_ENDPOINT)?)
			.api_base(Url::parse(API_BASE)?)
			.scopes(crate::auth::ScopeSet::new(DEFAULT_SCOPES)?)
			.quirks(PlatformQuirks {
				api_version: Some(RESTLI_PROTOCOL_VERSION.into()),
				refresh_window: Duration::days(7),
				..Default::default()
			}))
	}

	/// Creates an adapter from a LinkedIn descriptor and a shared transport.
	pub fn new(
		descriptor: PlatformDescriptor,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		if descriptor.platform != Platform::LinkedIn {
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

	/// Descriptor this adapter was built from.
	pub fn descriptor(&self) -> &PlatformDescriptor {
		&self.descriptor
	}

	fn oauth(&self) -> OAuthClient<'_> {
		OAuthClient::new(&self.descriptor, self.transport.as_ref())
	}

	fn api_request(&self, method: Method, path: &str, token: &PlatformToken) -> Result<TransportRequest> {
		let url = self.descriptor.api_url(path).map_err(ConfigError::from)?;
		let version =
			self.descriptor.quirks.api_version.as_deref().unwrap_or(RESTLI_PROTOCOL_VERSION);

		Ok(TransportRequest::new(method, url)
			.bearer(&token.access_token)
			.header("x-restli-protocol-version", version))
	}

	async fn call(
		&self,
		operation: &'static str,
		request: TransportRequest,
	) -> Result<TransportResponse> {
		let response = adapters::send(self.transport.as_ref(), operation, request).await?;

		adapters::expect_success(Platform::LinkedIn, operation, response)
	}

	async fn userinfo(&self, token: &PlatformToken) -> Result<(UserInfo, TransportResponse)> {
		let request = self.api_request(Method::GET, "userinfo", token)?;
		let response = self.call("account_info", request).await?;
		let info = response.json::<UserInfo>("userinfo")?;

		if info.sub.is_empty() {
			return Err(DecodeError::MissingField { context: "userinfo", field: "sub" }.into());
		}

		Ok((info, response))
	}

	async fn upload_media(
		&self,
		token: &PlatformToken,
		author: &str,
		media_urls: &[Url],
	) -> Result<Vec<MediaHandle>> {
		let mut handles = Vec::with_capacity(media_urls.len());

		for source in media_urls {
			let video = adapters::is_video(source);
			let recipe = if video {
				"urn:li:digitalmediaRecipe:feedshare-video"
			} else {
				"urn:li:digitalmediaRecipe:feedshare-image"
			};
			let register = RegisterUploadRequest {
				register_upload_request: RegisterUpload {
					recipes: [recipe],
					owner: author,
					service_relationships: [ServiceRelationship {
						relationship_type: "OWNER",
						identifier: "urn:li:userGeneratedContent",
					}],
				},
			};
			let request = self
				.api_request(Method::POST, "assets?action=registerUpload", token)?
				.json(&register)?;
			let registered = self
				.call("media_register", request)
				.await?
				.json::<RegisterUploadResponse>("register_upload")?
				.value;
			let fetched = adapters::send(
				self.transport.as_ref(),
				"media_fetch",
				TransportRequest::get(source.clone()),
			)
			.await?;
			let fetched = adapters::expect_success(Platform::LinkedIn, "media_fetch", fetched)?;

			if video {
				adapters::ensure_video_size(
					Platform::LinkedIn,
					CAPABILITIES.max_video_size,
					&fetched,
				)?;
			}

			let content_type =
				fetched.header("content-type").unwrap_or("application/octet-stream").to_owned();
			let upload = TransportRequest::new(
				Method::PUT,
				registered.upload_mechanism.http_request.upload_url,
			)
			.bearer(&token.access_token)
			.bytes(&content_type, fetched.body);

			self.call("media_upload", upload).await?;

			handles.push(MediaHandle { asset: registered.asset, video });
		}

		Ok(handles)
	}

	async fn publish(&self, token: &PlatformToken, content: &PostContent) -> Result<PublishResult> {
		adapters::ensure_usable(token)?;
		CAPABILITIES.validate(Platform::LinkedIn, content)?;

		let (identity, _) = self.userinfo(token).await?;
		let author = format!("urn:li:person:{}", identity.sub);
		let handles = if content.media_urls.is_empty() {
			Vec::new()
		} else {
			self.upload_media(token, &author, &content.media_urls).await?
		};
		let post = UgcPost::new(&author, content, &handles);
		let request = self.api_request(Method::POST, "ugcPosts", token)?.json(&post)?;
		let response = self
			.retry
			.run(Platform::LinkedIn, self.backoff.as_ref(), |_| self.call("publish", request.clone()))
			.await?;
		let post_id = match response.header("x-restli-id") {
			Some(id) if !id.is_empty() => id.to_owned(),
			_ => response
				.json::<CreatedPost>("publish")
				.ok()
				.and_then(|created| created.id)
				.ok_or(DecodeError::MissingField { context: "publish", field: "x-restli-id" })?,
		};
		let url = Url::parse(&format!("https://www.linkedin.com/feed/update/{post_id}/")).ok();

		Ok(PublishResult::published(post_id, url, OffsetDateTime::now_utc())
			.with_extra("author", author)
			.with_extra("media_count", handles.len()))
	}

	async fn refresh(&self, token: &PlatformToken) -> Result<PlatformToken> {
		adapters::refresh_if_needed(
			Platform::LinkedIn,
			&CAPABILITIES,
			self.oauth(),
			self.descriptor.quirks.refresh_window,
			token,
		)
		.await
	}

	async fn validate(&self, token: &PlatformToken) -> Result<bool> {
		adapters::ensure_usable(token)?;

		match self.userinfo(token).await {
			Ok(_) => Ok(true),
			Err(Error::Api { status: 401, .. }) => Ok(false),
			Err(e) => Err(e),
		}
	}

	async fn rate_limit_snapshot(&self, token: &PlatformToken) -> Result<RateLimitInfo> {
		adapters::ensure_usable(token)?;

		let (_, response) = self.userinfo(token).await?;

		Ok(rate_limits_from_headers(&response, OffsetDateTime::now_utc()))
	}

	async fn analytics(&self, token: &PlatformToken, post_id: &str) -> Result<PostAnalytics> {
		adapters::ensure_usable(token)?;

		let encoded = adapters::path_segment(post_id);
		let request = self.api_request(Method::GET, &format!("socialActions/{encoded}"), token)?;
		let actions = self.call("analytics", request).await?.json::<SocialActions>("social_actions")?;

		Ok(PostAnalytics {
			post_id: post_id.to_owned(),
			likes: actions.likes_summary.map(|summary| summary.total_likes).unwrap_or_default(),
			comments: actions
				.comments_summary
				.map(|summary| summary.aggregated_total_comments)
				.unwrap_or_default(),
			shares: 0,
			impressions: None,
		})
	}
}
impl Debug for LinkedInAdapter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LinkedInAdapter")
			.field("api_base", &self.descriptor.endpoints.api_base.as_str())
			.field("retry", &self.retry)
			.finish()
	}
}
impl PlatformAdapter for LinkedInAdapter {
	fn platform(&self) -> Platform {
		Platform::LinkedIn
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
		Box::pin(self.refresh(token))
	}

	fn account_info<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, AccountInfo> {
		Box::pin(async move {
			adapters::ensure_usable(token)?;

			let (info, _) = self.userinfo(token).await?;

			Ok(info.into_account())
		})
	}

	fn validate_token<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, bool> {
		Box::pin(self.validate(token))
	}

	fn revoke_token<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, ()> {
		Box::pin(async move {
			token.ensure_plaintext()?;
			self.oauth().revoke(&token.access_token).await?;

			Ok(())
		})
	}

	fn rate_limits<'a>(&'a self, token: &'a PlatformToken) -> AdapterFuture<'a, RateLimitInfo> {
		Box::pin(self.rate_limit_snapshot(token))
	}

	fn post_analytics<'a>(
		&'a self,
		token: &'a PlatformToken,
		post_id: &'a str,
	) -> AdapterFuture<'a, PostAnalytics> {
		Box::pin(self.analytics(token, post_id))
	}
}

#[derive(Debug)]
struct MediaHandle {
	asset: String,
	video: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UgcPost<'a> {
	author: &'a str,
	lifecycle_state: &'static str,
	specific_content: SpecificContent<'a>,
	visibility: Visibility<'a>,
}
impl<'a> UgcPost<'a> {
	fn new(author: &'a str, content: &'a PostContent, handles: &'a [MediaHandle]) -> Self {
		let (category, media) = if !handles.is_empty() {
			let category = if handles.iter().any(|handle| handle.video) {
				MediaCategory::Video
			} else {
				MediaCategory::Image
			};
			let media = handles
				.iter()
				.map(|handle| ShareMedia {
					status: "READY",
					media: Some(handle.asset.as_str()),
					original_url: None,
				})
				.collect();

			(category, media)
		} else if let Some(link) = content.link.as_ref() {
			(
				MediaCategory::Article,
				vec![ShareMedia { status: "READY", media: None, original_url: Some(link.as_str()) }],
			)
		} else {
			(MediaCategory::None, Vec::new())
		};

		Self {
			author,
			lifecycle_state: "PUBLISHED",
			specific_content: SpecificContent {
				share_content: ShareContent {
					share_commentary: ShareCommentary { text: &content.text },
					share_media_category: category,
					media,
				},
			},
			visibility: Visibility {
				member_network: content.option_str("visibility").unwrap_or("PUBLIC"),
			},
		}
	}
}

#[derive(Debug, Serialize)]
struct SpecificContent<'a> {
	#[serde(rename = "com.linkedin.ugc.ShareContent")]
	share_content: ShareContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareContent<'a> {
	share_commentary: ShareCommentary<'a>,
	share_media_category: MediaCategory,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	media: Vec<ShareMedia<'a>>,
}

#[derive(Debug, Serialize)]
struct ShareCommentary<'a> {
	text: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum MediaCategory {
	None,
	Image,
	Video,
	Article,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareMedia<'a> {
	status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	media: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	original_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Visibility<'a> {
	#[serde(rename = "com.linkedin.ugc.MemberNetworkVisibility")]
	member_network: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUploadRequest<'a> {
	register_upload_request: RegisterUpload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUpload<'a> {
	recipes: [&'static str; 1],
	owner: &'a str,
	service_relationships: [ServiceRelationship; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRelationship {
	relationship_type: &'static str,
	identifier: &'static str,
}

#[derive(Debug, Deserialize)]
struct RegisterUploadResponse {
	value: RegisteredUpload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredUpload {
	asset: String,
	upload_mechanism: UploadMechanism,
}

#[derive(Debug, Deserialize)]
struct UploadMechanism {
	#[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
	http_request: UploadHttpRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadHttpRequest {
	upload_url: Url,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
	#[serde(default)]
	id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
	sub: String,
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	given_name: Option<String>,
	#[serde(default)]
	family_name: Option<String>,
	#[serde(default)]
	email: Option<String>,
	#[serde(default)]
	picture: Option<Url>,
}
impl UserInfo {
	fn into_account(self) -> AccountInfo {
		let name = self.name.unwrap_or_else(|| {
			[self.given_name.as_deref(), self.family_name.as_deref()]
				.into_iter()
				.flatten()
				.collect::<Vec<_>>()
				.join(" ")
		});

		AccountInfo {
			id: self.sub,
			name,
			username: None,
			email: self.email,
			avatar_url: self.picture,
			profile_url: None,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialActions {
	#[serde(default)]
	likes_summary: Option<LikesSummary>,
	#[serde(default)]
	comments_summary: Option<CommentsSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikesSummary {
	#[serde(default)]
	total_likes: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentsSummary {
	#[serde(default)]
	aggregated_total_comments: u64,
}

fn rate_limits_from_headers(response: &TransportResponse, now: OffsetDateTime) -> RateLimitInfo {
	let next_midnight = now.replace_time(time::Time::MIDNIGHT) + Duration::days(1);
	let limit = response
		.header_u64("x-ratelimit-limit")
		.and_then(|value| u32::try_from(value).ok())
		.unwrap_or(DEFAULT_DAILY_QUOTA);
	let remaining = response
		.header_u64("x-ratelimit-remaining")
		.and_then(|value| u32::try_from(value).ok())
		.unwrap_or(limit);
	let reset_at = response
		.header_u64("x-ratelimit-reset")
		.and_then(|secs| i64::try_from(secs).ok())
		.and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
		.unwrap_or(next_midnight);

	RateLimitInfo { limit, remaining: remaining.min(limit), reset_at }
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn ugc_payload_shapes() {
		let text = PostContent::text("Hello LinkedIn");
		let post = UgcPost::new("urn:li:person:abc", &text, &[]);
		let json = serde_json::to_value(&post).expect("Payload should serialize.");

		assert_eq!(json["lifecycleState"], "PUBLISHED");
		assert_eq!(
			json["specificContent"]["com.linkedin.ugc.ShareContent"]["shareMediaCategory"],
			"NONE"
		);
		assert!(json["specificContent"]["com.linkedin.ugc.ShareContent"].get("media").is_none());
		assert_eq!(json["visibility"]["com.linkedin.ugc.MemberNetworkVisibility"], "PUBLIC");

		let link = Url::parse("https://example.com/article").expect("Link fixture should parse.");
		let article = PostContent::text("Read this").with_link(link);
		let json = serde_json::to_value(UgcPost::new("urn:li:person:abc", &article, &[]))
			.expect("Payload should serialize.");
		let share = &json["specificContent"]["com.linkedin.ugc.ShareContent"];

		assert_eq!(share["shareMediaCategory"], "ARTICLE");
		assert_eq!(share["media"][0]["originalUrl"], "https://example.com/article");

		let handles = [MediaHandle { asset: "urn:li:digitalmediaAsset:1".into(), video: false }];
		let json = serde_json::to_value(UgcPost::new("urn:li:person:abc", &text, &handles))
			.expect("Payload should serialize.");
		let share = &json["specificContent"]["com.linkedin.ugc.ShareContent"];

		assert_eq!(share["shareMediaCategory"], "IMAGE");
		assert_eq!(share["media"][0]["media"], "urn:li:digitalmediaAsset:1");
		assert!(share["media"][0].get("originalUrl").is_none());
	}

	#[test]
	fn rate_limits_prefer_headers_and_fall_back_to_the_quota() {
		let now = macros::datetime!(2026-03-01 15:30 UTC);
		let fallback = rate_limits_from_headers(&TransportResponse::new(200, "{}"), now);

		assert_eq!(fallback.limit, DEFAULT_DAILY_QUOTA);
		assert_eq!(fallback.remaining, DEFAULT_DAILY_QUOTA);
		assert_eq!(fallback.reset_at, macros::datetime!(2026-03-02 00:00 UTC));

		let response = TransportResponse::new(200, "{}")
			.with_header("X-RateLimit-Limit", "100")
			.with_header("X-RateLimit-Remaining", "42")
			.with_header("X-RateLimit-Reset", "1772409600");
		let snapshot = rate_limits_from_headers(&response, now);

		assert_eq!(snapshot.limit, 100);
		assert_eq!(snapshot.remaining, 42);
		assert_eq!(snapshot.reset_at.unix_timestamp(), 1_772_409_600);
	}

	#[test]
	fn account_name_falls_back_to_given_and_family_names() {
		let info = UserInfo {
			sub: "abc".into(),
			name: None,
			given_name: Some("Ada".into()),
			family_name: Some("Lovelace".into()),
			email: None,
			picture: None,
		};

		assert_eq!(info.into_account().name, "Ada Lovelace");
	}
}
