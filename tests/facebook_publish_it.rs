#![cfg(feature = "test")]

// crates.io
use reqwest::Method;
// self
use social_broker::{
	_preludet::*,
	adapters::{FacebookAdapter, facebook::PAGE_ID_KEY},
	auth::PlatformToken,
	error::ValidationError,
	http::TransportResponse,
	platform::{Platform, PlatformAdapter, PostContent},
};

fn adapter(transport: &ScriptedTransport, backoff: &RecordingBackoff) -> FacebookAdapter {
	FacebookAdapter::new(
		descriptor_at(Platform::Facebook, "https://mock.facebook.test"),
		Arc::new(transport.clone()),
	)
	.expect("Facebook adapter should accept a Facebook descriptor.")
	.with_backoff(Arc::new(backoff.clone()))
}

fn page_token(page_id: Option<&str>) -> PlatformToken {
	let mut builder = token_builder(Platform::Facebook, "team-1").access_token("EAAG-page");

	if let Some(page_id) = page_id {
		builder = builder.extra(PAGE_ID_KEY, page_id);
	}

	builder.build().expect("Facebook token fixture should build.")
}

#[tokio::test]
async fn missing_page_id_is_rejected_before_any_request() {
	let transport = ScriptedTransport::repeating(TransportResponse::new(200, "{\"id\":\"1\"}"));
	let backoff = RecordingBackoff::default();
	let err = adapter(&transport, &backoff)
		.post_content(&page_token(None), &PostContent::text("Hello page"))
		.await
		.expect_err("Publishing without a page id must fail.");

	assert!(matches!(
		err,
		Error::Validation(ValidationError::MissingOption { platform: Platform::Facebook, key: "page_id" })
	));
	assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn text_posts_go_to_the_page_feed() {
	let transport =
		ScriptedTransport::new([TransportResponse::new(200, "{\"id\":\"1050_2001\"}")]);
	let backoff = RecordingBackoff::default();
	let result = adapter(&transport, &backoff)
		.post_content(&page_token(Some("1050")), &PostContent::text("Hello page"))
		.await
		.expect("Feed publish should succeed.");

	assert_eq!(result.post_id, "1050_2001");
	assert_eq!(result.extra.get("page_id").and_then(|value| value.as_str()), Some("1050"));

	let request = transport.requests().remove(0);

	assert_eq!(request.url.path(), "/v2/1050/feed");
	assert_eq!(request.header_value("authorization"), Some("Bearer EAAG-page"));
	assert!(request.body_text().contains("\"message\":\"Hello page\""));
}

#[tokio::test]
async fn page_id_can_come_from_the_post_options() {
	let transport = ScriptedTransport::new([TransportResponse::new(
		200,
		"{\"id\":\"77\",\"post_id\":\"1050_77\"}",
	)]);
	let backoff = RecordingBackoff::default();
	let content = PostContent::text("A photo")
		.with_media([test_url("https://cdn.example.com/photo.png")])
		.with_option(PAGE_ID_KEY, "1050");
	let result = adapter(&transport, &backoff)
		.post_content(&page_token(None), &content)
		.await
		.expect("Photo publish should succeed.");

	assert_eq!(result.post_id, "1050_77");
	assert_eq!(transport.requests().remove(0).url.path(), "/v2/1050/photos");
}

#[tokio::test]
async fn throttling_error_codes_are_retried_like_rate_limits() {
	let transport = ScriptedTransport::new([
		TransportResponse::new(400, "{\"error\":{\"code\":613,\"message\":\"Calls to this api have exceeded the rate limit.\"}}"),
		TransportResponse::new(200, "{\"id\":\"1050_3\"}"),
	]);
	let backoff = RecordingBackoff::default();
	let result = adapter(&transport, &backoff)
		.post_content(&page_token(Some("1050")), &PostContent::text("Hello again"))
		.await
		.expect("Publish should succeed after throttling.");

	assert_eq!(result.post_id, "1050_3");
	assert_eq!(backoff.delays(), [Duration::seconds(5)]);
}

#[tokio::test]
async fn refresh_follows_the_declared_capability() {
	let transport = ScriptedTransport::default();
	let backoff = RecordingBackoff::default();
	let adapter = adapter(&transport, &backoff);
	let token = token_builder(Platform::Facebook, "team-1")
		.access_token("EAAG-page")
		.refresh_token("RT-unused")
		.expires_in(Duration::minutes(1))
		.build()
		.expect("Facebook token fixture should build.");
	let err = adapter
		.refresh_token_if_needed(&token)
		.await
		.expect_err("Facebook tokens cannot be refreshed.");

	assert!(!adapter.capabilities().supports_refresh);
	assert!(matches!(err, Error::RefreshUnsupported { platform: Platform::Facebook }));
	assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn videos_cannot_join_multi_media_posts() {
	let transport = ScriptedTransport::repeating(TransportResponse::new(200, "{\"id\":\"1\"}"));
	let backoff = RecordingBackoff::default();
	let content = PostContent::text("Mixed").with_media([
		test_url("https://cdn.example.com/photo.png"),
		test_url("https://cdn.example.com/clip.mp4"),
	]);
	let err = adapter(&transport, &backoff)
		.post_content(&page_token(Some("1050")), &content)
		.await
		.expect_err("Video combined with a photo must fail.");

	assert!(matches!(
		err,
		Error::Validation(ValidationError::MixedMedia { platform: Platform::Facebook })
	));
	assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn page_ids_are_escaped_in_graph_paths() {
	let transport =
		ScriptedTransport::new([TransportResponse::new(200, "{\"id\":\"1050_9\"}")]);
	let backoff = RecordingBackoff::default();

	adapter(&transport, &backoff)
		.post_content(&page_token(Some("10/50?x")), &PostContent::text("Escaped"))
		.await
		.expect("Feed publish should succeed.");

	let request = transport.requests().remove(0);

	assert_eq!(request.url.path(), "/v2/10%2F50%3Fx/feed");
	assert_eq!(request.url.query(), None);
}

#[tokio::test]
async fn analytics_decode_graph_summaries() {
	let transport = ScriptedTransport::new([TransportResponse::new(
		200,
		"{\"id\":\"1050_77\",\"likes\":{\"summary\":{\"total_count\":5}},\"comments\":{\"summary\":{\"total_count\":2}},\"shares\":{\"count\":1}}",
	)]);
	let backoff = RecordingBackoff::default();
	let analytics = adapter(&transport, &backoff)
		.post_analytics(&page_token(Some("1050")), "1050_77")
		.await
		.expect("Analytics should decode.");

	assert_eq!(analytics.post_id, "1050_77");
	assert_eq!((analytics.likes, analytics.comments, analytics.shares), (5, 2, 1));
	assert_eq!(analytics.impressions, None);

	let request = transport.requests().remove(0);

	assert_eq!(request.method, Method::GET);
	assert_eq!(request.url.path(), "/v2/1050_77");
	assert_eq!(
		request.url.query(),
		Some("fields=likes.summary(true),comments.summary(true),shares")
	);
}

#[tokio::test]
async fn revocation_deletes_granted_permissions() {
	let transport =
		ScriptedTransport::new([TransportResponse::new(200, "{\"success\":true}")]);
	let backoff = RecordingBackoff::default();

	adapter(&transport, &backoff)
		.revoke_token(&page_token(Some("1050")))
		.await
		.expect("Revocation should succeed.");

	let request = transport.requests().remove(0);

	assert_eq!(request.method, Method::DELETE);
	assert_eq!(request.url.path(), "/v2/me/permissions");
	assert_eq!(request.header_value("authorization"), Some("Bearer EAAG-page"));
}

#[tokio::test]
async fn expired_sessions_fail_validation() {
	let transport = ScriptedTransport::new([TransportResponse::new(
		400,
		"{\"error\":{\"code\":190,\"message\":\"Error validating access token\"}}",
	)]);
	let backoff = RecordingBackoff::default();
	let valid = adapter(&transport, &backoff)
		.validate_token(&page_token(Some("1050")))
		.await
		.expect("Validation should map the session error.");

	assert!(!valid);
}
