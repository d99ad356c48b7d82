//! Built-in platform adapters and the publish retry loop they share.

pub mod facebook;
pub mod linkedin;
pub mod retry;

pub use facebook::FacebookAdapter;
pub use linkedin::LinkedInAdapter;
pub use retry::*;

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::PlatformToken,
	error::ValidationError,
	http::{HttpTransport, TransportRequest, TransportResponse},
	oauth::OAuthClient,
	platform::{Platform, PlatformCapabilities},
};

/// Sends a request, mapping transport failures onto [`Error::Transient`].
pub(crate) async fn send(
	transport: &dyn HttpTransport,
	operation: &'static str,
	request: TransportRequest,
) -> Result<TransportResponse> {
	transport.execute(request).await.map_err(|e| Error::from(e.into_transient(operation)))
}

/// Maps non-success statuses onto [`Error::RateLimited`] or [`Error::Api`].
pub(crate) fn expect_success(
	platform: Platform,
	operation: &'static str,
	response: TransportResponse,
) -> Result<TransportResponse> {
	match response.status {
		_ if response.is_success() => Ok(response),
		429 => Err(Error::RateLimited { platform, retry_after: response.retry_after() }),
		status => Err(Error::Api { platform, operation, status, body: response.body_text() }),
	}
}

/// Adapters only accept valid tokens whose secrets are open.
pub(crate) fn ensure_usable(token: &PlatformToken) -> Result<()> {
	token.ensure_valid()?;
	token.ensure_plaintext()?;

	Ok(())
}

/// Refreshes `token` once it is inside `window` of its expiry.
///
/// Platforms without refresh support, and tokens without a refresh secret, fail with
/// [`Error::RefreshUnsupported`] before any request is sent.
pub(crate) async fn refresh_if_needed(
	platform: Platform,
	capabilities: &PlatformCapabilities,
	oauth: OAuthClient<'_>,
	window: Duration,
	token: &PlatformToken,
) -> Result<PlatformToken> {
	ensure_usable(token)?;

	let refresh_token = token
		.refresh_token
		.as_ref()
		.filter(|secret| capabilities.supports_refresh && !secret.is_empty())
		.ok_or(Error::RefreshUnsupported { platform })?;
	let now = OffsetDateTime::now_utc();

	if !token.expires_within(window, now) {
		return Ok(token.clone());
	}

	let response = oauth.refresh(refresh_token).await?;

	Ok(token.rotated(response, now))
}

/// Rejects fetched video bodies larger than `max` bytes.
///
/// A declared `Content-Length` is trusted first so oversized uploads fail without
/// inspecting the body.
pub(crate) fn ensure_video_size(
	platform: Platform,
	max: u64,
	fetched: &TransportResponse,
) -> Result<(), ValidationError> {
	let size = fetched.header_u64("content-length").unwrap_or(0).max(fetched.body.len() as u64);

	if size > max {
		return Err(ValidationError::VideoTooLarge { platform, size, max });
	}

	Ok(())
}

/// Percent-encodes one path segment of a Graph or REST URL.
pub(crate) fn path_segment(raw: &str) -> String {
	form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Rough media classification by file extension.
pub(crate) fn is_video(url: &Url) -> bool {
	const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "m4v", "webm", "avi"];

	url.path()
		.rsplit_once('.')
		.is_some_and(|(_, ext)| VIDEO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
