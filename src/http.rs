//! Injected HTTP transport shared by every adapter.
//!
//! Adapters never own a global client. They receive an `Arc<dyn HttpTransport>` at
//! construction, so the connection pool is shared read-only across concurrent calls
//! and tests can substitute a scripted transport. [`ReqwestHttpClient`] is the
//! production implementation; it applies an overall per-call timeout and never
//! follows redirects.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{Method, redirect::Policy};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, DecodeError, TransientError},
};

/// Default overall timeout applied to every outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

type BoxError = Box<dyn StdError + Send + Sync>;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Minimal HTTP client abstraction the adapters depend on.
///
/// Implementations must be safe for concurrent use; a single instance is shared by
/// every adapter built from the same configuration.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes one request and returns the full response, whatever its status.
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// Transport-level failure; HTTP error statuses are not failures at this layer.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The per-call timeout elapsed.
	#[error("Request timed out.")]
	Timeout,
	/// DNS, TCP, TLS, or request-building failure.
	#[error("Network failure.")]
	Network(#[source] BoxError),
}
impl TransportError {
	/// Wraps an arbitrary transport failure.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network(Box::new(src))
	}

	/// Maps the failure onto the broker taxonomy, labelled with the operation.
	pub fn into_transient(self, operation: &'static str) -> TransientError {
		match self {
			Self::Timeout => TransientError::Timeout { operation },
			Self::Network(source) => TransientError::Network { operation, source },
		}
	}
}

/// Outbound request description.
#[derive(Clone)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Header pairs; `content-type` is always present.
	pub headers: Vec<(String, String)>,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
}
impl TransportRequest {
	/// Starts a request with an explicit JSON content type and no body.
	pub fn new(method: Method, url: Url) -> Self {
		Self {
			method,
			url,
			headers: vec![("content-type".into(), "application/json".into())],
			body: None,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(url: Url) -> Self {
		Self::new(Method::DELETE, url)
	}

	/// Sets or replaces a header.
	pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
		self.headers.push((name.to_ascii_lowercase(), value.into()));

		self
	}

	/// Adds a bearer `authorization` header.
	pub fn bearer(self, token: &TokenSecret) -> Self {
		let value = format!("Bearer {}", token.expose());

		self.header("authorization", value)
	}

	/// Serializes `payload` as the JSON body.
	pub fn json<T>(mut self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(payload).map_err(ConfigError::PayloadEncode)?);

		Ok(self.header("content-type", "application/json"))
	}

	/// Encodes `pairs` as an `application/x-www-form-urlencoded` body.
	pub fn form<'p>(mut self, pairs: impl IntoIterator<Item = (&'p str, &'p str)>) -> Self {
		let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish();

		self.body = Some(body.into_bytes());

		self.header("content-type", "application/x-www-form-urlencoded")
	}

	/// Sets a raw binary body with the given content type.
	pub fn bytes(mut self, content_type: &str, body: Vec<u8>) -> Self {
		self.body = Some(body);

		self.header("content-type", content_type)
	}

	/// Case-insensitive header lookup.
	pub fn header_value(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}

	/// Body decoded as UTF-8, lossily.
	pub fn body_text(&self) -> String {
		self.body.as_deref().map(String::from_utf8_lossy).unwrap_or_default().into_owned()
	}
}
impl Debug for TransportRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let headers = self
			.headers
			.iter()
			.map(|(name, value)| {
				if name == "authorization" { (name.as_str(), "<redacted>") } else { (name.as_str(), value.as_str()) }
			})
			.collect::<Vec<_>>();

		f.debug_struct("TransportRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &headers)
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.finish()
	}
}

/// Response returned by a transport.
#[derive(Clone, Debug, Default)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Header pairs with lowercase names.
	pub headers: Vec<(String, String)>,
	/// Raw body.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Creates a response from its parts.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: Vec::new(), body: body.into() }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.push((name.to_ascii_lowercase(), value.into()));

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Case-insensitive header lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}

	/// Parses a header as an unsigned integer.
	pub fn header_u64(&self, name: &str) -> Option<u64> {
		self.header(name)?.trim().parse().ok()
	}

	/// Body decoded as UTF-8, lossily.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the JSON body, reporting the path of the first mismatch.
	pub fn json<T>(&self, context: &'static str) -> Result<T, DecodeError>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| DecodeError::Json {
			context,
			status: self.status,
			source,
		})
	}

	/// Retry-After hint expressed as a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(self.header("retry-after")?, OffsetDateTime::now_utc())
	}
}

/// Production transport backed by [`ReqwestClient`].
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
	timeout: Duration,
}
impl ReqwestHttpClient {
	/// Builds a client that never follows redirects, using [`DEFAULT_TIMEOUT`].
	pub fn new() -> Result<Self, ConfigError> {
		Self::with_timeout(DEFAULT_TIMEOUT)
	}

	/// Builds a client with a custom per-call timeout.
	pub fn with_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self { client, timeout })
	}

	/// Wraps an existing client. Configure it to disable redirect following.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, timeout: DEFAULT_TIMEOUT }
	}

	/// Overrides the per-call timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	fn std_timeout(&self) -> StdDuration {
		self.timeout.unsigned_abs()
	}
}
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let mut builder =
				self.client.request(request.method, request.url).timeout(self.std_timeout());

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(map_reqwest_error)?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect();
			let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

			Ok(TransportResponse { status, headers, body })
		})
	}
}

fn map_reqwest_error(e: ReqwestError) -> TransportError {
	if e.is_timeout() { TransportError::Timeout } else { TransportError::network(e) }
}

fn find_header<'h>(headers: &'h [(String, String)], name: &str) -> Option<&'h str> {
	headers
		.iter()
		.find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
		.map(|(_, value)| value.as_str())
}

fn parse_retry_after(raw: &str, now: OffsetDateTime) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
