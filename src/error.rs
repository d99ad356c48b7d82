//! Broker-level error types shared across the cipher, adapters, coordinator, and stores.

// self
use crate::{_prelude::*, auth::TokenId, platform::Platform};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem; fatal at construction.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Ciphertext could not be authenticated or decoded; never retried.
	#[error(transparent)]
	Integrity(#[from] IntegrityError),
	/// Timeout or connection failure on an outbound call.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Platform response body could not be parsed.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Content was rejected before any network I/O.
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// Token endpoint answered a code or refresh exchange with a non-success status.
	#[error("Token endpoint rejected the exchange with HTTP {status}.")]
	OAuthExchange {
		/// HTTP status returned by the token endpoint.
		status: u16,
		/// Raw response body returned by the token endpoint.
		body: String,
	},
	/// Platform REST endpoint answered with a non-success status other than 429.
	#[error("{platform} rejected the {operation} request with HTTP {status}: {body}.")]
	Api {
		/// Platform that produced the response.
		platform: Platform,
		/// Operation label (publish, account_info, ...).
		operation: &'static str,
		/// HTTP status code.
		status: u16,
		/// Platform rejection reason (raw body).
		body: String,
	},
	/// Platform answered with HTTP 429.
	#[error("{platform} rate limited the request.")]
	RateLimited {
		/// Platform that produced the response.
		platform: Platform,
		/// Retry-After hint, when supplied.
		retry_after: Option<Duration>,
	},
	/// Publish loop gave up after exhausting its attempts.
	#[error("Publishing failed after {attempts} attempts: {last}")]
	AttemptsExhausted {
		/// Number of attempts issued.
		attempts: u32,
		/// Failure observed on the final attempt.
		#[source]
		last: Box<Error>,
	},
	/// Platform never issues refresh tokens; the principal must re-authenticate.
	#[error("{platform} cannot refresh this token; re-authentication is required.")]
	RefreshUnsupported {
		/// Platform lacking refresh support.
		platform: Platform,
	},
	/// Token was invalidated and must not be used again.
	#[error("Token {id} has been invalidated.")]
	TokenInvalidated {
		/// Identifier of the invalidated token.
		id: TokenId,
	},
	/// No valid token exists for the identifier.
	#[error("Token {id} was not found.")]
	TokenNotFound {
		/// Identifier that failed to resolve.
		id: TokenId,
	},
	/// Operation was cancelled by the caller before completing.
	#[error("Operation was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns `true` when the principal must go through the authorization flow again.
	pub fn requires_reauthentication(&self) -> bool {
		match self {
			Self::RefreshUnsupported { .. } | Self::TokenInvalidated { .. } => true,
			Self::OAuthExchange { status, .. } => matches!(status, 400 | 401),
			_ => false,
		}
	}

	/// Returns `true` for failures the publish loop retries (429 and timeouts).
	pub fn is_publish_retryable(&self) -> bool {
		matches!(self, Self::RateLimited { .. } | Self::Transient(TransientError::Timeout { .. }))
	}

	/// Retry-After hint carried by a rate-limit failure.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimited { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}

/// Configuration and construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Encryption key is not exactly 32 bytes.
	#[error("Encryption key must be 32 bytes, got {len}.")]
	InvalidKeyLength {
		/// Supplied key length in bytes.
		len: usize,
	},
	/// Encryption key is not valid base64.
	#[error("Encryption key is not valid base64.")]
	KeyEncoding(#[source] base64::DecodeError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Platform descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::platform::DescriptorError),
	/// An endpoint or redirect URL could not be parsed or joined.
	#[error("URL is invalid.")]
	InvalidUrl(#[from] url::ParseError),
	/// Header value contains characters HTTP forbids.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
	},
	/// Request payload could not be serialized.
	#[error("Request payload could not be serialized.")]
	PayloadEncode(#[source] serde_json::Error),
	/// No adapter is registered for the platform.
	#[error("No adapter is registered for {platform}.")]
	UnregisteredPlatform {
		/// Platform requested by the caller.
		platform: Platform,
	},
	/// The crate ships no adapter for the platform.
	#[error("{platform} has no built-in adapter.")]
	UnsupportedPlatform {
		/// Platform named in configuration.
		platform: Platform,
	},
	/// Configuration document failed to parse.
	#[error("Configuration is invalid at `{path}`: {message}.")]
	Parse {
		/// JSON path of the offending field.
		path: String,
		/// Parser message.
		message: String,
	},
	/// Scope list failed validation.
	#[error("Scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Identifier failed validation.
	#[error("Identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Token builder validation failed.
	#[error("Unable to build platform token.")]
	TokenBuild(#[from] crate::auth::PlatformTokenBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Cryptographic integrity failures; fatal to the enclosing operation.
#[derive(Debug, ThisError)]
pub enum IntegrityError {
	/// Ciphertext text encoding is malformed.
	#[error("Ciphertext is not valid base64.")]
	Encoding(#[source] base64::DecodeError),
	/// Ciphertext is shorter than a nonce plus authentication tag.
	#[error("Ciphertext is truncated ({len} bytes).")]
	Truncated {
		/// Decoded payload length.
		len: usize,
	},
	/// Authentication tag did not verify (tampering, corruption, or wrong key).
	#[error("Ciphertext failed authentication.")]
	Authentication,
	/// Authenticated plaintext is not UTF-8.
	#[error("Decrypted secret is not valid UTF-8.")]
	Utf8(#[source] std::string::FromUtf8Error),
	/// Sealing the plaintext failed.
	#[error("Secret could not be encrypted.")]
	Seal,
	/// Token secrets were in the wrong state for the requested operation.
	#[error("Token secrets are {actual:?}, expected {expected:?}.")]
	SealState {
		/// State the operation requires.
		expected: crate::auth::SecretState,
		/// State the token was in.
		actual: crate::auth::SecretState,
	},
}

/// Timeouts and connection failures on outbound calls.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// The per-call timeout elapsed.
	#[error("Request timed out during {operation}.")]
	Timeout {
		/// Operation label.
		operation: &'static str,
	},
	/// Network-level failure (DNS, TCP, TLS).
	#[error("Network error occurred during {operation}.")]
	Network {
		/// Operation label.
		operation: &'static str,
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl TransientError {
	/// Wraps a transport-specific network error.
	pub fn network(
		operation: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { operation, source: Box::new(src) }
	}
}

/// Malformed platform responses.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Response body is not the expected JSON shape.
	#[error("{context} response is malformed.")]
	Json {
		/// Response being decoded.
		context: &'static str,
		/// HTTP status of the response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Response lacked a field the adapter needs.
	#[error("{context} response is missing `{field}`.")]
	MissingField {
		/// Response being decoded.
		context: &'static str,
		/// Missing field or header name.
		field: &'static str,
	},
}

/// Content rejected against a platform's declared capabilities.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Text exceeds the platform's character limit.
	#[error("Text is {length} characters; {platform} allows {max}.")]
	TextTooLong {
		/// Target platform.
		platform: Platform,
		/// Observed character count.
		length: usize,
		/// Declared maximum.
		max: usize,
	},
	/// More media attachments than the platform accepts.
	#[error("{count} media attachments supplied; {platform} allows {max}.")]
	TooManyMedia {
		/// Target platform.
		platform: Platform,
		/// Observed attachment count.
		count: usize,
		/// Declared maximum.
		max: usize,
	},
	/// Post has no text, media, or link.
	#[error("Post content is empty.")]
	EmptyContent,
	/// A platform-specific option the adapter requires is absent.
	#[error("{platform} requires the `{key}` option.")]
	MissingOption {
		/// Target platform.
		platform: Platform,
		/// Missing option key.
		key: &'static str,
	},
	/// An attachment kind the platform does not accept.
	#[error("{platform} does not accept {kind} attachments.")]
	UnsupportedMedia {
		/// Target platform.
		platform: Platform,
		/// Rejected attachment kind (`image` or `video`).
		kind: &'static str,
	},
	/// A video exceeds the platform's size limit.
	#[error("Video is {size} bytes; {platform} allows {max}.")]
	VideoTooLarge {
		/// Target platform.
		platform: Platform,
		/// Observed size in bytes.
		size: u64,
		/// Declared maximum in bytes.
		max: u64,
	},
	/// Video combined with other attachments in one post.
	#[error("{platform} cannot combine a video with other attachments.")]
	MixedMedia {
		/// Target platform.
		platform: Platform,
	},
}
