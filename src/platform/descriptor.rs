//! Platform descriptors: endpoints, client credentials, and per-platform quirks.
//!
//! Descriptors are immutable once built. The builder rejects plain-HTTP endpoints
//! and unprintable scope delimiters so a misconfigured adapter fails at startup
//! instead of on the first outbound call.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	platform::Platform,
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DescriptorError {
	/// Authorization endpoint is required for the code flow.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory for exchanges and refreshes.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// REST API base is mandatory for publishing.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// OAuth client identifier is mandatory.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Endpoint set declared by a platform descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEndpoints {
	/// Authorization endpoint the end user is redirected to.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Optional revocation endpoint.
	pub revocation: Option<Url>,
	/// Base URL for REST calls; relative API paths are joined onto it.
	pub api_base: Url,
}

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	#[default]
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Platform-specific toggles that influence adapter behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformQuirks {
	/// Character used to join scopes in authorization URLs.
	pub scope_delimiter: char,
	/// Version header or path segment sent with REST calls.
	pub api_version: Option<String>,
	/// How close to expiry a token must be before a refresh is attempted.
	pub refresh_window: Duration,
	/// How the client authenticates against the token endpoint.
	pub client_auth: ClientAuthMethod,
}
impl Default for PlatformQuirks {
	fn default() -> Self {
		Self {
			scope_delimiter: ' ',
			api_version: None,
			refresh_window: Duration::minutes(5),
			client_auth: ClientAuthMethod::default(),
		}
	}
}

/// Immutable platform descriptor consumed by adapters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformDescriptor {
	/// Platform described.
	pub platform: Platform,
	/// Endpoint definitions.
	pub endpoints: PlatformEndpoints,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Scopes requested during authorization.
	pub scopes: ScopeSet,
	/// Platform-specific quirks.
	pub quirks: PlatformQuirks,
}
impl PlatformDescriptor {
	/// Creates a new builder for the provided platform.
	pub fn builder(platform: Platform) -> PlatformDescriptorBuilder {
		PlatformDescriptorBuilder::new(platform)
	}

	/// Resolves a REST path against the API base.
	pub fn api_url(&self, path: &str) -> Result<Url, url::ParseError> {
		self.endpoints.api_base.join(path.trim_start_matches('/'))
	}

	fn validate(&self) -> Result<(), DescriptorError> {
		if self.client_id.trim().is_empty() {
			return Err(DescriptorError::MissingClientId);
		}

		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("api", &self.endpoints.api_base)?;

		if let Some(revocation) = self.endpoints.revocation.as_ref() {
			validate_endpoint("revocation", revocation)?;
		}
		if self.quirks.scope_delimiter.is_control() {
			return Err(DescriptorError::InvalidScopeDelimiter {
				delimiter: self.quirks.scope_delimiter,
			});
		}

		Ok(())
	}
}

/// Builder for [`PlatformDescriptor`] values.
#[derive(Debug)]
pub struct PlatformDescriptorBuilder {
	/// Platform being described.
	pub platform: Platform,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	pub token_endpoint: Option<Url>,
	/// Optional revocation endpoint.
	pub revocation_endpoint: Option<Url>,
	/// REST API base URL.
	pub api_base: Option<Url>,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Requested scopes.
	pub scopes: ScopeSet,
	/// Platform-specific quirks.
	pub quirks: PlatformQuirks,
}
impl PlatformDescriptorBuilder {
	/// Creates a new builder seeded with the provided platform.
	pub fn new(platform: Platform) -> Self {
		Self {
			platform,
			authorization_endpoint: None,
			token_endpoint: None,
			revocation_endpoint: None,
			api_base: None,
			client_id: String::new(),
			client_secret: TokenSecret::default(),
			scopes: ScopeSet::default(),
			quirks: PlatformQuirks::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the optional revocation endpoint.
	pub fn revocation_endpoint(mut self, url: Url) -> Self {
		self.revocation_endpoint = Some(url);

		self
	}

	/// Sets the REST API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Sets the OAuth client credentials.
	pub fn client(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		self.client_id = client_id.into();
		self.client_secret = TokenSecret::new(client_secret);

		self
	}

	/// Sets the requested scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Overrides the platform quirks.
	pub fn quirks(mut self, quirks: PlatformQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<PlatformDescriptor, DescriptorError> {
		let authorization =
			self.authorization_endpoint.ok_or(DescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(DescriptorError::MissingTokenEndpoint)?;
		let api_base = self.api_base.ok_or(DescriptorError::MissingApiBase)?;
		let descriptor = PlatformDescriptor {
			platform: self.platform,
			endpoints: PlatformEndpoints {
				authorization,
				token,
				revocation: self.revocation_endpoint,
				api_base: with_trailing_slash(api_base),
			},
			client_id: self.client_id,
			client_secret: self.client_secret,
			scopes: self.scopes,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), DescriptorError> {
	if url.scheme() != "https" {
		Err(DescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

// `Url::join` drops the last path segment unless the base ends with a slash.
fn with_trailing_slash(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}
