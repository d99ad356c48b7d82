//! Deserializable broker configuration: encryption key, transport timeout, and per-platform
//! client credentials.
//!
//! Parse failures report the JSON path of the offending field so operators can locate
//! the mistake without guessing.

// self
use crate::{
	_prelude::*,
	adapters::{FacebookAdapter, LinkedInAdapter},
	auth::{ScopeSet, TokenSecret},
	crypto::TokenCipher,
	error::ConfigError,
	http::{DEFAULT_TIMEOUT, HttpTransport, ReqwestHttpClient},
	lifecycle::TokenLifecycle,
	platform::{AdapterRegistry, Platform, PlatformAdapter, PlatformDescriptor, PlatformDescriptorBuilder},
	store::TokenStore,
};

/// Top-level configuration document.
///
/// Deserialize-only: the document carries the cipher key and client secrets.
#[derive(Clone, Debug, Deserialize)]
pub struct BrokerConfig {
	/// Base64 of the 32-byte credential cipher key.
	pub encryption_key: TokenSecret,
	/// Overall per-call timeout for outbound requests, in seconds.
	#[serde(default = "default_http_timeout_secs")]
	pub http_timeout_secs: u64,
	/// Client registrations, one per platform.
	#[serde(default)]
	pub platforms: Vec<PlatformConfig>,
}
impl BrokerConfig {
	/// Parses a JSON configuration document.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|e| ConfigError::Parse {
			path: e.path().to_string(),
			message: e.into_inner().to_string(),
		})
	}

	/// Builds the credential cipher from the configured key.
	pub fn cipher(&self) -> Result<TokenCipher, ConfigError> {
		TokenCipher::from_base64_key(self.encryption_key.expose())
	}

	/// Configured per-call timeout.
	pub fn http_timeout(&self) -> Duration {
		match i64::try_from(self.http_timeout_secs) {
			Ok(secs) if secs > 0 => Duration::seconds(secs),
			_ => DEFAULT_TIMEOUT,
		}
	}

	/// Builds the reqwest transport with the configured timeout.
	pub fn transport(&self) -> Result<ReqwestHttpClient, ConfigError> {
		ReqwestHttpClient::with_timeout(self.http_timeout())
	}

	/// Builds adapters for every configured platform over a shared transport.
	pub fn build_registry(
		&self,
		transport: Arc<dyn HttpTransport>,
	) -> Result<AdapterRegistry, ConfigError> {
		let mut registry = AdapterRegistry::new();

		for platform in &self.platforms {
			registry.register(platform.build_adapter(transport.clone())?);
		}

		Ok(registry)
	}

	/// Builds a coordinator over `store` with the configured cipher, transport, and adapters.
	pub fn build_lifecycle(&self, store: Arc<dyn TokenStore>) -> Result<TokenLifecycle, ConfigError> {
		let transport: Arc<dyn HttpTransport> = Arc::new(self.transport()?);

		Ok(TokenLifecycle::new(store, self.cipher()?, self.build_registry(transport)?))
	}
}

/// Client registration for one platform.
#[derive(Clone, Debug, Deserialize)]
pub struct PlatformConfig {
	/// Platform the registration belongs to.
	pub platform: Platform,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Requested scopes; the adapter's defaults apply when absent.
	#[serde(default)]
	pub scopes: Option<Vec<String>>,
	/// Endpoint overrides, for example to target a sandbox.
	#[serde(default)]
	pub endpoints: Option<EndpointOverrides>,
}
impl PlatformConfig {
	/// Builds the descriptor from the adapter's defaults plus this registration.
	pub fn descriptor(&self) -> Result<PlatformDescriptor, ConfigError> {
		let mut builder = Self::defaults(self.platform)?
			.client(self.client_id.clone(), self.client_secret.expose());

		if let Some(scopes) = &self.scopes {
			builder = builder.scopes(ScopeSet::new(scopes)?);
		}
		if let Some(endpoints) = &self.endpoints {
			builder = endpoints.apply(builder);
		}

		Ok(builder.build()?)
	}

	/// Builds the adapter serving this registration.
	pub fn build_adapter(
		&self,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Arc<dyn PlatformAdapter>, ConfigError> {
		let descriptor = self.descriptor()?;

		Ok(match self.platform {
			Platform::LinkedIn => Arc::new(LinkedInAdapter::new(descriptor, transport)?),
			Platform::Facebook => Arc::new(FacebookAdapter::new(descriptor, transport)?),
			platform => return Err(ConfigError::UnsupportedPlatform { platform }),
		})
	}

	fn defaults(platform: Platform) -> Result<PlatformDescriptorBuilder, ConfigError> {
		match platform {
			Platform::LinkedIn => LinkedInAdapter::descriptor_builder(),
			Platform::Facebook => FacebookAdapter::descriptor_builder(),
			platform => Err(ConfigError::UnsupportedPlatform { platform }),
		}
	}
}

/// Optional endpoint replacements; each must be HTTPS.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EndpointOverrides {
	/// Authorization endpoint.
	#[serde(default)]
	pub authorization: Option<Url>,
	/// Token endpoint.
	#[serde(default)]
	pub token: Option<Url>,
	/// Revocation endpoint.
	#[serde(default)]
	pub revocation: Option<Url>,
	/// REST API base URL.
	#[serde(default)]
	pub api_base: Option<Url>,
}
impl EndpointOverrides {
	fn apply(&self, mut builder: PlatformDescriptorBuilder) -> PlatformDescriptorBuilder {
		if let Some(url) = &self.authorization {
			builder = builder.authorization_endpoint(url.clone());
		}
		if let Some(url) = &self.token {
			builder = builder.token_endpoint(url.clone());
		}
		if let Some(url) = &self.revocation {
			builder = builder.revocation_endpoint(url.clone());
		}
		if let Some(url) = &self.api_base {
			builder = builder.api_base(url.clone());
		}

		builder
	}
}

fn default_http_timeout_secs() -> u64 {
	DEFAULT_TIMEOUT.whole_seconds().unsigned_abs()
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::STANDARD};
	// self
	use super::*;
	use crate::platform::DescriptorError;

	fn key() -> String {
		STANDARD.encode(TokenCipher::generate_key())
	}

	#[test]
	fn defaults_fill_timeout_and_scopes() {
		let raw = format!(
			"{{\"encryption_key\":\"{}\",\"platforms\":[{{\"platform\":\"linkedin\",\"client_id\":\"li-1\",\"client_secret\":\"li-secret\"}}]}}",
			key()
		);
		let config = BrokerConfig::from_json_str(&raw).expect("Config fixture should parse.");

		assert_eq!(config.http_timeout(), Duration::seconds(30));
		assert!(config.cipher().is_ok());

		let descriptor =
			config.platforms[0].descriptor().expect("LinkedIn descriptor should build.");

		assert_eq!(descriptor.client_id, "li-1");
		assert!(descriptor.scopes.contains("w_member_social"));
		assert_eq!(descriptor.endpoints.api_base.as_str(), "https://api.linkedin.com/v2/");
	}

	#[test]
	fn debug_output_hides_the_key_and_client_secrets() {
		let key = key();
		let raw = format!(
			"{{\"encryption_key\":\"{key}\",\"platforms\":[{{\"platform\":\"linkedin\",\"client_id\":\"li-1\",\"client_secret\":\"li-secret\"}}]}}"
		);
		let config = BrokerConfig::from_json_str(&raw).expect("Config fixture should parse.");
		let debug = format!("{config:?}");

		assert!(!debug.contains(&key));
		assert!(!debug.contains("li-secret"));
		assert!(debug.contains("li-1"));
	}

	#[test]
	fn parse_errors_report_the_json_path() {
		let raw = format!(
			"{{\"encryption_key\":\"{}\",\"platforms\":[{{\"platform\":\"myspace\",\"client_id\":\"x\",\"client_secret\":\"y\"}}]}}",
			key()
		);

		match BrokerConfig::from_json_str(&raw) {
			Err(ConfigError::Parse { path, .. }) => assert_eq!(path, "platforms[0].platform"),
			other => panic!("Unexpected parse outcome: {other:?}"),
		}
	}

	#[test]
	fn short_keys_and_plain_http_overrides_are_rejected() {
		let short = BrokerConfig {
			encryption_key: TokenSecret::new(STANDARD.encode([0_u8; 16])),
			http_timeout_secs: 30,
			platforms: Vec::new(),
		};

		assert!(matches!(short.cipher(), Err(ConfigError::InvalidKeyLength { len: 16 })));

		let platform = PlatformConfig {
			platform: Platform::LinkedIn,
			client_id: "li-1".into(),
			client_secret: TokenSecret::new("li-secret"),
			scopes: None,
			endpoints: Some(EndpointOverrides {
				token: Some(Url::parse("http://sandbox.example.com/token").expect("URL should parse.")),
				..Default::default()
			}),
		};

		assert!(matches!(
			platform.descriptor(),
			Err(ConfigError::InvalidDescriptor(DescriptorError::InsecureEndpoint { .. }))
		));
	}

	#[test]
	fn platforms_without_adapters_are_unsupported() {
		let config = BrokerConfig {
			encryption_key: TokenSecret::new(key()),
			http_timeout_secs: 5,
			platforms: vec![PlatformConfig {
				platform: Platform::TikTok,
				client_id: "tt-1".into(),
				client_secret: TokenSecret::new("tt-secret"),
				scopes: None,
				endpoints: None,
			}],
		};
		let transport: Arc<dyn HttpTransport> = Arc::new(crate::_preludet::ScriptedTransport::default());

		assert_eq!(config.http_timeout(), Duration::seconds(5));
		assert!(matches!(
			config.build_registry(transport),
			Err(ConfigError::UnsupportedPlatform { platform: Platform::TikTok })
		));
	}
}
