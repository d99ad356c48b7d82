//! OAuth 2.0 authorization-code plumbing shared by the adapters.
//!
//! Token endpoints are called over the injected [`HttpTransport`] rather than a
//! dedicated OAuth client library because platforms deviate from RFC 6749 in small
//! ways (LinkedIn omits `token_type`, Facebook returns comma-delimited scopes).
//! Responses are decoded leniently and normalized into [`OAuthTokenResponse`].

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::DecodeError,
	http::{HttpTransport, TransportRequest, TransportResponse},
	platform::{ClientAuthMethod, OAuthTokenResponse, PlatformDescriptor},
};

#[derive(Deserialize)]
struct RawTokenResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	scope: Option<String>,
	#[serde(default)]
	token_type: Option<String>,
}
impl RawTokenResponse {
	fn normalize(self) -> Result<OAuthTokenResponse, DecodeError> {
		if self.access_token.is_empty() {
			return Err(DecodeError::MissingField { context: "token", field: "access_token" });
		}

		Ok(OAuthTokenResponse {
			access_token: TokenSecret::new(self.access_token),
			refresh_token: self.refresh_token.filter(|value| !value.is_empty()).map(TokenSecret::new),
			expires_in: self.expires_in.filter(|secs| *secs > 0).map(Duration::seconds),
			scope: self.scope.as_deref().map(ScopeSet::parse_granted).unwrap_or_default(),
			token_type: self.token_type,
		})
	}
}

/// Borrowed view pairing a descriptor with the transport used to reach it.
#[derive(Clone, Copy)]
pub struct OAuthClient<'a> {
	descriptor: &'a PlatformDescriptor,
	transport: &'a dyn HttpTransport,
}
impl<'a> OAuthClient<'a> {
	/// Creates a client for one descriptor.
	pub fn new(descriptor: &'a PlatformDescriptor, transport: &'a dyn HttpTransport) -> Self {
		Self { descriptor, transport }
	}

	/// Builds the authorization URL for the code flow.
	///
	/// Scopes are joined with the platform's delimiter; `extra` pairs are appended as-is.
	pub fn authorization_url(
		&self,
		state: &str,
		redirect_uri: &Url,
		extra: &[(&str, &str)],
	) -> Url {
		let mut url = self.descriptor.endpoints.authorization.clone();

		{
			let mut pairs = url.query_pairs_mut();

			pairs
				.append_pair("response_type", "code")
				.append_pair("client_id", &self.descriptor.client_id)
				.append_pair("redirect_uri", redirect_uri.as_str())
				.append_pair("state", state);

			if let Some(scope) = self.descriptor.scopes.join(self.descriptor.quirks.scope_delimiter) {
				pairs.append_pair("scope", &scope);
			}
			for (key, value) in extra {
				pairs.append_pair(key, value);
			}
		}

		url
	}

	/// Exchanges an authorization code for credentials.
	pub async fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<OAuthTokenResponse> {
		let params = [
			("grant_type", "authorization_code"),
			("code", code),
			("redirect_uri", redirect_uri.as_str()),
		];

		self.token_request("exchange_code", &params).await
	}

	/// Exchanges a refresh token for rotated credentials.
	pub async fn refresh(&self, refresh_token: &TokenSecret) -> Result<OAuthTokenResponse> {
		let params = [("grant_type", "refresh_token"), ("refresh_token", refresh_token.expose())];

		self.token_request("refresh", &params).await
	}

	/// Revokes a token at the descriptor's revocation endpoint.
	///
	/// Returns `Ok(false)` when the platform declares no revocation endpoint.
	pub async fn revoke(&self, token: &TokenSecret) -> Result<bool> {
		let Some(endpoint) = self.descriptor.endpoints.revocation.clone() else {
			return Ok(false);
		};
		let request = self.authenticate(TransportRequest::post(endpoint), &[("token", token.expose())]);
		let response = self.send("revoke", request).await?;

		if response.is_success() {
			Ok(true)
		} else {
			Err(Error::OAuthExchange { status: response.status, body: response.body_text() })
		}
	}

	async fn token_request(
		&self,
		operation: &'static str,
		params: &[(&str, &str)],
	) -> Result<OAuthTokenResponse> {
		let request =
			self.authenticate(TransportRequest::post(self.descriptor.endpoints.token.clone()), params);
		let response = self.send(operation, request).await?;

		if !response.is_success() {
			return Err(Error::OAuthExchange { status: response.status, body: response.body_text() });
		}

		Ok(response.json::<RawTokenResponse>("token")?.normalize()?)
	}

	fn authenticate(&self, request: TransportRequest, params: &[(&str, &str)]) -> TransportRequest {
		let descriptor = self.descriptor;
		let pairs = params.iter().copied();

		match descriptor.quirks.client_auth {
			ClientAuthMethod::ClientSecretPost => request.form(pairs.chain([
				("client_id", descriptor.client_id.as_str()),
				("client_secret", descriptor.client_secret.expose()),
			])),
			ClientAuthMethod::ClientSecretBasic => {
				let credentials = STANDARD.encode(format!(
					"{}:{}",
					descriptor.client_id,
					descriptor.client_secret.expose()
				));

				request.form(pairs).header("authorization", format!("Basic {credentials}"))
			},
		}
	}

	async fn send(&self, operation: &'static str, request: TransportRequest) -> Result<TransportResponse> {
		self.transport
			.execute(request)
			.await
			.map_err(|e| Error::from(e.into_transient(operation)))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, platform::Platform};

	fn descriptor(client_auth: ClientAuthMethod) -> PlatformDescriptor {
		PlatformDescriptor::builder(Platform::LinkedIn)
			.authorization_endpoint(test_url("https://auth.example.com/oauth/authorize"))
			.token_endpoint(test_url("https://auth.example.com/oauth/token"))
			.revocation_endpoint(test_url("https://auth.example.com/oauth/revoke"))
			.api_base(test_url("https://api.example.com/v2"))
			.client("client-1", "secret-1")
			.scopes(ScopeSet::new(["openid", "w_member_social"]).expect("Scope fixture should be valid."))
			.quirks(crate::platform::PlatformQuirks { client_auth, ..Default::default() })
			.build()
			.expect("Descriptor fixture should build.")
	}

	#[test]
	fn authorization_url_embeds_state_and_scopes() {
		let descriptor = descriptor(ClientAuthMethod::ClientSecretPost);
		let transport = ScriptedTransport::default();
		let client = OAuthClient::new(&descriptor, &transport);
		let url = client.authorization_url(
			"csrf-123",
			&test_url("https://app.example.com/callback"),
			&[("prompt", "consent")],
		);
		let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
		assert_eq!(pairs.get("state").map(String::as_str), Some("csrf-123"));
		assert_eq!(pairs.get("scope").map(String::as_str), Some("openid w_member_social"));
		assert_eq!(pairs.get("prompt").map(String::as_str), Some("consent"));
		assert_eq!(transport.request_count(), 0);
	}

	#[tokio::test]
	async fn exchange_normalizes_lenient_responses() {
		let descriptor = descriptor(ClientAuthMethod::ClientSecretPost);
		let transport = ScriptedTransport::new([TransportResponse::new(
			200,
			"{\"access_token\":\"AT1\",\"expires_in\":5184000,\"scope\":\"openid,w_member_social\"}",
		)]);
		let response = OAuthClient::new(&descriptor, &transport)
			.exchange_code("code-1", &test_url("https://app.example.com/callback"))
			.await
			.expect("Exchange should succeed.");

		assert_eq!(response.access_token.expose(), "AT1");
		assert!(response.refresh_token.is_none());
		assert_eq!(response.expires_in, Some(Duration::days(60)));
		assert!(response.scope.contains("w_member_social"));

		let request = transport.requests().remove(0);

		assert!(request.body_text().contains("grant_type=authorization_code"));
		assert!(request.body_text().contains("client_secret=secret-1"));
	}

	#[tokio::test]
	async fn basic_client_auth_moves_credentials_into_the_header() {
		let descriptor = descriptor(ClientAuthMethod::ClientSecretBasic);
		let transport = ScriptedTransport::new([TransportResponse::new(
			200,
			"{\"access_token\":\"AT2\",\"refresh_token\":\"RT2\"}",
		)]);

		OAuthClient::new(&descriptor, &transport)
			.refresh(&TokenSecret::new("RT1"))
			.await
			.expect("Refresh should succeed.");

		let request = transport.requests().remove(0);

		assert!(request.header_value("authorization").is_some_and(|value| value.starts_with("Basic ")));
		assert!(!request.body_text().contains("client_secret"));
	}

	#[tokio::test]
	async fn failures_map_onto_the_taxonomy() {
		let descriptor = descriptor(ClientAuthMethod::ClientSecretPost);
		let transport = ScriptedTransport::new([
			TransportResponse::new(400, "{\"error\":\"invalid_grant\"}"),
			TransportResponse::new(200, "not json"),
			TransportResponse::new(200, "{\"access_token\":\"\"}"),
		]);
		let client = OAuthClient::new(&descriptor, &transport);
		let redirect = test_url("https://app.example.com/callback");

		match client.exchange_code("bad", &redirect).await {
			Err(Error::OAuthExchange { status, body }) => {
				assert_eq!(status, 400);
				assert!(body.contains("invalid_grant"));
			},
			other => panic!("Unexpected exchange outcome: {other:?}"),
		}

		assert!(matches!(
			client.exchange_code("garbled", &redirect).await,
			Err(Error::Decode(DecodeError::Json { .. }))
		));
		assert!(matches!(
			client.exchange_code("empty", &redirect).await,
			Err(Error::Decode(DecodeError::MissingField { field: "access_token", .. }))
		));
	}

	#[tokio::test]
	async fn revoke_without_endpoint_is_a_noop() {
		let mut descriptor = descriptor(ClientAuthMethod::ClientSecretPost);

		descriptor.endpoints.revocation = None;

		let transport = ScriptedTransport::default();
		let revoked = OAuthClient::new(&descriptor, &transport)
			.revoke(&TokenSecret::new("AT1"))
			.await
			.expect("Revocation without an endpoint should succeed.");

		assert!(!revoked);
		assert_eq!(transport.request_count(), 0);
	}
}
