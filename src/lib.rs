//! Uniform social-platform integration layer: OAuth adapters behind one contract, sealed
//! credential storage, decrypt-on-use token lifecycle, and a bounded-retry publish pipeline.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod adapters;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod oauth;
pub mod obs;
pub mod platform;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		adapters::{Backoff, BackoffFuture, FacebookAdapter, LinkedInAdapter},
		auth::{AccountId, PlatformToken, PlatformTokenBuilder, PrincipalId},
		crypto::TokenCipher,
		error::ConfigError,
		http::{
			HttpTransport, ReqwestHttpClient, TransportError, TransportFuture, TransportRequest,
			TransportResponse,
		},
		platform::{Platform, PlatformDescriptor},
	};

	/// Key shared by every test cipher so sealed fixtures stay interchangeable.
	pub const TEST_KEY: [u8; TokenCipher::KEY_LEN] = [7; TokenCipher::KEY_LEN];

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Parses a fixture URL.
	pub fn test_url(raw: &str) -> Url {
		Url::parse(raw).unwrap_or_else(|e| panic!("Fixture URL {raw} should parse: {e}"))
	}

	/// Cipher keyed with [`TEST_KEY`].
	pub fn test_cipher() -> TokenCipher {
		TokenCipher::new(&TEST_KEY).expect("Test key should be 32 bytes.")
	}

	/// Plaintext token builder for `principal` with a fixed account.
	pub fn token_builder(platform: Platform, principal: &str) -> PlatformTokenBuilder {
		PlatformToken::builder(
			PrincipalId::new(principal).expect("Principal fixture should be valid."),
			platform,
			AccountId::new("acct-1").expect("Account fixture should be valid."),
		)
		.account_name("Test Account")
	}

	/// Builds and seals a token with [`test_cipher`].
	pub fn sealed_token(builder: PlatformTokenBuilder) -> PlatformToken {
		let mut token = builder.build().expect("Token fixture should build.");

		test_cipher().encrypt_token(&mut token).expect("Token fixture should seal.");

		token
	}

	/// Descriptor for `platform` whose endpoints all live under `base` (an `httpmock`
	/// server URL, for example), keeping the platform's default quirks.
	pub fn descriptor_at(platform: Platform, base: &str) -> PlatformDescriptor {
		let base = base.trim_end_matches('/');
		let builder = match platform {
			Platform::LinkedIn => LinkedInAdapter::descriptor_builder()
				.map(|builder| builder.revocation_endpoint(test_url(&format!("{base}/oauth/revoke")))),
			Platform::Facebook => FacebookAdapter::descriptor_builder(),
			platform => Err(ConfigError::UnsupportedPlatform { platform }),
		}
		.expect("Default descriptor builder should exist.");

		builder
			.authorization_endpoint(test_url(&format!("{base}/oauth/authorize")))
			.token_endpoint(test_url(&format!("{base}/oauth/token")))
			.api_base(test_url(&format!("{base}/v2")))
			.client("client-1", "secret-1")
			.build()
			.expect("Fixture descriptor should build.")
	}

	/// One scripted transport outcome.
	#[derive(Clone, Debug)]
	pub enum ScriptedReply {
		/// Return the response as-is.
		Respond(TransportResponse),
		/// Fail with [`TransportError::Timeout`].
		Timeout,
		/// Never complete; used to exercise cancellation.
		Hang,
	}
	impl From<TransportResponse> for ScriptedReply {
		fn from(response: TransportResponse) -> Self {
			Self::Respond(response)
		}
	}

	/// [`HttpTransport`] replaying a fixed script and recording every request it receives.
	///
	/// Once the script is exhausted the fallback response (if any) is repeated; otherwise
	/// requests fail with a network error.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedTransport {
		script: Arc<Mutex<VecDeque<ScriptedReply>>>,
		fallback: Option<TransportResponse>,
		requests: Arc<Mutex<Vec<TransportRequest>>>,
	}
	impl ScriptedTransport {
		/// Replays `responses` in order.
		pub fn new(responses: impl IntoIterator<Item = TransportResponse>) -> Self {
			Self::scripted(responses.into_iter().map(ScriptedReply::from))
		}

		/// Replays arbitrary outcomes in order.
		pub fn scripted(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
			Self { script: Arc::new(Mutex::new(replies.into_iter().collect())), ..Default::default() }
		}

		/// Answers every request with `response`.
		pub fn repeating(response: TransportResponse) -> Self {
			Self { fallback: Some(response), ..Default::default() }
		}

		/// Requests received so far.
		pub fn requests(&self) -> Vec<TransportRequest> {
			self.requests.lock().clone()
		}

		/// Number of requests received so far.
		pub fn request_count(&self) -> usize {
			self.requests.lock().len()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
			self.requests.lock().push(request);

			let reply = self
				.script
				.lock()
				.pop_front()
				.or_else(|| self.fallback.clone().map(ScriptedReply::Respond));

			Box::pin(async move {
				match reply {
					Some(ScriptedReply::Respond(response)) => Ok(response),
					Some(ScriptedReply::Timeout) => Err(TransportError::Timeout),
					Some(ScriptedReply::Hang) => std::future::pending().await,
					None => Err(TransportError::network(std::io::Error::other(
						"Scripted transport has no reply left.",
					))),
				}
			})
		}
	}

	/// [`Backoff`] that records requested delays and returns immediately.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingBackoff {
		delays: Arc<Mutex<Vec<Duration>>>,
	}
	impl RecordingBackoff {
		/// Delays requested so far, in order.
		pub fn delays(&self) -> Vec<Duration> {
			self.delays.lock().clone()
		}
	}
	impl Backoff for RecordingBackoff {
		fn wait(&self, delay: Duration) -> BackoffFuture<'_> {
			self.delays.lock().push(delay);

			Box::pin(async {})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
