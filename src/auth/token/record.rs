//! Platform token records, their seal state, and builders.

// crates.io
use serde::{Serializer, ser::Error as SerError};
// self
use crate::{
	_prelude::*,
	auth::{AccountId, PrincipalId, ScopeSet, TokenId, token::secret::TokenSecret},
	error::IntegrityError,
	platform::{OAuthTokenResponse, Platform},
};

/// Whether a token's secret fields currently hold plaintext or ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretState {
	/// Secrets are plaintext; only valid for the duration of an adapter call.
	Plaintext,
	/// Secrets are encrypted by the credential cipher.
	Sealed,
}

/// Errors produced by [`PlatformTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum PlatformTokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
}

/// One authorized connection between a principal and an external platform account.
///
/// Only sealed tokens serialize; a plaintext token fails instead of writing its secrets.
#[derive(Clone, Deserialize)]
pub struct PlatformToken {
	/// Opaque identifier of this connection.
	pub id: TokenId,
	/// Principal (user or team) owning the connection.
	pub principal: PrincipalId,
	/// Platform the connection belongs to.
	pub platform: Platform,
	/// Platform-side account identifier.
	pub account_id: AccountId,
	/// Platform-side display name.
	pub account_name: String,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the platform issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Expiry instant; `None` for platforms whose tokens do not expire.
	pub expires_at: Option<OffsetDateTime>,
	/// Last time the platform confirmed the token.
	pub last_validated_at: Option<OffsetDateTime>,
	/// Granted scopes.
	pub scope: ScopeSet,
	/// False once revoked or after an irrecoverable auth failure.
	pub is_valid: bool,
	/// Platform-specific metadata (for example a Facebook `page_id`).
	#[serde(default)]
	pub extra: BTreeMap<String, serde_json::Value>,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Last mutation instant.
	pub updated_at: OffsetDateTime,
	secret_state: SecretState,
}
impl PlatformToken {
	/// Returns a builder for a new plaintext token.
	pub fn builder(
		principal: PrincipalId,
		platform: Platform,
		account_id: AccountId,
	) -> PlatformTokenBuilder {
		PlatformTokenBuilder::new(principal, platform, account_id)
	}

	/// Current seal state of the secret fields.
	pub fn secret_state(&self) -> SecretState {
		self.secret_state
	}

	/// Returns `true` when the secret fields hold ciphertext.
	pub fn is_sealed(&self) -> bool {
		matches!(self.secret_state, SecretState::Sealed)
	}

	/// Returns `true` when a non-empty refresh token is present.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.as_ref().is_some_and(|secret| !secret.is_empty())
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| instant >= expiry)
	}

	/// Returns `true` if the token expires within `window` of `instant`.
	///
	/// Tokens without an expiry never need refreshing.
	pub fn expires_within(&self, window: Duration, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| expiry - instant <= window)
	}

	/// Reads a string value from the extra bag.
	pub fn extra_str(&self, key: &str) -> Option<&str> {
		self.extra.get(key).and_then(serde_json::Value::as_str)
	}

	/// Secret-free view suitable for returning to API callers.
	pub fn summary(&self) -> ConnectionSummary {
		ConnectionSummary {
			id: self.id,
			principal: self.principal.clone(),
			platform: self.platform,
			account_id: self.account_id.clone(),
			account_name: self.account_name.clone(),
			scope: self.scope.clone(),
			expires_at: self.expires_at,
			last_validated_at: self.last_validated_at,
			is_valid: self.is_valid,
			can_refresh: self.can_refresh(),
		}
	}

	/// Fails unless the secrets are plaintext.
	pub fn ensure_plaintext(&self) -> Result<(), IntegrityError> {
		self.ensure_state(SecretState::Plaintext)
	}

	/// Fails unless the secrets are sealed.
	pub fn ensure_sealed(&self) -> Result<(), IntegrityError> {
		self.ensure_state(SecretState::Sealed)
	}

	/// Fails when the token has been invalidated.
	pub fn ensure_valid(&self) -> Result<()> {
		if self.is_valid { Ok(()) } else { Err(Error::TokenInvalidated { id: self.id }) }
	}

	/// Returns a copy carrying the credentials of a refresh response.
	///
	/// A response without a refresh token keeps the current one; a response without a
	/// lifetime clears the expiry.
	pub fn rotated(&self, response: OAuthTokenResponse, instant: OffsetDateTime) -> Self {
		let mut rotated = self.clone();

		rotated.access_token = response.access_token;

		if let Some(refresh) = response.refresh_token {
			rotated.refresh_token = Some(refresh);
		}
		if !response.scope.is_empty() {
			rotated.scope = response.scope;
		}

		rotated.expires_at = response.expires_in.map(|lifetime| instant + lifetime);
		rotated.last_validated_at = Some(instant);
		rotated.updated_at = instant;

		rotated
	}

	/// Marks the token invalid at the provided instant.
	pub fn invalidate(&mut self, instant: OffsetDateTime) {
		self.is_valid = false;
		self.updated_at = instant;
	}

	pub(crate) fn set_secret_state(&mut self, state: SecretState) {
		self.secret_state = state;
	}

	/// Wipes both secrets; used when re-sealing is impossible.
	pub(crate) fn scrub(&mut self) {
		self.access_token.clear();

		if let Some(refresh) = self.refresh_token.as_mut() {
			refresh.clear();
		}
	}

	fn ensure_state(&self, expected: SecretState) -> Result<(), IntegrityError> {
		if self.secret_state == expected {
			Ok(())
		} else {
			Err(IntegrityError::SealState { expected, actual: self.secret_state })
		}
	}
}
impl Debug for PlatformToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PlatformToken")
			.field("id", &self.id)
			.field("principal", &self.principal)
			.field("platform", &self.platform)
			.field("account_id", &self.account_id)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.field("is_valid", &self.is_valid)
			.field("secret_state", &self.secret_state)
			.finish()
	}
}

impl Serialize for PlatformToken {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		if self.secret_state == SecretState::Plaintext {
			return Err(SerError::custom("Plaintext token secrets cannot be serialized."));
		}

		SealedRecord {
			id: &self.id,
			principal: &self.principal,
			platform: &self.platform,
			account_id: &self.account_id,
			account_name: &self.account_name,
			access_token: &self.access_token,
			refresh_token: &self.refresh_token,
			expires_at: &self.expires_at,
			last_validated_at: &self.last_validated_at,
			scope: &self.scope,
			is_valid: self.is_valid,
			extra: &self.extra,
			created_at: &self.created_at,
			updated_at: &self.updated_at,
			secret_state: self.secret_state,
		}
		.serialize(serializer)
	}
}

// Borrowed wire shape of a sealed token; field names match the `Deserialize` derive.
#[derive(Serialize)]
struct SealedRecord<'a> {
	id: &'a TokenId,
	principal: &'a PrincipalId,
	platform: &'a Platform,
	account_id: &'a AccountId,
	account_name: &'a str,
	access_token: &'a TokenSecret,
	refresh_token: &'a Option<TokenSecret>,
	expires_at: &'a Option<OffsetDateTime>,
	last_validated_at: &'a Option<OffsetDateTime>,
	scope: &'a ScopeSet,
	is_valid: bool,
	extra: &'a BTreeMap<String, serde_json::Value>,
	created_at: &'a OffsetDateTime,
	updated_at: &'a OffsetDateTime,
	secret_state: SecretState,
}

/// Secret-free projection of a [`PlatformToken`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
	/// Connection identifier.
	pub id: TokenId,
	/// Owning principal.
	pub principal: PrincipalId,
	/// Platform of the connection.
	pub platform: Platform,
	/// Platform-side account identifier.
	pub account_id: AccountId,
	/// Platform-side display name.
	pub account_name: String,
	/// Granted scopes.
	pub scope: ScopeSet,
	/// Expiry instant, if any.
	pub expires_at: Option<OffsetDateTime>,
	/// Last successful validation.
	pub last_validated_at: Option<OffsetDateTime>,
	/// Validity flag.
	pub is_valid: bool,
	/// Whether a refresh token is available.
	pub can_refresh: bool,
}

/// Builder for plaintext [`PlatformToken`] values.
#[derive(Clone, Debug)]
pub struct PlatformTokenBuilder {
	principal: PrincipalId,
	platform: Platform,
	account_id: AccountId,
	id: Option<TokenId>,
	account_name: String,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	scope: ScopeSet,
	extra: BTreeMap<String, serde_json::Value>,
}
impl PlatformTokenBuilder {
	fn new(principal: PrincipalId, platform: Platform, account_id: AccountId) -> Self {
		Self {
			principal,
			platform,
			account_id,
			id: None,
			account_name: String::new(),
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
			scope: ScopeSet::default(),
			extra: BTreeMap::new(),
		}
	}

	/// Uses a caller-chosen identifier instead of a generated one.
	pub fn id(mut self, id: TokenId) -> Self {
		self.id = Some(id);

		self
	}

	/// Sets the platform-side display name.
	pub fn account_name(mut self, name: impl Into<String>) -> Self {
		self.account_name = name.into();

		self
	}

	/// Provides the plaintext access token.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		let token = token.into();

		self.access_token = (!token.is_empty()).then(|| TokenSecret::new(token));

		self
	}

	/// Provides the plaintext refresh token; empty strings leave it absent.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		let token = token.into();

		self.refresh_token = (!token.is_empty()).then(|| TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant used for relative expiries.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Adds a platform-specific metadata entry.
	pub fn extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.extra.insert(key.into(), value.into());

		self
	}

	/// Copies secrets, expiry, and granted scopes from a token endpoint response.
	pub fn oauth_response(mut self, response: &OAuthTokenResponse) -> Self {
		self = self.access_token(response.access_token.expose());

		if let Some(refresh) = &response.refresh_token {
			self = self.refresh_token(refresh.expose());
		}
		if let Some(expires_in) = response.expires_in {
			self.expires_in = Some(expires_in);
		}
		if !response.scope.is_empty() {
			self.scope = response.scope.clone();
		}

		self
	}

	/// Consumes the builder and produces a plaintext [`PlatformToken`].
	pub fn build(self) -> Result<PlatformToken, PlatformTokenBuilderError> {
		let access_token =
			self.access_token.ok_or(PlatformTokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(issued_at + delta),
			(None, None) => None,
		};

		Ok(PlatformToken {
			id: self.id.unwrap_or_else(TokenId::generate),
			principal: self.principal,
			platform: self.platform,
			account_id: self.account_id,
			account_name: self.account_name,
			access_token,
			refresh_token: self.refresh_token,
			expires_at,
			last_validated_at: None,
			scope: self.scope,
			is_valid: true,
			extra: self.extra,
			created_at: issued_at,
			updated_at: issued_at,
			secret_state: SecretState::Plaintext,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn builder() -> PlatformTokenBuilder {
		PlatformToken::builder(
			PrincipalId::new("team-7").expect("Principal fixture should be valid."),
			Platform::LinkedIn,
			AccountId::new("782bbtaQ").expect("Account fixture should be valid."),
		)
	}

	#[test]
	fn empty_refresh_token_stays_absent() {
		let token = builder()
			.access_token("AT1")
			.refresh_token("")
			.build()
			.expect("Token with an access token should build.");

		assert!(token.refresh_token.is_none());
		assert!(!token.can_refresh());
		assert!(token.is_valid);
		assert_eq!(token.secret_state(), SecretState::Plaintext);
	}

	#[test]
	fn missing_access_token_is_rejected() {
		let err = builder().access_token("").build().expect_err("Empty access token must fail.");

		assert_eq!(err, PlatformTokenBuilderError::MissingAccessToken);
	}

	#[test]
	fn relative_expiry_and_refresh_window() {
		let issued = macros::datetime!(2026-03-01 09:00 UTC);
		let token = builder()
			.access_token("AT1")
			.issued_at(issued)
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token fixture should build.");

		assert_eq!(token.expires_at, Some(macros::datetime!(2026-03-01 10:00 UTC)));
		assert!(!token.expires_within(Duration::minutes(5), issued));
		assert!(token.expires_within(Duration::minutes(5), macros::datetime!(2026-03-01 09:56 UTC)));
		assert!(token.is_expired_at(macros::datetime!(2026-03-01 10:00 UTC)));

		let eternal = builder().access_token("AT2").build().expect("Token fixture should build.");

		assert!(!eternal.expires_within(Duration::days(365), issued));
		assert!(!eternal.is_expired_at(issued + Duration::days(3650)));
	}

	#[test]
	fn debug_and_summary_hide_secrets() {
		let token = builder()
			.account_name("Ada Lovelace")
			.access_token("AT-plain")
			.refresh_token("RT-plain")
			.extra("page_id", "1234")
			.build()
			.expect("Token fixture should build.");
		let debug = format!("{token:?}");
		let summary =
			serde_json::to_string(&token.summary()).expect("Summary should serialize to JSON.");

		assert!(!debug.contains("AT-plain"));
		assert!(!debug.contains("RT-plain"));
		assert!(!summary.contains("AT-plain"));
		assert!(!summary.contains("RT-plain"));
		assert!(summary.contains("Ada Lovelace"));
		assert_eq!(token.extra_str("page_id"), Some("1234"));
	}

	#[test]
	fn plaintext_tokens_refuse_to_serialize() {
		let token = builder()
			.access_token("AT-plain")
			.refresh_token("RT-plain")
			.build()
			.expect("Token fixture should build.");
		let err = serde_json::to_string(&token).expect_err("Plaintext token must not serialize.");

		assert!(err.to_string().contains("Plaintext token secrets cannot be serialized."));
	}

	#[test]
	fn sealed_tokens_serialize_ciphertext_only() {
		let mut token = builder()
			.access_token("AT-plain")
			.refresh_token("RT-plain")
			.extra("page_id", "1234")
			.build()
			.expect("Token fixture should build.");

		crate::_preludet::test_cipher()
			.encrypt_token(&mut token)
			.expect("Token fixture should seal.");

		let json = serde_json::to_string(&token).expect("Sealed token should serialize.");

		assert!(!json.contains("AT-plain"));
		assert!(!json.contains("RT-plain"));

		let restored: PlatformToken =
			serde_json::from_str(&json).expect("Sealed token should deserialize.");

		assert!(restored.is_sealed());
		assert_eq!(restored.id, token.id);
		assert_eq!(restored.access_token.expose(), token.access_token.expose());
		assert_eq!(restored.extra_str("page_id"), Some("1234"));
	}

	#[test]
	fn rotation_keeps_the_refresh_token_when_none_is_returned() {
		let token = builder()
			.access_token("AT1")
			.refresh_token("RT1")
			.build()
			.expect("Token fixture should build.");
		let now = macros::datetime!(2026-03-01 09:00 UTC);
		let rotated = token.rotated(
			OAuthTokenResponse {
				access_token: TokenSecret::new("AT2"),
				refresh_token: None,
				expires_in: Some(Duration::days(60)),
				scope: ScopeSet::default(),
				token_type: None,
			},
			now,
		);

		assert_eq!(rotated.id, token.id);
		assert_eq!(rotated.access_token.expose(), "AT2");
		assert_eq!(rotated.refresh_token.as_ref().map(TokenSecret::expose), Some("RT1"));
		assert_eq!(rotated.expires_at, Some(macros::datetime!(2026-04-30 09:00 UTC)));
		assert_eq!(rotated.updated_at, now);
	}

	#[test]
	fn invalidation_flips_the_flag() {
		let mut token = builder().access_token("AT1").build().expect("Token fixture should build.");
		let now = OffsetDateTime::now_utc();

		token.invalidate(now);

		assert!(!token.is_valid);
		assert!(matches!(token.ensure_valid(), Err(Error::TokenInvalidated { .. })));
	}
}
