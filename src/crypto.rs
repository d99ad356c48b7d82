//! Credential cipher sealing access and refresh tokens at rest.
//!
//! Each secret is sealed with AES-256-GCM under a fresh 96-bit nonce and rendered as
//! standard base64 of `nonce || ciphertext || tag`. Decryption authenticates before
//! returning anything, so a truncated, tampered, or foreign payload yields an
//! [`IntegrityError`] rather than altered plaintext.

// crates.io
use aes_gcm::{Aes256Gcm, KeyInit, Nonce, aead::Aead};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;
// self
use crate::{
	_prelude::*,
	auth::{PlatformToken, SecretState, TokenSecret},
	error::{ConfigError, IntegrityError},
};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Symmetric cipher for token secrets, keyed once at startup.
#[derive(Clone)]
pub struct TokenCipher {
	cipher: Aes256Gcm,
}
impl TokenCipher {
	/// Required key length in bytes.
	pub const KEY_LEN: usize = 32;

	/// Builds a cipher from raw key material; anything but 32 bytes is rejected.
	pub fn new(key: &[u8]) -> Result<Self, ConfigError> {
		if key.len() != Self::KEY_LEN {
			return Err(ConfigError::InvalidKeyLength { len: key.len() });
		}

		let cipher = Aes256Gcm::new_from_slice(key)
			.map_err(|_| ConfigError::InvalidKeyLength { len: key.len() })?;

		Ok(Self { cipher })
	}

	/// Builds a cipher from a base64-encoded key.
	pub fn from_base64_key(encoded: &str) -> Result<Self, ConfigError> {
		let key = STANDARD.decode(encoded.trim()).map_err(ConfigError::KeyEncoding)?;

		Self::new(&key)
	}

	/// Generates random key material suitable for [`TokenCipher::new`].
	pub fn generate_key() -> [u8; Self::KEY_LEN] {
		let mut key = [0_u8; Self::KEY_LEN];

		rand::rng().fill_bytes(&mut key);

		key
	}

	/// Seals a plaintext secret under a fresh nonce.
	pub fn encrypt(&self, plaintext: &str) -> Result<String, IntegrityError> {
		let mut nonce_bytes = [0_u8; NONCE_LEN];

		rand::rng().fill_bytes(&mut nonce_bytes);

		let sealed = self
			.cipher
			.encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
			.map_err(|_| IntegrityError::Seal)?;
		let mut payload = Vec::with_capacity(NONCE_LEN + sealed.len());

		payload.extend_from_slice(&nonce_bytes);
		payload.extend_from_slice(&sealed);

		Ok(STANDARD.encode(payload))
	}

	/// Authenticates and opens a secret produced by [`TokenCipher::encrypt`].
	pub fn decrypt(&self, ciphertext: &str) -> Result<String, IntegrityError> {
		let payload = STANDARD.decode(ciphertext).map_err(IntegrityError::Encoding)?;

		if payload.len() < NONCE_LEN + TAG_LEN {
			return Err(IntegrityError::Truncated { len: payload.len() });
		}

		let (nonce, sealed) = payload.split_at(NONCE_LEN);
		let plaintext = self
			.cipher
			.decrypt(Nonce::from_slice(nonce), sealed)
			.map_err(|_| IntegrityError::Authentication)?;

		String::from_utf8(plaintext).map_err(IntegrityError::Utf8)
	}

	/// Seals the access and refresh secrets of a plaintext token.
	///
	/// Absent or empty secrets are left untouched. The token is only modified when
	/// every present secret sealed successfully.
	pub fn encrypt_token(&self, token: &mut PlatformToken) -> Result<(), IntegrityError> {
		token.ensure_plaintext()?;

		let access = self.seal_field(&token.access_token)?;
		let refresh = match token.refresh_token.as_ref() {
			Some(secret) => Some(self.seal_field(secret)?),
			None => None,
		};

		token.access_token = access;
		token.refresh_token = refresh;
		token.set_secret_state(SecretState::Sealed);

		Ok(())
	}

	/// Opens the access and refresh secrets of a sealed token.
	///
	/// On failure the token keeps its sealed secrets.
	pub fn decrypt_token(&self, token: &mut PlatformToken) -> Result<(), IntegrityError> {
		token.ensure_sealed()?;

		let access = self.open_field(&token.access_token)?;
		let refresh = match token.refresh_token.as_ref() {
			Some(secret) => Some(self.open_field(secret)?),
			None => None,
		};

		token.access_token = access;
		token.refresh_token = refresh;
		token.set_secret_state(SecretState::Plaintext);

		Ok(())
	}

	fn seal_field(&self, secret: &TokenSecret) -> Result<TokenSecret, IntegrityError> {
		if secret.is_empty() {
			return Ok(secret.clone());
		}

		self.encrypt(secret.expose()).map(TokenSecret::new)
	}

	fn open_field(&self, secret: &TokenSecret) -> Result<TokenSecret, IntegrityError> {
		if secret.is_empty() {
			return Ok(secret.clone());
		}

		self.decrypt(secret.expose()).map(TokenSecret::new)
	}
}
impl Debug for TokenCipher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenCipher(<redacted>)")
	}
}
