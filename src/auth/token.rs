//! Bearer token codec
//!
//! Tokens are HMAC-signed and self-contained; no server-side storage.
//! Format: base64(payload).base64(hmac_sha256(payload))

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::data::UserId;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;

/// Signed token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Issues and verifies bearer tokens
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| AppError::Internal(e.into()))
    }

    /// Issue a token for `user`
    ///
    /// # Returns
    /// The token and the instant it stops being accepted
    pub fn issue(&self, user: UserId) -> Result<(String, DateTime<Utc>), AppError> {
        let claims = TokenClaims {
            user_id: user,
            expires_at: Utc::now() + self.ttl,
        };

        let payload = serde_json::to_string(&claims).map_err(|e| AppError::Internal(e.into()))?;
        let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

        let mut mac = self.mac()?;
        mac.update(payload_b64.as_bytes());
        let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok((format!("{payload_b64}.{signature_b64}"), claims.expires_at))
    }

    /// Verify a token and return the user it was issued for
    ///
    /// # Errors
    /// `Unauthenticated` if the token is malformed, forged or expired
    pub fn verify(&self, token: &str) -> Result<UserId, AppError> {
        let (payload_b64, signature_b64) =
            token.split_once('.').ok_or(AppError::Unauthenticated)?;

        let signature = general_purpose::URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AppError::Unauthenticated)?;

        let mut mac = self.mac()?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AppError::Unauthenticated)?;

        let payload = general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AppError::Unauthenticated)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| AppError::Unauthenticated)?;

        if claims.is_expired() {
            return Err(AppError::Unauthenticated);
        }

        Ok(claims.user_id)
    }
}
