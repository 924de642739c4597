//! Session Token Service: self-contained signed access/refresh tokens for
//! end users. There is no server-side session store; everything a verifier
//! needs is embedded in the token itself.
//!
//! The refresh token is deliberately not rotated on use; a refresh call
//! returns a new access token and leaves the presented refresh token valid
//! until its natural expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use boardroom_core::config::SessionConfig;

/// Token kind embedded in the claim set. Checked on every verification: a
/// refresh token is never accepted where an access token is required.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    kind: TokenKind,
    iat: i64,
    exp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionTokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token expired")]
    Expired,
    #[error("expected {expected:?} token, got {got:?}")]
    KindMismatch { expected: TokenKind, got: TokenKind },
    #[error("invalid token")]
    Invalid,
    #[error("could not sign token: {0}")]
    Signing(String),
}

/// Issues and verifies the user-facing token pair.
#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionTokens {
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: Duration::seconds(config.access_ttl_secs as i64),
            refresh_ttl: Duration::seconds(config.refresh_ttl_secs as i64),
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Mint a fresh access/refresh pair for a user.
    pub fn issue(&self, user_id: &str) -> Result<SessionTokenPair, AuthError> {
        Ok(SessionTokenPair {
            access_token: self.mint(user_id, TokenKind::Access, self.access_ttl)?,
            refresh_token: self.mint(user_id, TokenKind::Refresh, self.refresh_ttl)?,
        })
    }

    /// Verify signature, expiry, and kind; returns the subject.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<String, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|error| {
                match error.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                    _ => AuthError::Invalid,
                }
            })?;

        if data.claims.kind != expected {
            return Err(AuthError::KindMismatch { expected, got: data.claims.kind });
        }
        Ok(data.claims.sub)
    }

    /// Exchange a valid refresh token for a new access token with a fresh
    /// expiry. The refresh token itself is returned to the caller unchanged.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let subject = self.verify(refresh_token, TokenKind::Refresh)?;
        self.mint(&subject, TokenKind::Access, self.access_ttl)
    }

    fn mint(&self, user_id: &str, kind: TokenKind, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| AuthError::Signing(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SessionTokens {
        let config = SessionConfig {
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string().into(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 2_592_000,
        };
        SessionTokens::new(&config)
    }

    #[test]
    fn issued_access_token_verifies_immediately() {
        let tokens = service();
        let pair = tokens.issue("u1").expect("issue");
        let subject = tokens.verify(&pair.access_token, TokenKind::Access).expect("verify");
        assert_eq!(subject, "u1");
    }

    #[test]
    fn refresh_token_is_rejected_where_access_is_required() {
        let tokens = service();
        let pair = tokens.issue("u1").expect("issue");

        let error = tokens
            .verify(&pair.refresh_token, TokenKind::Access)
            .expect_err("kind mismatch must fail");
        assert_eq!(
            error,
            AuthError::KindMismatch { expected: TokenKind::Access, got: TokenKind::Refresh }
        );

        // And the other way round.
        let error = tokens
            .verify(&pair.access_token, TokenKind::Refresh)
            .expect_err("kind mismatch must fail");
        assert!(matches!(error, AuthError::KindMismatch { .. }));
    }

    #[test]
    fn expired_token_fails_verification() {
        let tokens = service();
        let stale = tokens
            .mint("u1", TokenKind::Access, Duration::seconds(-5))
            .expect("mint backdated token");
        assert_eq!(tokens.verify(&stale, TokenKind::Access), Err(AuthError::Expired));
    }

    #[test]
    fn refresh_mints_a_new_access_token_for_the_same_subject() {
        let tokens = service();
        let pair = tokens.issue("u1").expect("issue");

        let new_access = tokens.refresh(&pair.refresh_token).expect("refresh");
        assert_eq!(tokens.verify(&new_access, TokenKind::Access).expect("verify"), "u1");

        // Refresh token is not rotated: a second refresh with the same token
        // still works.
        let another = tokens.refresh(&pair.refresh_token).expect("second refresh");
        assert_eq!(tokens.verify(&another, TokenKind::Access).expect("verify"), "u1");
    }

    #[test]
    fn refresh_rejects_invalid_and_expired_tokens() {
        let tokens = service();
        assert_eq!(tokens.refresh("not-a-token"), Err(AuthError::Invalid));

        let stale = tokens
            .mint("u1", TokenKind::Refresh, Duration::seconds(-5))
            .expect("mint backdated token");
        assert_eq!(tokens.refresh(&stale), Err(AuthError::Expired));

        // An access token is not a refresh credential.
        let pair = tokens.issue("u1").expect("issue");
        assert!(matches!(
            tokens.refresh(&pair.access_token),
            Err(AuthError::KindMismatch { .. })
        ));
    }

    #[test]
    fn tokens_signed_with_a_different_secret_are_invalid() {
        let tokens = service();
        let other = SessionTokens::new(&SessionConfig {
            jwt_secret: "ffffffffffffffffffffffffffffffff".to_string().into(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 2_592_000,
        });
        let pair = other.issue("u1").expect("issue");
        assert_eq!(tokens.verify(&pair.access_token, TokenKind::Access), Err(AuthError::Invalid));
    }
}
