//! Access token verification for the host application's signed tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use twofa_core::AccountId;

/// Token claims as issued by the host application
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (account id)
    pub sub: String,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Issued at (timestamp)
    #[serde(default)]
    pub iat: Option<i64>,
    /// Token type (access or refresh)
    #[serde(rename = "type", default)]
    pub token_type: Option<TokenType>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl Claims {
    /// Access token claims for an account, valid for `ttl`
    pub fn access(id: AccountId, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
            token_type: Some(TokenType::Access),
        }
    }

    pub fn account_id(&self) -> Result<AccountId, TokenError> {
        AccountId::from_str(&self.sub).map_err(|_| TokenError::InvalidSubject(self.sub.clone()))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Refresh tokens cannot be used for requests")]
    RefreshToken,

    #[error("Token subject is not an account id: {0}")]
    InvalidSubject(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// HS256 verifier keyed with the host application's secret
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify signature, expiry and token type
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        if data.claims.token_type == Some(TokenType::Refresh) {
            return Err(TokenError::RefreshToken);
        }

        Ok(data.claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_access_token() {
        let verifier = TokenVerifier::new(b"test-secret");
        let id = AccountId::new();
        let token = verifier.sign(&Claims::access(id, Duration::hours(1))).unwrap();

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.account_id().unwrap(), id);
        assert_eq!(claims.token_type, Some(TokenType::Access));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = TokenVerifier::new(b"test-secret");
        let token = verifier
            .sign(&Claims::access(AccountId::new(), Duration::hours(-2)))
            .unwrap();

        assert_eq!(verifier.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenVerifier::new(b"one");
        let verifier = TokenVerifier::new(b"two");
        let token = issuer
            .sign(&Claims::access(AccountId::new(), Duration::hours(1)))
            .unwrap();

        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid(_))));
        assert!(matches!(
            verifier.verify("not-a-token"),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_refresh_token_rejected() {
        let verifier = TokenVerifier::new(b"test-secret");
        let mut claims = Claims::access(AccountId::new(), Duration::hours(1));
        claims.token_type = Some(TokenType::Refresh);
        let token = verifier.sign(&claims).unwrap();

        assert_eq!(verifier.verify(&token).unwrap_err(), TokenError::RefreshToken);
    }

    #[test]
    fn test_non_uuid_subject() {
        let verifier = TokenVerifier::new(b"test-secret");
        let mut claims = Claims::access(AccountId::new(), Duration::hours(1));
        claims.sub = "admin".to_string();
        let token = verifier.sign(&claims).unwrap();

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(
            claims.account_id().unwrap_err(),
            TokenError::InvalidSubject("admin".to_string())
        );
    }
}
