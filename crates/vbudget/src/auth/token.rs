//! HS256 access tokens carrying the user's e-mail as subject.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("could not validate credentials")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("not authenticated")]
    MissingToken,
    #[error("token missing subject")]
    MissingSubject,
    #[error("could not validate credentials")]
    UnknownSubject,
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct AccessTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl AccessTokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret_key.as_bytes()),
            lifetime: Duration::try_minutes(config.access_token_minutes).unwrap_or(Duration::MAX),
        }
    }

    pub fn issue(&self, email: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: email.to_string(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                .timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header value.
    pub fn bearer(header: Option<&str>) -> Result<&str, AuthError> {
        header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)
    }

    /// Returns the authenticated e-mail.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(AuthError::InvalidToken)?;
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(data.claims.sub)
    }
}
