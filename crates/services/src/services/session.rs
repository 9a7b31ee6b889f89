//! Signed session tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::roles::SessionView;

pub const SESSION_AUDIENCE: &str = "authenticated";
pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("session subject is not a user id: {0}")]
    Subject(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// HS256 keys derived from the configured session secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionKeys {
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SESSION_AUDIENCE]);

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
        }
    }

    /// Check signature, audience and expiry, then project the claims.
    pub fn verify(&self, token: &str) -> Result<SessionView, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)?;
        let claims = data.claims;
        let user_id =
            Uuid::parse_str(&claims.sub).map_err(|_| SessionError::Subject(claims.sub.clone()))?;

        Ok(SessionView {
            user_id,
            email: claims.email,
            metadata_role: claims.user_metadata.role,
        })
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: Option<String>,
        metadata_role: Option<String>,
        ttl: Duration,
    ) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email,
            aud: SESSION_AUDIENCE.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            user_metadata: UserMetadata {
                role: metadata_role,
            },
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }
}
