use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("step-up signing key is not configured")]
    MissingSigningKey,

    #[error("failed to sign step-up token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("invalid step-up token: {0}")]
    Invalid(String),
}

/// Claims of a step-up token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepUpClaims {
    /// Account id
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Mints and verifies short-lived HS256 step-up tokens.
///
/// Only HS256 is accepted on verification. Expiry is judged against the
/// injected clock with no leeway.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(
        signing_key: &Secret<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let key = signing_key.expose_secret();
        if key.is_empty() {
            return Err(TokenError::MissingSigningKey);
        }

        tracing::info!(ttl_seconds = ttl.num_seconds(), "Token signer initialized with HS256 key");

        Ok(Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            ttl,
            clock,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = StepUpClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Returns the subject of a valid token.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<StepUpClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Invalid("token expired".to_string()));
        }

        if data.claims.sub.is_empty() {
            return Err(TokenError::Invalid("empty subject".to_string()));
        }

        Ok(data.claims.sub)
    }
}
