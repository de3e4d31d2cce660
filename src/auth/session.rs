//! Session management for authentication

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::types::{AccessClaims, Tenant, User};
use crate::error::Error;

pub(crate) const NO_AUTHENTICATED_USER: &str = "no authenticated user";

/// Session data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds at issue time
    #[serde(default)]
    pub expires_in: i64,
    /// Unix timestamp after which the access token is rejected
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Create a new session expiring `expires_in` seconds from now
    pub fn new(access_token: String, refresh_token: String, user: User, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: default_token_type(),
            expires_in,
            expires_at: Some(Utc::now().timestamp() + expires_in),
            user,
        }
    }

    /// Fill `expires_at` from `expires_in` when the server omitted it
    pub(crate) fn stamped(mut self) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// Expiry from `expires_at`, else from the token's `exp` claim
    pub fn expiry(&self) -> Option<i64> {
        self.expires_at
            .or_else(|| self.claims().ok().and_then(|claims| claims.exp))
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        match self.expiry() {
            Some(expires_at) => Utc::now().timestamp() >= expires_at,
            None => false,
        }
    }

    /// Tenant identity carried by this session
    pub fn tenant(&self) -> Result<Tenant, Error> {
        let user_id = if self.user.id.trim().is_empty() {
            self.claims().ok().and_then(|claims| claims.sub)
        } else {
            Some(self.user.id.clone())
        };

        match user_id {
            Some(user_id) if !user_id.is_empty() && !self.access_token.is_empty() => Ok(Tenant {
                user_id,
                access_token: self.access_token.clone(),
            }),
            _ => Err(Error::auth(NO_AUTHENTICATED_USER)),
        }
    }

    // The gateway verifies signatures; the client only reads claims.
    pub(crate) fn claims(&self) -> Result<AccessClaims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<AccessClaims>(
            &self.access_token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )?;
        Ok(data.claims)
    }
}
