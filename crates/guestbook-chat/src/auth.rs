use jsonwebtoken::{DecodingKey, Validation, decode};

use guestbook_types::api::Claims;

use crate::error::ChatError;

/// Verifies operator bearer tokens: a pure function of (token, secret,
/// clock). Token issuance happens elsewhere; this only checks the HS256
/// signature and expiry.
pub struct Authorizer {
    secret: String,
}

impl Authorizer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Any malformed, expired, or mis-signed token yields `Unauthorized`;
    /// the caller must reject the operation without touching the store.
    pub fn verify(&self, token: &str) -> Result<Claims, ChatError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ChatError::Unauthorized)?;

        Ok(data.claims)
    }
}
