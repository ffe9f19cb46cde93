use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use jsonwebtoken::{EncodingKey, Header, encode};

use super::{
    Algorithm, Claims, Clock, Identity, IssuedToken, KeyMaterial, TokenError,
    TokenSettings, TokenVerifier,
};

/// Mints signed identity tokens.
pub struct TokenIssuer {
    algorithm: Algorithm,
    signing: EncodingKey,
    settings: TokenSettings,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("settings", &self.settings)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Issue with `keys`' private half and algorithm.
    pub fn new(
        keys: &KeyMaterial,
        settings: TokenSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            algorithm: keys.algorithm(),
            signing: keys.encoding_key().clone(),
            settings,
            clock,
        }
    }

    /// Validity window and issuer in use.
    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// A verifier that accepts exactly what this issuer produces, sharing
    /// its clock.
    pub fn verifier(&self, keys: &KeyMaterial) -> TokenVerifier {
        TokenVerifier::new(
            keys.verification_key(),
            self.settings.issuer.clone(),
            Arc::clone(&self.clock),
        )
    }

    /// Sign a token for `identity`, valid from now until now + ttl.
    ///
    /// Timestamps are whole seconds; `expires_at` on the result matches the
    /// `exp` claim exactly.
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(self.settings.ttl)
            .map_err(|err| TokenError::Signing(format!("ttl out of range: {err}")))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing("expiry overflows".into()))?;

        let claims = Claims {
            sub: identity.id.to_string(),
            user: identity.clone(),
            iss: self.settings.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let value = encode(&Header::new(self.algorithm.into()), &claims, &self.signing)
            .map_err(|err| TokenError::Signing(err.to_string()))?;

        Ok(IssuedToken {
            value,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at),
        })
    }
}
