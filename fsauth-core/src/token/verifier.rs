use std::sync::Arc;

use jsonwebtoken::{Validation, crypto, decode, errors::ErrorKind};

use super::{Claims, Clock, TokenError, VerificationKey};

/// Checks tokens produced by a [`TokenIssuer`](super::TokenIssuer).
///
/// Order of checks: shape, signature, payload, expiry. The signature is
/// verified over the raw segments before anything is parsed, so a token
/// altered in any byte reports [`TokenError::InvalidSignature`] rather than
/// a parse error.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key: VerificationKey,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    /// Accept tokens signed by `key` and issued by `issuer`.
    pub fn new(
        key: VerificationKey,
        issuer: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key,
            issuer: issuer.into(),
            clock,
        }
    }

    /// Verify `token` and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let (message, signature) = split_signed(token)?;
        let algorithm = self.key.algorithm().into();

        let signed = crypto::verify(
            signature,
            message.as_bytes(),
            self.key.decoding_key(),
            algorithm,
        )
        .map_err(|_| TokenError::InvalidSignature)?;
        if !signed {
            return Err(TokenError::InvalidSignature);
        }

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = decode::<Claims>(token, self.key.decoding_key(), &validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidIssuer => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })?
            .claims;

        if claims.sub != claims.user.id.to_string() {
            return Err(TokenError::Malformed);
        }
        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

/// Split `header.payload.signature` into the signed message and the
/// signature. Only the segment layout is checked here; the content of each
/// segment is left to signature verification.
fn split_signed(token: &str) -> Result<(&str, &str), TokenError> {
    let mut segments = token.split('.');
    let well_formed = segments.clone().count() == 3
        && segments.all(|segment| !segment.is_empty());
    if !well_formed {
        return Err(TokenError::Malformed);
    }

    let split_at = token.rfind('.').ok_or(TokenError::Malformed)?;
    Ok((&token[..split_at], &token[split_at + 1..]))
}
