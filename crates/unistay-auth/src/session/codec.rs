//! Signed session tokens.
//!
//! Sessions, OAuth `state` parameters and other short-lived browser-held
//! values are serialized as HS256 JWTs signed with the configured session
//! secret. Every token type carries a `typ` claim so one kind of token can
//! never be replayed as another.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::Session;
use crate::error::AuthError;
use crate::role::Role;

/// `typ` claim of session tokens.
pub const SESSION_TOKEN_TYPE: &str = "session";

/// Errors that can occur while encoding or decoding signed tokens.
#[derive(Debug, thiserror::Error)]
pub enum SessionCodecError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// The token is malformed or its claims do not deserialize.
    #[error("Failed to decode token: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },

    /// The token's `exp` has passed.
    #[error("Token expired")]
    Expired,

    /// The token signature does not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token is of a different type than expected.
    #[error("Unexpected token type: expected {expected}, got {actual}")]
    WrongType {
        /// Expected `typ` claim.
        expected: String,
        /// Actual `typ` claim.
        actual: String,
    },
}

impl From<jsonwebtoken::errors::Error> for SessionCodecError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Decoding {
                message: err.to_string(),
            },
        }
    }
}

impl From<SessionCodecError> for AuthError {
    fn from(err: SessionCodecError) -> Self {
        match err {
            SessionCodecError::Expired => AuthError::SessionExpired,
            SessionCodecError::Encoding { message } => AuthError::internal(message),
            other => AuthError::invalid_session(other.to_string()),
        }
    }
}

/// Claims of a persisted session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Token type, always [`SESSION_TOKEN_TYPE`].
    pub typ: String,
    /// Backend user id.
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub ver: bool,
    /// Backend access token.
    pub at: String,
    /// Backend refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt: Option<String>,
    /// Access token expiry.
    pub aexp: i64,
    pub iat: i64,
    /// Session hard expiry.
    pub exp: i64,
}

impl From<&Session> for SessionClaims {
    fn from(session: &Session) -> Self {
        Self {
            typ: SESSION_TOKEN_TYPE.to_string(),
            sub: session.user_id.clone(),
            email: session.email.clone(),
            role: session.role,
            ver: session.is_verified,
            at: session.access_token.clone(),
            rt: session.refresh_token.clone(),
            aexp: session.access_expires_at,
            iat: session.issued_at,
            exp: session.expires_at,
        }
    }
}

impl From<SessionClaims> for Session {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
            is_verified: claims.ver,
            access_token: claims.at,
            refresh_token: claims.rt,
            access_expires_at: claims.aexp,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// HS256 signer/verifier for browser-held tokens.
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    /// Creates a codec from the shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs arbitrary claims. The claims must contain an `exp` field.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, SessionCodecError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            SessionCodecError::Encoding {
                message: e.to_string(),
            }
        })
    }

    /// Verifies signature and expiry, then deserializes the claims.
    pub fn decode<T: DeserializeOwned + Clone>(&self, token: &str) -> Result<T, SessionCodecError> {
        let data = decode::<T>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Signs a session.
    pub fn encode_session(&self, session: &Session) -> Result<String, SessionCodecError> {
        self.encode(&SessionClaims::from(session))
    }

    /// Verifies and decodes a session token.
    pub fn decode_session(&self, token: &str) -> Result<Session, SessionCodecError> {
        let claims: SessionClaims = self.decode(token)?;
        if claims.typ != SESSION_TOKEN_TYPE {
            return Err(SessionCodecError::WrongType {
                expected: SESSION_TOKEN_TYPE.to_string(),
                actual: claims.typ,
            });
        }
        Ok(claims.into())
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{now_unix, test_session};

    const SECRET: &str = "test-secret-test-secret-test-secret!";

    #[test]
    fn test_session_token_preserves_claims() {
        let codec = SessionCodec::new(SECRET);
        let session = test_session(Role::Landlord);
        let token = codec.encode_session(&session).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let decoded = codec.decode_session(&token).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let codec = SessionCodec::new(SECRET);
        let other = SessionCodec::new("another-secret-another-secret-12345");
        let token = codec.encode_session(&test_session(Role::Student)).unwrap();

        let err = other.decode_session(&token).unwrap_err();
        assert!(matches!(err, SessionCodecError::InvalidSignature));
        assert!(AuthError::from(err).is_session_error());
    }

    #[test]
    fn test_expired_session_is_rejected() {
        let codec = SessionCodec::new(SECRET);
        let mut session = test_session(Role::Student);
        session.issued_at = now_unix() - 7200;
        session.expires_at = now_unix() - 10;
        let token = codec.encode_session(&session).unwrap();

        let err = codec.decode_session(&token).unwrap_err();
        assert!(matches!(err, SessionCodecError::Expired));
        assert!(matches!(AuthError::from(err), AuthError::SessionExpired));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let codec = SessionCodec::new(SECRET);
        assert!(matches!(
            codec.decode_session("not-a-token"),
            Err(SessionCodecError::Decoding { .. })
        ));
    }

    #[test]
    fn test_other_token_types_are_rejected() {
        #[derive(Clone, Serialize, Deserialize)]
        struct Other {
            typ: String,
            sub: String,
            email: String,
            role: Role,
            at: String,
            aexp: i64,
            iat: i64,
            exp: i64,
        }

        let codec = SessionCodec::new(SECRET);
        let now = now_unix();
        let token = codec
            .encode(&Other {
                typ: "oauth_state".to_string(),
                sub: "1".to_string(),
                email: "a@b.c".to_string(),
                role: Role::Admin,
                at: "x".to_string(),
                aexp: now,
                iat: now,
                exp: now + 60,
            })
            .unwrap();

        assert!(matches!(
            codec.decode_session(&token),
            Err(SessionCodecError::WrongType { .. })
        ));
    }
}
