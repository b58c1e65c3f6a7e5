//! Token issuance and validation for authenticated users.
//!
//! Access and refresh tokens are both HS256-signed statements of the user's
//! `{id, username, email}`, distinguished by a `typ` claim. There is no
//! server-side revocation list: validity is signature plus expiry.

use crate::app_state::AppState;
use crate::config::AuthConfig;
use crate::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Distinguishes the two token flavours so one cannot stand in for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The identity a token speaks for. Also the `user` object in the login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Claims carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    // ---
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub typ: TokenKind,
    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,
    /// Expiry (Unix timestamp, seconds).
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        // ---
        Identity {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Access/refresh token pair as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("expected {expected:?} token, got {actual:?}")]
    WrongKind { expected: TokenKind, actual: TokenKind },

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Token lifetimes. Signed durations so tests can mint already-expired tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtls {
    /// Access token lifetime at login.
    pub access: Duration,
    /// Access token lifetime when minted by a refresh.
    pub refreshed_access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        // ---
        Self {
            access: Duration::minutes(15),
            refreshed_access: Duration::minutes(40),
            refresh: Duration::days(7),
        }
    }
}

// ---

/// Signs and verifies tokens with a single shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    // ---
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttls: TokenTtls,
}

impl TokenIssuer {
    // ---
    pub fn new(secret: &str, ttls: TokenTtls) -> Self {
        // ---
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttls,
        }
    }

    /// Builds an issuer from startup configuration.
    ///
    /// # Errors
    /// Fails if a configured lifetime does not fit a signed duration.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        // ---
        let ttls = TokenTtls {
            access: Duration::from_std(config.access_ttl)?,
            refreshed_access: Duration::from_std(config.refreshed_access_ttl)?,
            refresh: Duration::from_std(config.refresh_ttl)?,
        };

        Ok(Self::new(&config.jwt_secret, ttls))
    }

    /// Issues the access/refresh pair handed out at login.
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        // ---
        Ok(TokenPair {
            token: self.sign(identity, TokenKind::Access, self.ttls.access)?,
            refresh_token: self.sign(identity, TokenKind::Refresh, self.ttls.refresh)?,
        })
    }

    /// Verifies a refresh token and re-issues a pair with the same identity.
    ///
    /// The claims are copied from the presented token; the credential store is
    /// not consulted.
    pub fn refresh(&self, refresh_token: &str) -> Result<(Identity, TokenPair), TokenError> {
        // ---
        let claims = self.validate(refresh_token, TokenKind::Refresh)?;
        let identity = claims.identity();

        let pair = TokenPair {
            token: self.sign(&identity, TokenKind::Access, self.ttls.refreshed_access)?,
            refresh_token: self.sign(&identity, TokenKind::Refresh, self.ttls.refresh)?,
        };

        Ok((identity, pair))
    }

    /// Checks signature, expiry and token kind.
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        // ---
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            })?
            .claims;

        if claims.typ != expected {
            return Err(TokenError::WrongKind {
                expected,
                actual: claims.typ,
            });
        }

        Ok(claims)
    }

    fn sign(&self, identity: &Identity, typ: TokenKind, ttl: Duration) -> Result<String, TokenError> {
        // ---
        let now = Utc::now();
        let claims = Claims {
            id: identity.id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            typ,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(TokenError::Signing)
    }
}

/// Reads claims without checking the signature or expiry.
///
/// For holders of a token who do not have the secret (the client deciding
/// whether to refresh). Never use it to authorize anything.
pub fn peek_claims(token: &str) -> Result<Claims, TokenError> {
    // ---
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    Ok(decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?.claims)
}

// ============================================================================
// Request extractor
// ============================================================================

/// A caller that presented a valid access token.
///
/// A missing or unparseable `Authorization` header is rejected with 401; a
/// token that fails validation is rejected with 403.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl AuthenticatedUser {
    // ---
    /// Only the profile's owner may read or change it.
    pub fn require_owner(&self, profile_id: Uuid) -> Result<(), ApiError> {
        // ---
        if self.0.id == profile_id {
            Ok(())
        } else {
            tracing::warn!(
                "User {} attempted to access profile {}",
                self.0.id,
                profile_id
            );
            Err(ApiError::Forbidden("Access to this profile is not allowed".to_string()))
        }
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // ---
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                // ---
                tracing::debug!("Missing or malformed Authorization header");
                ApiError::Unauthorized("Missing bearer token".to_string())
            })?;

        let claims = state
            .tokens()
            .validate(token, TokenKind::Access)
            .map_err(|e| {
                // ---
                tracing::debug!("Rejected access token: {}", e);
                ApiError::Forbidden("Invalid or expired token".to_string())
            })?;

        Ok(AuthenticatedUser(claims))
    }
}
