//! Identity token verification.
//!
//! Tokens are HS256 JWTs minted by whatever service handles sign-in. The
//! claims carry the participant id, an optional display name and the usual
//! expiry:
//!
//! ```text
//! {"user_id": 7, "name": "alice", "iat": 1700000000, "exp": 1700604800}
//! ```

use chrono::{Duration, Utc};
use duet_proto::{Identity, ParticipantId};
use http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_TOKEN_DAYS: i64 = 7;

/// Lifetime of tokens issued by the `mint-token` command.
pub fn default_token_ttl() -> Duration {
    Duration::days(DEFAULT_TOKEN_DAYS)
}

/// Token verification errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(e),
        }
    }
}

/// Turns a presented token into an [`Identity`].
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    iat: i64,
    exp: i64,
}

/// Verifies HS256 identity tokens signed with a shared secret.
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for `identity` valid for `ttl`.
    pub fn mint(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: identity.id,
            name: Some(identity.name.clone()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token.trim(), &self.decoding, &self.validation)?;
        let Claims { user_id, name, .. } = data.claims;
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| user_id.to_string());
        Ok(Identity::new(user_id, name))
    }
}

/// Token carried by a request's `token` cookie or `Authorization: Bearer`
/// header, in that order.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == "token" && !value.is_empty()).then(|| value.to_string())
        });
    if from_cookie.is_some() {
        return from_cookie;
    }

    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
