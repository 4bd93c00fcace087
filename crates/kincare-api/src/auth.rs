//! Bearer-token authentication: HS256 JWT issuing and the [`CurrentUser`]
//! extractor.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use kincare_core::{advisor::Advisor, store::CareStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Registered claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
  /// The user id.
  sub: String,
  iat: i64,
  exp: i64,
}

/// Signing material and token policy for this server instance.
#[derive(Clone)]
pub struct TokenKeys {
  encoding:      EncodingKey,
  decoding:      DecodingKey,
  ttl:           Duration,
  /// Whether `POST /auth/dev` is served.
  pub dev_login: bool,
}

impl TokenKeys {
  pub fn new(secret: &[u8], ttl: Duration, dev_login: bool) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      ttl,
      dev_login,
    }
  }

  /// Sign an access token for `user_id`.
  pub fn issue(&self, user_id: Uuid) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
      sub: user_id.to_string(),
      iat: now.timestamp(),
      exp: (now + self.ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
      .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
  }

  /// Verify signature and expiry and return the user id.
  pub fn verify(&self, token: &str) -> Result<Uuid, ApiError> {
    let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
      .map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthorized
      })?;
    Uuid::parse_str(&data.claims.sub).map_err(|_| ApiError::Unauthorized)
  }
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or(ApiError::Unauthorized)
}

/// The authenticated caller. Present in a handler means the request carried a
/// valid token.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

impl<S, A> FromRequestParts<AppState<S, A>> for CurrentUser
where
  S: CareStore + 'static,
  A: Advisor + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, A>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers)?;
    Ok(CurrentUser(state.tokens.verify(token)?))
  }
}
