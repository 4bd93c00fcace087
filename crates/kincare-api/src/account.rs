//! Handlers for health, sign-in, and the caller's own profile.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/health` | Unauthenticated liveness probe |
//! | `POST` | `/auth/dev` | Development sign-in; 404 when disabled |
//! | `GET`  | `/me` | The caller's user record |
//! | `PUT`  | `/me` | Body: any of `full_name`, `gender`, `age` |

use axum::{Json, extract::State};
use kincare_core::{
  account,
  advisor::Advisor,
  member::{User, UserPatch},
  store::CareStore,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{AppState, CurrentUser, error::ApiError};

/// External identity used by the development sign-in.
pub const DEV_EXTERNAL_ID: &str = "dev_openid_001";
const DEV_NICKNAME: &str = "Dev User";

/// `GET /health`
pub async fn health() -> Json<Value> { Json(json!({ "ok": true })) }

// ─── Sign-in ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub token_type:   &'static str,
  pub user:         User,
}

/// `POST /auth/dev` — sign in as the fixed development identity.
pub async fn dev_login<S, A>(
  State(state): State<AppState<S, A>>,
) -> Result<Json<TokenResponse>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  if !state.tokens.dev_login {
    return Err(ApiError::NotFound("development sign-in is disabled".into()));
  }

  let user =
    account::sign_in(state.store.as_ref(), DEV_EXTERNAL_ID, Some(DEV_NICKNAME)).await?;
  let access_token = state.tokens.issue(user.user_id)?;

  tracing::info!(user_id = %user.user_id, "development sign-in");
  Ok(Json(TokenResponse { access_token, token_type: "bearer", user }))
}

// ─── Profile ──────────────────────────────────────────────────────────────────

async fn load_user<S: CareStore>(store: &S, user_id: uuid::Uuid) -> Result<User, ApiError> {
  store
    .get_user(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("user {user_id}")))
}

/// `GET /me`
pub async fn me<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
) -> Result<Json<User>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  Ok(Json(load_user(state.store.as_ref(), user_id).await?))
}

/// `PUT /me`
pub async fn update_me<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  let mut user = load_user(state.store.as_ref(), user_id).await?;
  user.apply(patch);
  state
    .store
    .update_user(user.clone())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(user))
}
