//! Handlers for `/advice` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/advice?member_id=<id>` | Newest first |
//! | `POST` | `/advice` | Member must belong to the caller |
//! | `GET`  | `/advice/:id` | 404 if absent or not the caller's |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use kincare_core::{
  account,
  advisor::Advisor,
  care::{Advice, NewAdvice},
  store::CareStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, CurrentUser, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub member_id: Uuid,
}

/// `GET /advice?member_id=<id>`
///
/// Advice outlives its member, so the member is not required to exist.
pub async fn list<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Advice>>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  let advice = state
    .store
    .list_advice(user_id, params.member_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(advice))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub member_id: Uuid,
  pub title:     String,
  #[serde(default)]
  pub reason:    String,
  #[serde(default)]
  pub tags:      Vec<String>,
  #[serde(default)]
  pub detail:    Vec<String>,
}

/// `POST /advice`
pub async fn create<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  if body.title.trim().is_empty() {
    return Err(ApiError::BadRequest("title is required".into()));
  }
  account::owned_member(state.store.as_ref(), user_id, body.member_id).await?;

  let advice = state
    .store
    .add_advice(NewAdvice {
      user_id,
      member_id: body.member_id,
      title: body.title,
      reason: body.reason,
      tags: body.tags,
      detail: body.detail,
    })
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(advice)))
}

/// `GET /advice/:id`
pub async fn get_one<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Advice>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  state
    .store
    .get_advice(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .filter(|a| a.user_id == user_id)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("advice {id}")))
}
