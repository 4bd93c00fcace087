//! Handlers for `/members` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/members` | The caller's members, newest first |
//! | `POST`   | `/members` | `tags` may be a list of names or a full map; not the self relation |
//! | `PUT`    | `/members/:id` | Partial update; `tags` replaces the profile; the self relation is fixed |
//! | `DELETE` | `/members/:id` | 403 for the self member |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use kincare_core::{
  account,
  advisor::Advisor,
  member::{FamilyMember, MemberPatch, NewMember, SELF_RELATION},
  profile::TagProfile,
  store::CareStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AppState, CurrentUser, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /members`
pub async fn list<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<FamilyMember>>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  let members = state
    .store
    .list_members(user_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(members))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:           String,
  pub relation:       String,
  pub gender:         Option<String>,
  pub age:            Option<u32>,
  pub height:         Option<f64>,
  pub weight:         Option<f64>,
  pub allergies:      Option<String>,
  pub meds:           Option<String>,
  pub special_status: Option<String>,
  #[serde(default)]
  pub tags:           TagProfile,
}

/// `POST /members`
pub async fn create<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  if body.name.trim().is_empty() || body.relation.trim().is_empty() {
    return Err(ApiError::BadRequest("name and relation are required".into()));
  }
  if body.relation.trim() == SELF_RELATION {
    return Err(ApiError::Forbidden(format!(
      "relation {SELF_RELATION:?} is reserved for the self member"
    )));
  }

  let input = NewMember {
    user_id,
    name: body.name,
    relation: body.relation,
    gender: body.gender,
    age: body.age,
    height: body.height,
    weight: body.weight,
    allergies: body.allergies,
    meds: body.meds,
    special_status: body.special_status,
    tags: body.tags,
  };
  let member = state
    .store
    .add_member(input)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(member)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /members/:id`
pub async fn update<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
  Json(patch): Json<MemberPatch>,
) -> Result<Json<FamilyMember>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  let member = account::update_member(state.store.as_ref(), user_id, id, patch).await?;
  Ok(Json(member))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /members/:id`
pub async fn delete_one<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  account::delete_member(state.store.as_ref(), user_id, id).await?;
  Ok(Json(json!({ "ok": true })))
}
