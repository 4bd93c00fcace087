//! Handlers for `/tasks` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tasks?member_id=<id>` | Newest first |
//! | `POST` | `/tasks` | Member must belong to the caller |
//! | `GET`  | `/tasks/:id` | 404 if absent or not the caller's |
//! | `POST` | `/tasks/:id/complete` | Marks done and runs the risk engine |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use kincare_core::{
  account,
  advisor::Advisor,
  care::{NewTask, Task},
  completion::{self, TaskCompletion},
  store::CareStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, CurrentUser, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub member_id: Uuid,
}

/// `GET /tasks?member_id=<id>`
pub async fn list<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Task>>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  let tasks = state
    .store
    .list_tasks(user_id, params.member_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(tasks))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub member_id: Uuid,
  pub title:     String,
  #[serde(default)]
  pub freq:      String,
  #[serde(default)]
  pub due:       String,
  #[serde(default)]
  pub detail:    Vec<String>,
}

/// `POST /tasks`
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

  let task = state
    .store
    .add_task(NewTask {
      user_id,
      member_id: body.member_id,
      title: body.title,
      freq: body.freq,
      due: body.due,
      detail: body.detail,
    })
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(task)))
}

/// `GET /tasks/:id`
pub async fn get_one<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  state
    .store
    .get_task(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .filter(|t| t.user_id == user_id)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("task {id}")))
}

/// `POST /tasks/:id/complete`
pub async fn complete<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<TaskCompletion>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  let done = completion::complete_task(state.store.as_ref(), user_id, id).await?;
  Ok(Json(done))
}
