//! Handlers for `/consult/sessions` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/consult/sessions` | The caller's sessions, newest first |
//! | `POST`   | `/consult/sessions` | Body: `{"member_id": "<uuid>"}` |
//! | `DELETE` | `/consult/sessions/:id` | Removes the session and its history |
//! | `GET`    | `/consult/sessions/:id/messages` | Oldest first |
//! | `POST`   | `/consult/sessions/:id/chat` | Body: `{"content": "..."}` |
//! | `POST`   | `/consult/sessions/:id/plan` | Stores a care plan from the history |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use kincare_core::{
  advisor::Advisor,
  consult::{ChatMessage, ConsultSession},
  orchestrator::{PlanOutcome, TurnOutcome},
  store::CareStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AppState, CurrentUser, error::ApiError};

// ─── Sessions ─────────────────────────────────────────────────────────────────

/// `GET /consult/sessions`
pub async fn list<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<ConsultSession>>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  Ok(Json(state.consult.list_sessions(user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub member_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CreatedSession {
  #[serde(flatten)]
  pub session: ConsultSession,
  pub welcome: ChatMessage,
}

/// `POST /consult/sessions`
pub async fn create<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  let (session, welcome) = state.consult.create_session(user_id, body.member_id).await?;
  Ok((StatusCode::CREATED, Json(CreatedSession { session, welcome })))
}

/// `DELETE /consult/sessions/:id`
pub async fn delete_one<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  state.consult.delete_session(id, user_id).await?;
  Ok(Json(json!({ "ok": true })))
}

/// `GET /consult/sessions/:id/messages`
pub async fn messages<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  Ok(Json(state.consult.messages(id, user_id).await?))
}

// ─── Turns ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatBody {
  pub content: String,
}

/// `POST /consult/sessions/:id/chat`
pub async fn chat<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
  Json(body): Json<ChatBody>,
) -> Result<Json<TurnOutcome>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  if body.content.trim().is_empty() {
    return Err(ApiError::BadRequest("content must not be empty".into()));
  }
  Ok(Json(state.consult.post_message(id, user_id, body.content).await?))
}

/// `POST /consult/sessions/:id/plan`
pub async fn plan<S, A>(
  State(state): State<AppState<S, A>>,
  CurrentUser(user_id): CurrentUser,
  Path(id): Path<Uuid>,
) -> Result<Json<PlanOutcome>, ApiError>
where
  S: CareStore,
  A: Advisor,
{
  Ok(Json(state.consult.generate_plan(id, user_id).await?))
}
