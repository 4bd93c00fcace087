//! Advice and task records attached to a family member.
//!
//! Advice is immutable once written. A task only ever changes by being
//! completed, which flips `done` to `true` and appends to `logs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Advice ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
  pub advice_id:  Uuid,
  pub user_id:    Uuid,
  pub member_id:  Uuid,
  pub title:      String,
  /// Why the advice was given.
  pub reason:     String,
  /// Categorical labels, e.g. "饮食", "运动".
  pub tags:       Vec<String>,
  pub detail:     Vec<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::CareStore::add_advice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdvice {
  pub user_id:   Uuid,
  pub member_id: Uuid,
  pub title:     String,
  pub reason:    String,
  pub tags:      Vec<String>,
  pub detail:    Vec<String>,
}

// ─── Task ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub task_id:    Uuid,
  pub user_id:    Uuid,
  pub member_id:  Uuid,
  pub title:      String,
  /// Frequency hint, e.g. "每天两次".
  pub freq:       String,
  /// When to start or finish, free text.
  pub due:        String,
  pub done:       bool,
  pub detail:     Vec<String>,
  /// Completion log, one entry per completion event.
  pub logs:       Vec<String>,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::CareStore::add_task`]. New tasks always start
/// undone with an empty log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
  pub user_id:   Uuid,
  pub member_id: Uuid,
  pub title:     String,
  pub freq:      String,
  pub due:       String,
  pub detail:    Vec<String>,
}
