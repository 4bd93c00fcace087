//! Task completion — the trigger for the risk engine.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  care::Task,
  profile::TagProfile,
  risk,
  store::{CareStore, CompletionCommit, CompletionReceipt},
};

/// Prefix of the completion-log entry; followed by an RFC 3339 timestamp.
pub const COMPLETION_LOG_PREFIX: &str = "已完成";

/// Result of [`complete_task`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskCompletion {
  pub task:    Task,
  /// The member's profile after the risk engine ran. `None` when the task was
  /// already done or its member no longer exists.
  pub profile: Option<TagProfile>,
}

/// Mark a task done and evolve its member's tag profile.
///
/// Completing an already-done task changes nothing, even when two
/// completions race. If the task's member has been deleted the task is still
/// marked done and no profile is touched.
pub async fn complete_task<S: CareStore>(
  store: &S,
  user_id: Uuid,
  task_id: Uuid,
) -> Result<TaskCompletion> {
  let task = store
    .get_task(task_id)
    .await
    .map_err(Error::store)?
    .filter(|t| t.user_id == user_id)
    .ok_or_else(|| Error::NotFound(format!("task {task_id}")))?;

  if task.done {
    return Ok(TaskCompletion { task, profile: None });
  }

  let commit = CompletionCommit {
    task_id,
    log_entry: format!("{COMPLETION_LOG_PREFIX} {}", Utc::now().to_rfc3339()),
    evolve: risk::evolve,
  };
  let CompletionReceipt { task, profile } = store
    .complete_task(commit)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("task {task_id}")))?;

  tracing::info!(
    %task_id,
    member_id = %task.member_id,
    profile_updated = profile.is_some(),
    "task completed"
  );
  Ok(TaskCompletion { task, profile })
}
