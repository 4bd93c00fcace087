//! The `CareStore` trait and the multi-record commit types it accepts.
//!
//! The trait is implemented by storage backends (e.g. `kincare-store-sqlite`).
//! Higher layers (`kincare-api`, the orchestrator) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  care::{Advice, NewAdvice, NewTask, Task},
  consult::{ChatMessage, ChatTurn, ConsultSession, NewSession},
  member::{FamilyMember, NewMember, NewUser, User},
  profile::TagProfile,
};

// ─── Atomic units ────────────────────────────────────────────────────────────

/// Everything one consultation turn (or plan generation) writes. Applied
/// all-or-nothing by [`CareStore::commit_turn`].
#[derive(Debug, Clone)]
pub struct TurnCommit {
  pub session_id: Uuid,
  /// Appended to the session in order.
  pub messages:   Vec<ChatTurn>,
  pub advice:     Vec<NewAdvice>,
  pub tasks:      Vec<NewTask>,
  /// New session title; also moves the title state to `Summarized`.
  pub title:      Option<String>,
}

impl TurnCommit {
  pub fn new(session_id: Uuid) -> Self {
    Self {
      session_id,
      messages: Vec::new(),
      advice: Vec::new(),
      tasks: Vec::new(),
      title: None,
    }
  }
}

/// The records written by a [`TurnCommit`], in input order.
#[derive(Debug, Clone, Default)]
pub struct TurnReceipt {
  pub messages: Vec<ChatMessage>,
  pub advice:   Vec<Advice>,
  pub tasks:    Vec<Task>,
}

/// Marks a task done. Applied all-or-nothing by [`CareStore::complete_task`].
#[derive(Debug, Clone)]
pub struct CompletionCommit {
  pub task_id:   Uuid,
  /// Appended to the task's completion log.
  pub log_entry: String,
  /// Maps the member's current tags and the task title to the new tags. Run
  /// inside the transaction, only when the task flips to done.
  pub evolve:    fn(TagProfile, &str) -> TagProfile,
}

/// What [`CareStore::complete_task`] wrote.
#[derive(Debug, Clone)]
pub struct CompletionReceipt {
  pub task:    Task,
  /// The member's new tags. `None` when the task was already done or its
  /// member no longer exists.
  pub profile: Option<TagProfile>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Kincare storage backend.
///
/// List operations return newest first, except [`CareStore::list_messages`],
/// which returns a session's history oldest first.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CareStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_user_by_external_id<'a>(
    &'a self,
    external_id: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Overwrite the editable profile fields of an existing user.
  fn update_user(
    &self,
    user: User,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Members ───────────────────────────────────────────────────────────

  fn add_member(
    &self,
    input: NewMember,
  ) -> impl Future<Output = Result<FamilyMember, Self::Error>> + Send + '_;

  fn get_member(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<FamilyMember>, Self::Error>> + Send + '_;

  fn list_members(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FamilyMember>, Self::Error>> + Send + '_;

  /// Overwrite every mutable field of an existing member, tags included.
  fn update_member(
    &self,
    member: FamilyMember,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns `false` if no such member existed.
  fn delete_member(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Advice ────────────────────────────────────────────────────────────

  fn add_advice(
    &self,
    input: NewAdvice,
  ) -> impl Future<Output = Result<Advice, Self::Error>> + Send + '_;

  fn get_advice(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Advice>, Self::Error>> + Send + '_;

  fn list_advice(
    &self,
    user_id: Uuid,
    member_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Advice>, Self::Error>> + Send + '_;

  // ── Tasks ─────────────────────────────────────────────────────────────

  fn add_task(
    &self,
    input: NewTask,
  ) -> impl Future<Output = Result<Task, Self::Error>> + Send + '_;

  fn get_task(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Task>, Self::Error>> + Send + '_;

  fn list_tasks(
    &self,
    user_id: Uuid,
    member_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Task>, Self::Error>> + Send + '_;

  /// In one transaction: flip `done` from false to true, append the log
  /// entry, and replace the member's tags with `evolve` applied to the tags
  /// read in that transaction. A task that is already done is returned
  /// unchanged with no profile. Returns `None` if the task does not exist.
  fn complete_task(
    &self,
    commit: CompletionCommit,
  ) -> impl Future<Output = Result<Option<CompletionReceipt>, Self::Error>>
  + Send
  + '_;

  // ── Consultations ─────────────────────────────────────────────────────

  /// Create a session with the default title and its welcome message, in one
  /// transaction.
  fn create_session(
    &self,
    input: NewSession,
  ) -> impl Future<Output = Result<(ConsultSession, ChatMessage), Self::Error>>
  + Send
  + '_;

  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ConsultSession>, Self::Error>> + Send + '_;

  fn list_sessions(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ConsultSession>, Self::Error>> + Send + '_;

  /// A session's messages, oldest first.
  fn list_messages(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ChatMessage>, Self::Error>> + Send + '_;

  /// Apply a [`TurnCommit`] in one transaction.
  fn commit_turn(
    &self,
    commit: TurnCommit,
  ) -> impl Future<Output = Result<TurnReceipt, Self::Error>> + Send + '_;

  /// Delete a session's messages and then the session, in one transaction.
  /// Returns `false` if no such session existed.
  fn delete_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
