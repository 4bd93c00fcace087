//! The consultation orchestrator.
//!
//! Drives a session through its turns: it replays history to the advisor,
//! ingests the structured part of the reply, titles the session after the
//! first exchange, and hands every resulting write to the store as a single
//! [`TurnCommit`].
//!
//! Turns on the same session are serialised, so the N-th assistant reply is
//! always computed over exactly the first N−1 committed messages.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  account,
  advisor::{Advisor, AdvisorReply},
  care::{Advice, Task},
  consult::{ChatMessage, ChatTurn, ConsultSession, NewSession, WELCOME_MESSAGE},
  ingest::ingest,
  member::{FamilyMember, Persona},
  store::{CareStore, TurnCommit},
  title::{self, TitleOutcome},
};

/// Reply used when the advisor cannot be reached or fails.
pub const CONVERSE_FALLBACK: &str = "抱歉，我的医学库暂时连接中断，请稍后再试。";

/// Reply used when plan generation fails.
pub const PLAN_FALLBACK: &str = "抱歉，暂时无法生成健康计划，请稍后再试。";

/// A session keeps its advisor-generated title only if it is titled while it
/// holds at most this many messages (the welcome plus the first user message).
const TITLE_WINDOW: usize = 2;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  /// Upper bound on any single advisor call. Expiry is treated like any other
  /// advisor failure.
  pub advisor_timeout: Duration,
}

impl Default for OrchestratorConfig {
  fn default() -> Self { Self { advisor_timeout: Duration::from_secs(60) } }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`ConsultOrchestrator::post_message`].
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
  /// The persisted assistant message.
  pub reply:  ChatMessage,
  /// The session title if this turn set it.
  pub title:  Option<String>,
  pub advice: Vec<Advice>,
  pub tasks:  Vec<Task>,
}

/// Result of [`ConsultOrchestrator::generate_plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
  pub reply:          String,
  pub advice_created: usize,
  pub tasks_created:  usize,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Session lifecycle and turn processing over a [`CareStore`] and an
/// [`Advisor`].
pub struct ConsultOrchestrator<S, A> {
  store:      Arc<S>,
  advisor:    Arc<A>,
  config:     OrchestratorConfig,
  turns:      TurnLocks,
}

impl<S, A> ConsultOrchestrator<S, A>
where
  S: CareStore,
  A: Advisor,
{
  pub fn new(store: Arc<S>, advisor: Arc<A>, config: OrchestratorConfig) -> Self {
    Self { store, advisor, config, turns: TurnLocks::default() }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Open a session about `member_id`, which must belong to `user_id`.
  pub async fn create_session(
    &self,
    user_id: Uuid,
    member_id: Uuid,
  ) -> Result<(ConsultSession, ChatMessage)> {
    account::owned_member(self.store.as_ref(), user_id, member_id).await?;

    let (session, welcome) = self
      .store
      .create_session(NewSession {
        user_id,
        member_id,
        welcome: WELCOME_MESSAGE.to_owned(),
      })
      .await
      .map_err(Error::store)?;

    tracing::info!(session_id = %session.session_id, %member_id, "session created");
    Ok((session, welcome))
  }

  /// The caller's sessions, newest first.
  pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<ConsultSession>> {
    self.store.list_sessions(user_id).await.map_err(Error::store)
  }

  /// A session's history, oldest first.
  pub async fn messages(
    &self,
    session_id: Uuid,
    user_id: Uuid,
  ) -> Result<Vec<ChatMessage>> {
    self.owned_session(session_id, user_id).await?;
    self.store.list_messages(session_id).await.map_err(Error::store)
  }

  /// Delete a session and all of its messages.
  pub async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<()> {
    let _turn = self.turns.acquire(session_id).await;

    self.owned_session(session_id, user_id).await?;
    let deleted = self
      .store
      .delete_session(session_id)
      .await
      .map_err(Error::store)?;

    if !deleted {
      return Err(Error::NotFound(format!("session {session_id}")));
    }
    tracing::info!(%session_id, "session deleted");
    Ok(())
  }

  // ── Turns ─────────────────────────────────────────────────────────────

  /// Post `content` as the caller and produce the assistant's reply.
  ///
  /// The user message, the reply, any advice and tasks the advisor proposed,
  /// and a first-exchange title are committed together.
  pub async fn post_message(
    &self,
    session_id: Uuid,
    user_id: Uuid,
    content: String,
  ) -> Result<TurnOutcome> {
    let _turn = self.turns.acquire(session_id).await;

    let session = self.owned_session(session_id, user_id).await?;
    let member = self.subject(&session).await?;
    let persona = Persona::from(&member);

    let mut history: Vec<ChatTurn> = self
      .store
      .list_messages(session_id)
      .await
      .map_err(Error::store)?
      .iter()
      .map(ChatTurn::from)
      .collect();
    history.push(ChatTurn::user(content.clone()));

    let reply = self.converse(&history, &persona).await;
    let title_due = session.has_default_title() && history.len() <= TITLE_WINDOW;

    let (reply_text, raw_advice, raw_tasks) = reply.into_parts();
    let ingested = ingest(&raw_advice, &raw_tasks, user_id, member.member_id);

    let title = if title_due {
      let outcome =
        title::summarize(self.advisor.as_ref(), &content, self.config.advisor_timeout)
          .await;
      if let TitleOutcome::Fallback(t) = &outcome {
        tracing::debug!(%session_id, title = %t, "using fallback title");
      }
      Some(outcome.into_title())
    } else {
      None
    };

    let commit = TurnCommit {
      session_id,
      messages: vec![ChatTurn::user(content), ChatTurn::assistant(reply_text)],
      advice: ingested.advice,
      tasks: ingested.tasks,
      title: title.clone(),
    };
    let mut receipt = self.store.commit_turn(commit).await.map_err(Error::store)?;

    let reply = receipt.messages.pop().ok_or_else(|| {
      Error::InvalidState(format!("turn on session {session_id} stored no reply"))
    })?;

    tracing::info!(
      %session_id,
      advice = receipt.advice.len(),
      tasks = receipt.tasks.len(),
      titled = title.is_some(),
      "turn committed"
    );
    Ok(TurnOutcome { reply, title, advice: receipt.advice, tasks: receipt.tasks })
  }

  /// Replay the whole session to the advisor's planner and store the advice
  /// and tasks it proposes. No chat message is written.
  pub async fn generate_plan(
    &self,
    session_id: Uuid,
    user_id: Uuid,
  ) -> Result<PlanOutcome> {
    let _turn = self.turns.acquire(session_id).await;

    let session = self.owned_session(session_id, user_id).await?;
    let member = self.subject(&session).await?;
    let persona = Persona::from(&member);

    let history: Vec<ChatTurn> = self
      .store
      .list_messages(session_id)
      .await
      .map_err(Error::store)?
      .iter()
      .map(ChatTurn::from)
      .collect();

    let reply = match tokio::time::timeout(
      self.config.advisor_timeout,
      self.advisor.generate_plan(&history, &persona),
    )
    .await
    {
      Ok(Ok(reply)) => reply,
      Ok(Err(e)) => {
        tracing::warn!(%session_id, error = %e, "plan generation failed");
        AdvisorReply::Text(PLAN_FALLBACK.to_owned())
      }
      Err(_) => {
        tracing::warn!(%session_id, "plan generation timed out");
        AdvisorReply::Text(PLAN_FALLBACK.to_owned())
      }
    };

    let (reply, raw_advice, raw_tasks) = reply.into_parts();
    let ingested = ingest(&raw_advice, &raw_tasks, user_id, member.member_id);

    let mut commit = TurnCommit::new(session_id);
    commit.advice = ingested.advice;
    commit.tasks = ingested.tasks;
    let receipt = self.store.commit_turn(commit).await.map_err(Error::store)?;

    tracing::info!(
      %session_id,
      advice = receipt.advice.len(),
      tasks = receipt.tasks.len(),
      "plan committed"
    );
    Ok(PlanOutcome {
      reply,
      advice_created: receipt.advice.len(),
      tasks_created: receipt.tasks.len(),
    })
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  /// Fetch a session owned by `user_id`; foreign sessions are `NotFound`.
  async fn owned_session(
    &self,
    session_id: Uuid,
    user_id: Uuid,
  ) -> Result<ConsultSession> {
    self
      .store
      .get_session(session_id)
      .await
      .map_err(Error::store)?
      .filter(|s| s.user_id == user_id)
      .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
  }

  /// The member a session is about.
  async fn subject(&self, session: &ConsultSession) -> Result<FamilyMember> {
    self
      .store
      .get_member(session.member_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::InvalidState(format!(
          "member {} of session {} no longer exists",
          session.member_id, session.session_id
        ))
      })
  }

  /// Call the advisor, absorbing errors and timeouts into the fallback reply.
  async fn converse(&self, history: &[ChatTurn], persona: &Persona) -> AdvisorReply {
    match tokio::time::timeout(
      self.config.advisor_timeout,
      self.advisor.converse(history, persona),
    )
    .await
    {
      Ok(Ok(reply)) => reply,
      Ok(Err(e)) => {
        tracing::warn!(error = %e, "advisor call failed; using fallback reply");
        AdvisorReply::Text(CONVERSE_FALLBACK.to_owned())
      }
      Err(_) => {
        tracing::warn!("advisor call timed out; using fallback reply");
        AdvisorReply::Text(CONVERSE_FALLBACK.to_owned())
      }
    }
  }
}

// ─── Turn locks ──────────────────────────────────────────────────────────────

/// Per-session exclusive sections. An entry lives only while some caller
/// holds or waits for it.
#[derive(Default)]
struct TurnLocks {
  /// The session's lock and the number of callers holding or queued on it.
  locks: Mutex<HashMap<Uuid, (Arc<tokio::sync::Mutex<()>>, usize)>>,
}

impl TurnLocks {
  async fn acquire(&self, session_id: Uuid) -> TurnGuard<'_> {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      let (lock, users) = locks.entry(session_id).or_default();
      *users += 1;
      lock.clone()
    };
    // Registered before waiting so a cancelled wait still releases the entry.
    let mut turn = TurnGuard { locks: self, session_id, guard: None };
    turn.guard = Some(lock.lock_owned().await);
    turn
  }

  #[cfg(test)]
  fn len(&self) -> usize {
    self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

/// Releases the session's lock on drop and prunes its entry once no caller
/// holds or waits for it.
struct TurnGuard<'a> {
  locks:      &'a TurnLocks,
  session_id: Uuid,
  guard:      Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for TurnGuard<'_> {
  fn drop(&mut self) {
    self.guard.take();
    let mut locks = self.locks.locks.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some((_, users)) = locks.get_mut(&self.session_id) {
      *users -= 1;
      if *users == 0 {
        locks.remove(&self.session_id);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn released_turns_leave_no_entries() {
    let turns = TurnLocks::default();
    for _ in 0..1000 {
      let _turn = turns.acquire(Uuid::new_v4()).await;
    }
    assert_eq!(turns.len(), 0);
  }

  #[tokio::test]
  async fn queued_turn_keeps_entry_alive() {
    let turns = Arc::new(TurnLocks::default());
    let id = Uuid::new_v4();

    let first = turns.acquire(id).await;
    let waiter = {
      let turns = turns.clone();
      tokio::spawn(async move {
        let _turn = turns.acquire(id).await;
      })
    };
    while turns.locks.lock().unwrap().get(&id).map(|(_, users)| *users) != Some(2) {
      tokio::task::yield_now().await;
    }

    drop(first);
    assert_eq!(turns.len(), 1);
    waiter.await.unwrap();
    assert_eq!(turns.len(), 0);
  }

  #[tokio::test]
  async fn same_session_turns_are_exclusive() {
    let turns = TurnLocks::default();
    let id = Uuid::new_v4();
    let held = turns.acquire(id).await;

    let blocked =
      tokio::time::timeout(Duration::from_millis(20), turns.acquire(id)).await;
    assert!(blocked.is_err());
    assert_eq!(turns.locks.lock().unwrap()[&id].1, 1);

    let other = turns.acquire(Uuid::new_v4()).await;
    drop(other);
    drop(held);
    assert_eq!(turns.len(), 0);
  }
}
