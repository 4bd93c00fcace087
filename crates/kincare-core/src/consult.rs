//! Consultation sessions and their chat history.
//!
//! A session's message log is append-only and ordered by creation time.
//! The session title starts as [`DEFAULT_TITLE`] and is rewritten at most once,
//! after the first exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title every new session starts with.
pub const DEFAULT_TITLE: &str = "新会话";

/// Assistant greeting inserted as the first message of every session.
pub const WELCOME_MESSAGE: &str = "你好，我是AI健康助手。请问哪里不舒服？";

// ─── Roles ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::User => "user",
      Self::Assistant => "assistant",
    }
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Whether a session still carries [`DEFAULT_TITLE`] or has been titled.
/// The only transition is `Default` → `Summarized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleState {
  Default,
  Summarized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultSession {
  pub session_id:  Uuid,
  pub user_id:     Uuid,
  /// The family member the consultation is about.
  pub member_id:   Uuid,
  pub title:       String,
  pub title_state: TitleState,
  pub created_at:  DateTime<Utc>,
}

impl ConsultSession {
  pub fn has_default_title(&self) -> bool {
    self.title_state == TitleState::Default
  }
}

/// Input to [`crate::store::CareStore::create_session`]. The store writes the
/// session and its welcome message together.
#[derive(Debug, Clone)]
pub struct NewSession {
  pub user_id:   Uuid,
  pub member_id: Uuid,
  pub welcome:   String,
}

// ─── Messages ────────────────────────────────────────────────────────────────

/// A persisted chat message. Never updated or deleted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub message_id: Uuid,
  pub session_id: Uuid,
  pub role:       Role,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}

/// A role/content pair — an unsaved message, or a history entry sent to the
/// advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
  pub role:    Role,
  pub content: String,
}

impl ChatTurn {
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: Role::User, content: content.into() }
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self { role: Role::Assistant, content: content.into() }
  }
}

impl From<&ChatMessage> for ChatTurn {
  fn from(m: &ChatMessage) -> Self {
    Self { role: m.role, content: m.content.clone() }
  }
}
