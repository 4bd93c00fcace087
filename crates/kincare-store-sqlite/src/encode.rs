//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that text ordering matches time ordering. Lists and tag profiles are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use kincare_core::{
  care::{Advice, Task},
  consult::{ChatMessage, ConsultSession, Role, TitleState},
  member::{FamilyMember, User},
  profile::TagProfile,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Current time truncated to the stored precision, so values read back compare
/// equal to the values returned at insert.
pub fn now() -> DateTime<Utc> {
  let now = Utc::now();
  decode_dt(&encode_dt(now)).unwrap_or(now)
}

// ─── Enumerations ─────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str { r.as_str() }

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "user" => Ok(Role::User),
    "assistant" => Ok(Role::Assistant),
    other => Err(Error::UnknownValue { column: "role", value: other.to_owned() }),
  }
}

pub fn encode_title_state(t: TitleState) -> &'static str {
  match t {
    TitleState::Default => "default",
    TitleState::Summarized => "summarized",
  }
}

pub fn decode_title_state(s: &str) -> Result<TitleState> {
  match s {
    "default" => Ok(TitleState::Default),
    "summarized" => Ok(TitleState::Summarized),
    other => Err(Error::UnknownValue {
      column: "title_state",
      value:  other.to_owned(),
    }),
  }
}

// ─── JSON columns ─────────────────────────────────────────────────────────────

pub fn encode_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_list(s: &str) -> Result<Vec<String>> {
  if s.trim().is_empty() {
    return Ok(Vec::new());
  }
  Ok(serde_json::from_str(s)?)
}

pub fn encode_tags(tags: &TagProfile) -> Result<String> {
  Ok(serde_json::to_string(tags)?)
}

/// Accepts both the object form and legacy name lists.
pub fn decode_tags(s: &str) -> Result<TagProfile> {
  if s.trim().is_empty() {
    return Ok(TagProfile::new());
  }
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:     String,
  pub external_id: String,
  pub nickname:    Option<String>,
  pub avatar_url:  Option<String>,
  pub full_name:   Option<String>,
  pub gender:      Option<String>,
  pub age:         Option<u32>,
  pub created_at:  String,
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:     decode_uuid(&self.user_id)?,
      external_id: self.external_id,
      nickname:    self.nickname,
      avatar_url:  self.avatar_url,
      full_name:   self.full_name,
      gender:      self.gender,
      age:         self.age,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `members` row.
pub struct RawMember {
  pub member_id:      String,
  pub user_id:        String,
  pub name:           String,
  pub relation:       String,
  pub gender:         Option<String>,
  pub age:            Option<u32>,
  pub height:         Option<f64>,
  pub weight:         Option<f64>,
  pub allergies:      Option<String>,
  pub meds:           Option<String>,
  pub special_status: Option<String>,
  pub tags:           String,
  pub created_at:     String,
}

impl RawMember {
  pub fn into_member(self) -> Result<FamilyMember> {
    Ok(FamilyMember {
      member_id:      decode_uuid(&self.member_id)?,
      user_id:        decode_uuid(&self.user_id)?,
      name:           self.name,
      relation:       self.relation,
      gender:         self.gender,
      age:            self.age,
      height:         self.height,
      weight:         self.weight,
      allergies:      self.allergies,
      meds:           self.meds,
      special_status: self.special_status,
      tags:           decode_tags(&self.tags)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `advice` row.
pub struct RawAdvice {
  pub advice_id:  String,
  pub user_id:    String,
  pub member_id:  String,
  pub title:      String,
  pub reason:     String,
  pub tags:       String,
  pub detail:     String,
  pub created_at: String,
}

impl RawAdvice {
  pub fn into_advice(self) -> Result<Advice> {
    Ok(Advice {
      advice_id:  decode_uuid(&self.advice_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      member_id:  decode_uuid(&self.member_id)?,
      title:      self.title,
      reason:     self.reason,
      tags:       decode_list(&self.tags)?,
      detail:     decode_list(&self.detail)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `tasks` row.
pub struct RawTask {
  pub task_id:    String,
  pub user_id:    String,
  pub member_id:  String,
  pub title:      String,
  pub freq:       String,
  pub due:        String,
  pub done:       bool,
  pub detail:     String,
  pub logs:       String,
  pub created_at: String,
}

impl RawTask {
  pub fn into_task(self) -> Result<Task> {
    Ok(Task {
      task_id:    decode_uuid(&self.task_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      member_id:  decode_uuid(&self.member_id)?,
      title:      self.title,
      freq:       self.freq,
      due:        self.due,
      done:       self.done,
      detail:     decode_list(&self.detail)?,
      logs:       decode_list(&self.logs)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `sessions` row.
pub struct RawSession {
  pub session_id:  String,
  pub user_id:     String,
  pub member_id:   String,
  pub title:       String,
  pub title_state: String,
  pub created_at:  String,
}

impl RawSession {
  pub fn into_session(self) -> Result<ConsultSession> {
    Ok(ConsultSession {
      session_id:  decode_uuid(&self.session_id)?,
      user_id:     decode_uuid(&self.user_id)?,
      member_id:   decode_uuid(&self.member_id)?,
      title:       self.title,
      title_state: decode_title_state(&self.title_state)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub message_id: String,
  pub session_id: String,
  pub role:       String,
  pub content:    String,
  pub created_at: String,
}

impl RawMessage {
  pub fn into_message(self) -> Result<ChatMessage> {
    Ok(ChatMessage {
      message_id: decode_uuid(&self.message_id)?,
      session_id: decode_uuid(&self.session_id)?,
      role:       decode_role(&self.role)?,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
