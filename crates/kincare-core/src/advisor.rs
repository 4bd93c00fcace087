//! The `Advisor` trait — the external advisory (chat model) service.
//!
//! Implemented by `kincare-advisor` for OpenAI-compatible endpoints and by
//! test doubles. The orchestrator never lets an advisor error reach the
//! caller; every failure degrades to a fallback reply or title.

use std::future::Future;

use serde_json::Value;

use crate::{consult::ChatTurn, member::Persona};

// ─── Reply ───────────────────────────────────────────────────────────────────

/// What the advisor said. The service is asked for a JSON object but its
/// output is not trusted to be one.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorReply {
  /// Free text, or anything that did not decode as a structured reply.
  Text(String),
  /// `{reply, new_advice[], new_tasks[]}`. Array elements are left raw for
  /// [`crate::ingest`] to interpret.
  Structured {
    reply:      String,
    new_advice: Vec<Value>,
    new_tasks:  Vec<Value>,
  },
}

impl AdvisorReply {
  /// Decode raw model output.
  ///
  /// A JSON object (optionally wrapped in a Markdown code fence) with a string
  /// `reply` becomes [`AdvisorReply::Structured`]; a missing or non-array
  /// `new_advice`/`new_tasks` becomes empty. Everything else becomes
  /// [`AdvisorReply::Text`] holding the raw content.
  pub fn decode(raw: &str) -> Self {
    let body = strip_code_fence(raw.trim());
    let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(body) else {
      return Self::Text(raw.trim().to_owned());
    };
    let Some(Value::String(reply)) = obj.remove("reply") else {
      return Self::Text(raw.trim().to_owned());
    };
    Self::Structured {
      reply,
      new_advice: take_array(&mut obj, "new_advice"),
      new_tasks: take_array(&mut obj, "new_tasks"),
    }
  }

  /// The text to show the user.
  pub fn reply(&self) -> &str {
    match self {
      Self::Text(text) => text,
      Self::Structured { reply, .. } => reply,
    }
  }

  /// Split into reply text, raw advice items and raw task items.
  pub fn into_parts(self) -> (String, Vec<Value>, Vec<Value>) {
    match self {
      Self::Text(text) => (text, Vec::new(), Vec::new()),
      Self::Structured { reply, new_advice, new_tasks } => {
        (reply, new_advice, new_tasks)
      }
    }
  }
}

fn take_array(obj: &mut serde_json::Map<String, Value>, key: &str) -> Vec<Value> {
  match obj.remove(key) {
    Some(Value::Array(items)) => items,
    _ => Vec::new(),
  }
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
fn strip_code_fence(s: &str) -> &str {
  let Some(rest) = s.strip_prefix("```") else {
    return s;
  };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the advisory service.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers.
pub trait Advisor: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Answer the latest message of `history` (oldest first) for the member
  /// described by `persona`.
  fn converse<'a>(
    &'a self,
    history: &'a [ChatTurn],
    persona: &'a Persona,
  ) -> impl Future<Output = Result<AdvisorReply, Self::Error>> + Send + 'a;

  /// Produce a short session title for `snippet`.
  fn summarize_title<'a>(
    &'a self,
    snippet: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Turn a whole consultation into a care plan of advice and tasks.
  fn generate_plan<'a>(
    &'a self,
    history: &'a [ChatTurn],
    persona: &'a Persona,
  ) -> impl Future<Output = Result<AdvisorReply, Self::Error>> + Send + 'a;
}
