//! Turning raw advisory output into advice and task records.
//!
//! The advisor's item lists are untrusted. Each element becomes a record on a
//! best-effort basis: objects contribute whatever fields they carry, bare
//! strings become titles, anything else gets a fallback title. Ingestion never
//! fails and never drops an element.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::care::{NewAdvice, NewTask};

pub const FALLBACK_ADVICE_TITLE: &str = "健康建议";
pub const FALLBACK_TASK_TITLE: &str = "健康任务";
pub const DEFAULT_FREQ: &str = "遵医嘱";
pub const DEFAULT_DUE: &str = "尽快开始";

/// Records ready to be committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ingested {
  pub advice: Vec<NewAdvice>,
  pub tasks:  Vec<NewTask>,
}

/// Shape `raw_advice` and `raw_tasks` into records owned by `user_id` and
/// attached to `member_id`. Any owner or member the payload names is ignored.
pub fn ingest(
  raw_advice: &[Value],
  raw_tasks: &[Value],
  user_id: Uuid,
  member_id: Uuid,
) -> Ingested {
  Ingested {
    advice: raw_advice
      .iter()
      .map(|item| advice_from(item, user_id, member_id))
      .collect(),
    tasks:  raw_tasks
      .iter()
      .map(|item| task_from(item, user_id, member_id))
      .collect(),
  }
}

fn advice_from(item: &Value, user_id: Uuid, member_id: Uuid) -> NewAdvice {
  let mut advice = NewAdvice {
    user_id,
    member_id,
    title: FALLBACK_ADVICE_TITLE.to_owned(),
    reason: String::new(),
    tags: Vec::new(),
    detail: Vec::new(),
  };
  match item {
    Value::String(s) => {
      if let Some(title) = non_blank(s) {
        advice.title = title;
      }
    }
    Value::Object(obj) => {
      if let Some(title) = text(obj, "title") {
        advice.title = title;
      }
      advice.reason = text(obj, "reason").unwrap_or_default();
      advice.tags = strings(obj.get("tags"));
    }
    _ => {}
  }
  advice
}

fn task_from(item: &Value, user_id: Uuid, member_id: Uuid) -> NewTask {
  let mut task = NewTask {
    user_id,
    member_id,
    title: FALLBACK_TASK_TITLE.to_owned(),
    freq: DEFAULT_FREQ.to_owned(),
    due: DEFAULT_DUE.to_owned(),
    detail: Vec::new(),
  };
  match item {
    Value::String(s) => {
      if let Some(title) = non_blank(s) {
        task.title = title;
      }
    }
    Value::Object(obj) => {
      if let Some(title) = text(obj, "title") {
        task.title = title;
      }
      if let Some(freq) = text(obj, "freq") {
        task.freq = freq;
      }
      if let Some(due) = text(obj, "due") {
        task.due = due;
      }
    }
    _ => {}
  }
  task
}

fn non_blank(s: &str) -> Option<String> {
  let s = s.trim();
  (!s.is_empty()).then(|| s.to_owned())
}

/// A non-blank string field. Numbers are accepted and rendered as text.
fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
  match obj.get(key)? {
    Value::String(s) => non_blank(s),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// A list of strings; a lone string counts as a one-element list and
/// non-string elements are skipped.
fn strings(value: Option<&Value>) -> Vec<String> {
  match value {
    Some(Value::Array(items)) => items
      .iter()
      .filter_map(|v| v.as_str().and_then(non_blank))
      .collect(),
    Some(Value::String(s)) => non_blank(s).into_iter().collect(),
    _ => Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn ids() -> (Uuid, Uuid) { (Uuid::new_v4(), Uuid::new_v4()) }

  #[test]
  fn bare_string_advice_becomes_title() {
    let (user, member) = ids();
    let out = ingest(&[json!("多喝水")], &[], user, member);

    assert_eq!(out.advice.len(), 1);
    let a = &out.advice[0];
    assert_eq!(a.title, "多喝水");
    assert_eq!(a.reason, "");
    assert!(a.tags.is_empty());
    assert!(out.tasks.is_empty());
  }

  #[test]
  fn structured_advice_keeps_fields() {
    let (user, member) = ids();
    let out = ingest(
      &[json!({ "title": "控制饮食", "reason": "血糖偏高", "tags": ["饮食", 3, "控糖"] })],
      &[],
      user,
      member,
    );
    let a = &out.advice[0];
    assert_eq!(a.title, "控制饮食");
    assert_eq!(a.reason, "血糖偏高");
    assert_eq!(a.tags, ["饮食", "控糖"]);
  }

  #[test]
  fn missing_title_uses_fallback() {
    let (user, member) = ids();
    let out = ingest(
      &[json!({ "reason": "r" }), json!(42)],
      &[json!({ "freq": "每天" }), json!(null)],
      user,
      member,
    );
    assert_eq!(out.advice[0].title, FALLBACK_ADVICE_TITLE);
    assert_eq!(out.advice[1].title, FALLBACK_ADVICE_TITLE);
    assert_eq!(out.tasks[0].title, FALLBACK_TASK_TITLE);
    assert_eq!(out.tasks[0].freq, "每天");
    assert_eq!(out.tasks[1].title, FALLBACK_TASK_TITLE);
  }

  #[test]
  fn task_defaults_fill_missing_fields() {
    let (user, member) = ids();
    let out = ingest(&[], &[json!("饭后步行"), json!({ "title": "测血糖", "due": "明早" })], user, member);

    assert_eq!(out.tasks[0].title, "饭后步行");
    assert_eq!(out.tasks[0].freq, DEFAULT_FREQ);
    assert_eq!(out.tasks[0].due, DEFAULT_DUE);
    assert_eq!(out.tasks[1].freq, DEFAULT_FREQ);
    assert_eq!(out.tasks[1].due, "明早");
    assert!(out.tasks.iter().all(|t| t.detail.is_empty()));
  }

  #[test]
  fn records_are_attributed_to_the_caller() {
    let (user, member) = ids();
    let out = ingest(
      &[json!({ "title": "a", "user_id": Uuid::new_v4(), "member_id": Uuid::new_v4() })],
      &[json!({ "title": "b", "member_id": Uuid::new_v4() })],
      user,
      member,
    );
    assert_eq!((out.advice[0].user_id, out.advice[0].member_id), (user, member));
    assert_eq!((out.tasks[0].user_id, out.tasks[0].member_id), (user, member));
  }
}
