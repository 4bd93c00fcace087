//! Router tests against an in-memory store and a scripted advisor.

use std::{
  collections::VecDeque,
  io,
  sync::{Arc, Mutex},
  time::Duration,
};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use kincare_core::{
  account,
  advisor::{Advisor, AdvisorReply},
  consult::{ChatTurn, DEFAULT_TITLE, WELCOME_MESSAGE},
  member::Persona,
  orchestrator::{CONVERSE_FALLBACK, OrchestratorConfig, PLAN_FALLBACK},
};
use kincare_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, TokenKeys, api_router};

// ─── Scripted advisor ────────────────────────────────────────────────────────

/// Replays queued answers; an empty queue behaves like an unreachable service.
#[derive(Default)]
struct ScriptedAdvisor {
  replies:  Mutex<VecDeque<String>>,
  titles:   Mutex<VecDeque<String>>,
  /// Message contents of each history passed to `converse`, in call order.
  seen:     Mutex<Vec<Vec<String>>>,
  /// Snippets passed to `summarize_title`.
  snippets: Mutex<Vec<String>>,
}

impl ScriptedAdvisor {
  fn reply(&self, raw: impl Into<String>) {
    self.replies.lock().unwrap().push_back(raw.into());
  }

  fn title(&self, title: impl Into<String>) {
    self.titles.lock().unwrap().push_back(title.into());
  }

  fn seen_lengths(&self) -> Vec<usize> {
    self.seen.lock().unwrap().iter().map(Vec::len).collect()
  }

  fn next(queue: &Mutex<VecDeque<String>>) -> io::Result<String> {
    queue
      .lock()
      .unwrap()
      .pop_front()
      .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "no script"))
  }
}

impl Advisor for ScriptedAdvisor {
  type Error = io::Error;

  async fn converse<'a>(
    &'a self,
    history: &'a [ChatTurn],
    _persona: &'a Persona,
  ) -> io::Result<AdvisorReply> {
    self
      .seen
      .lock()
      .unwrap()
      .push(history.iter().map(|t| t.content.clone()).collect());
    // Give a concurrent turn on the same session the chance to interleave.
    tokio::task::yield_now().await;
    Ok(AdvisorReply::decode(&Self::next(&self.replies)?))
  }

  async fn summarize_title<'a>(&'a self, snippet: &'a str) -> io::Result<String> {
    self.snippets.lock().unwrap().push(snippet.to_owned());
    Self::next(&self.titles)
  }

  async fn generate_plan<'a>(
    &'a self,
    _history: &'a [ChatTurn],
    _persona: &'a Persona,
  ) -> io::Result<AdvisorReply> {
    Ok(AdvisorReply::decode(&Self::next(&self.replies)?))
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

type State = AppState<SqliteStore, ScriptedAdvisor>;

async fn make_state() -> (State, Arc<ScriptedAdvisor>) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let advisor = Arc::new(ScriptedAdvisor::default());
  let config = OrchestratorConfig { advisor_timeout: Duration::from_secs(5) };
  let tokens = TokenKeys::new(b"test-secret", chrono::Duration::hours(72), true);
  (AppState::new(store, advisor.clone(), config, tokens), advisor)
}

async fn send(
  state: &State,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = api_router(state.clone())
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap();

  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

/// Dev sign-in; returns the token and the self member's id.
async fn login(state: &State) -> (String, String) {
  let (status, body) = send(state, "POST", "/auth/dev", None, None).await;
  assert_eq!(status, StatusCode::OK);
  let token = body["access_token"].as_str().unwrap().to_owned();

  let (_, members) = send(state, "GET", "/members", Some(&token), None).await;
  let self_id = members[0]["member_id"].as_str().unwrap().to_owned();
  (token, self_id)
}

/// A second, unrelated account.
async fn other_user(state: &State) -> String {
  let user = account::sign_in(state.store.as_ref(), "someone_else", None)
    .await
    .unwrap();
  state.tokens.issue(user.user_id).unwrap()
}

async fn add_member(state: &State, token: &str, body: Value) -> String {
  let (status, member) = send(state, "POST", "/members", Some(token), Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  member["member_id"].as_str().unwrap().to_owned()
}

async fn open_session(state: &State, token: &str, member_id: &str) -> String {
  let (status, body) = send(
    state,
    "POST",
    "/consult/sessions",
    Some(token),
    Some(json!({ "member_id": member_id })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  body["session_id"].as_str().unwrap().to_owned()
}

// ─── Account ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
  let (state, _) = make_state().await;
  let (status, body) = send(&state, "GET", "/health", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
  let (state, _) = make_state().await;
  let (status, body) = send(&state, "GET", "/members", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(body["error"].is_string());

  let (status, _) = send(&state, "GET", "/me", Some("not-a-jwt"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dev_login_is_idempotent_and_creates_self_member() {
  let (state, _) = make_state().await;
  let (_, first) = send(&state, "POST", "/auth/dev", None, None).await;
  let (_, second) = send(&state, "POST", "/auth/dev", None, None).await;
  assert_eq!(first["token_type"], "bearer");
  assert_eq!(first["user"]["user_id"], second["user"]["user_id"]);
  assert_eq!(first["user"]["nickname"], "Dev User");

  let token = second["access_token"].as_str().unwrap();
  let (_, members) = send(&state, "GET", "/members", Some(token), None).await;
  let members = members.as_array().unwrap();
  assert_eq!(members.len(), 1);
  assert_eq!(members[0]["relation"], "本人");
}

#[tokio::test]
async fn dev_login_can_be_disabled() {
  let (mut state, _) = make_state().await;
  state.tokens = Arc::new(TokenKeys::new(b"s", chrono::Duration::hours(1), false));
  let (status, _) = send(&state, "POST", "/auth/dev", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn me_applies_present_fields_only() {
  let (state, _) = make_state().await;
  let (token, _) = login(&state).await;

  let (status, me) =
    send(&state, "PUT", "/me", Some(&token), Some(json!({ "age": 35 }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["age"], 35);
  assert_eq!(me["nickname"], "Dev User");

  let (_, me) = send(&state, "GET", "/me", Some(&token), None).await;
  assert_eq!(me["age"], 35);
}

// ─── Members ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn member_tag_list_is_upgraded_to_profile() {
  let (state, _) = make_state().await;
  let (token, _) = login(&state).await;

  let id = add_member(
    &state,
    &token,
    json!({ "name": "王芳", "relation": "母亲", "tags": ["高血压"] }),
  )
  .await;

  let (_, members) = send(&state, "GET", "/members", Some(&token), None).await;
  let mother = members
    .as_array()
    .unwrap()
    .iter()
    .find(|m| m["member_id"] == id.as_str())
    .unwrap();
  assert_eq!(mother["tags"], json!({ "高血压": { "level": 2, "score": 100 } }));
}

#[tokio::test]
async fn member_update_overwrites_tags() {
  let (state, _) = make_state().await;
  let (token, _) = login(&state).await;
  let id = add_member(
    &state,
    &token,
    json!({ "name": "李强", "relation": "父亲", "tags": ["肥胖", "糖尿病"] }),
  )
  .await;

  let (status, member) = send(
    &state,
    "PUT",
    &format!("/members/{id}"),
    Some(&token),
    Some(json!({ "meds": "二甲双胍", "tags": { "糖尿病": { "level": 1, "score": 40 } } })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(member["meds"], "二甲双胍");
  assert_eq!(member["name"], "李强");
  assert_eq!(member["tags"], json!({ "糖尿病": { "level": 1, "score": 40 } }));
}

#[tokio::test]
async fn self_member_cannot_be_deleted() {
  let (state, _) = make_state().await;
  let (token, self_id) = login(&state).await;
  let (status, _) =
    send(&state, "DELETE", &format!("/members/{self_id}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn self_relation_cannot_move() {
  let (state, _) = make_state().await;
  let (token, self_id) = login(&state).await;
  let other = add_member(&state, &token, json!({ "name": "乙", "relation": "父亲" })).await;

  let (status, _) = send(
    &state,
    "PUT",
    &format!("/members/{self_id}"),
    Some(&token),
    Some(json!({ "relation": "父亲" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) =
    send(&state, "DELETE", &format!("/members/{self_id}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(
    &state,
    "PUT",
    &format!("/members/{other}"),
    Some(&token),
    Some(json!({ "relation": "本人" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(
    &state,
    "POST",
    "/members",
    Some(&token),
    Some(json!({ "name": "丙", "relation": "本人" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  // Keeping the marker while editing other fields is fine.
  let (status, member) = send(
    &state,
    "PUT",
    &format!("/members/{self_id}"),
    Some(&token),
    Some(json!({ "relation": "本人", "age": 40 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(member["age"], 40);

  let (_, members) = send(&state, "GET", "/members", Some(&token), None).await;
  let selves = members
    .as_array()
    .unwrap()
    .iter()
    .filter(|m| m["relation"] == "本人")
    .count();
  assert_eq!(selves, 1);
}

#[tokio::test]
async fn foreign_member_is_not_found() {
  let (state, _) = make_state().await;
  let (_, self_id) = login(&state).await;
  let intruder = other_user(&state).await;

  let (status, _) = send(
    &state,
    "PUT",
    &format!("/members/{self_id}"),
    Some(&intruder),
    Some(json!({ "name": "x" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(
    &state,
    "POST",
    "/consult/sessions",
    Some(&intruder),
    Some(json!({ "member_id": self_id })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Advice and tasks ────────────────────────────────────────────────────────

#[tokio::test]
async fn advice_is_scoped_to_owner() {
  let (state, _) = make_state().await;
  let (token, self_id) = login(&state).await;

  let (status, advice) = send(
    &state,
    "POST",
    "/advice",
    Some(&token),
    Some(json!({ "member_id": self_id, "title": "少盐" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = advice["advice_id"].as_str().unwrap();

  let (status, _) = send(&state, "GET", &format!("/advice/{id}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);

  let intruder = other_user(&state).await;
  let (status, _) =
    send(&state, "GET", &format!("/advice/{id}"), Some(&intruder), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, listed) = send(
    &state,
    "GET",
    &format!("/advice?member_id={self_id}"),
    Some(&intruder),
    None,
  )
  .await;
  assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn completing_task_evolves_member_profile() {
  let (state, _) = make_state().await;
  let (token, _) = login(&state).await;
  let member = add_member(
    &state,
    &token,
    json!({ "name": "王芳", "relation": "母亲", "tags": ["糖尿病"] }),
  )
  .await;

  let (_, task) = send(
    &state,
    "POST",
    "/tasks",
    Some(&token),
    Some(json!({ "member_id": member, "title": "早晚测血糖" })),
  )
  .await;
  let task_id = task["task_id"].as_str().unwrap();

  let (status, done) =
    send(&state, "POST", &format!("/tasks/{task_id}/complete"), Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(done["task"]["done"], true);
  assert!(done["task"]["logs"][0].as_str().unwrap().starts_with("已完成"));
  assert_eq!(done["profile"], json!({ "糖尿病": { "level": 2, "score": 85 } }));

  // A second completion changes nothing.
  let (_, again) =
    send(&state, "POST", &format!("/tasks/{task_id}/complete"), Some(&token), None).await;
  assert_eq!(again["profile"], Value::Null);
  assert_eq!(again["task"]["logs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_completions_evolve_profile_once() {
  let (state, _) = make_state().await;
  let (token, _) = login(&state).await;
  let member = add_member(
    &state,
    &token,
    json!({ "name": "王芳", "relation": "母亲", "tags": ["糖尿病"] }),
  )
  .await;
  let (_, task) = send(
    &state,
    "POST",
    "/tasks",
    Some(&token),
    Some(json!({ "member_id": member, "title": "测血糖" })),
  )
  .await;
  let uri = format!("/tasks/{}/complete", task["task_id"].as_str().unwrap());

  let (a, b) = tokio::join!(
    send(&state, "POST", &uri, Some(&token), None),
    send(&state, "POST", &uri, Some(&token), None),
  );
  assert_eq!(a.0, StatusCode::OK);
  assert_eq!(b.0, StatusCode::OK);
  assert_eq!([&a.1, &b.1].iter().filter(|d| !d["profile"].is_null()).count(), 1);

  let (_, members) = send(&state, "GET", "/members", Some(&token), None).await;
  let mother = members
    .as_array()
    .unwrap()
    .iter()
    .find(|m| m["member_id"] == member.as_str())
    .unwrap();
  assert_eq!(mother["tags"], json!({ "糖尿病": { "level": 2, "score": 85 } }));

  let (_, done) = send(
    &state,
    "GET",
    &format!("/tasks/{}", task["task_id"].as_str().unwrap()),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(done["logs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn completing_task_of_deleted_member_still_marks_done() {
  let (state, _) = make_state().await;
  let (token, _) = login(&state).await;
  let member = add_member(
    &state,
    &token,
    json!({ "name": "李强", "relation": "父亲", "tags": ["糖尿病"] }),
  )
  .await;
  let (_, task) = send(
    &state,
    "POST",
    "/tasks",
    Some(&token),
    Some(json!({ "member_id": member, "title": "测血糖" })),
  )
  .await;
  let task_id = task["task_id"].as_str().unwrap();

  let (status, _) =
    send(&state, "DELETE", &format!("/members/{member}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, done) =
    send(&state, "POST", &format!("/tasks/{task_id}/complete"), Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(done["task"]["done"], true);
  assert_eq!(done["profile"], Value::Null);
}

// ─── Consultations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn new_session_starts_with_welcome() {
  let (state, _) = make_state().await;
  let (token, self_id) = login(&state).await;
  let (_, body) = send(
    &state,
    "POST",
    "/consult/sessions",
    Some(&token),
    Some(json!({ "member_id": self_id })),
  )
  .await;
  assert_eq!(body["title"], DEFAULT_TITLE);
  assert_eq!(body["welcome"]["content"], WELCOME_MESSAGE);
  assert_eq!(body["welcome"]["role"], "assistant");
}

#[tokio::test]
async fn chat_ingests_records_and_titles_once() {
  let (state, advisor) = make_state().await;
  let (token, self_id) = login(&state).await;
  let session = open_session(&state, &token, &self_id).await;

  advisor.reply(
    json!({
      "reply": "注意休息",
      "new_advice": ["多喝水", { "title": "清淡饮食", "reason": "减轻负担", "tags": ["饮食"] }],
      "new_tasks": [{ "title": "量体温", "freq": "每天两次" }],
    })
    .to_string(),
  );
  advisor.title("发热咨询");

  let (status, turn) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/chat"),
    Some(&token),
    Some(json!({ "content": "用户描述：发烧两天" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(turn["reply"]["content"], "注意休息");
  assert_eq!(turn["title"], "发热咨询");
  assert_eq!(turn["advice"].as_array().unwrap().len(), 2);
  assert_eq!(turn["advice"][0]["title"], "多喝水");
  assert_eq!(turn["advice"][0]["reason"], "");
  assert_eq!(turn["tasks"][0]["due"], "尽快开始");

  advisor.reply("好的");
  advisor.title("不该使用的标题");
  let (_, turn) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/chat"),
    Some(&token),
    Some(json!({ "content": "还是头疼" })),
  )
  .await;
  assert_eq!(turn["reply"]["content"], "好的");
  assert_eq!(turn["title"], Value::Null);

  let (_, sessions) = send(&state, "GET", "/consult/sessions", Some(&token), None).await;
  assert_eq!(sessions[0]["title"], "发热咨询");
  assert_eq!(sessions[0]["title_state"], "summarized");

  let (_, messages) = send(
    &state,
    "GET",
    &format!("/consult/sessions/{session}/messages"),
    Some(&token),
    None,
  )
  .await;
  let roles: Vec<_> = messages
    .as_array()
    .unwrap()
    .iter()
    .map(|m| m["role"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(roles, ["assistant", "user", "assistant", "user", "assistant"]);

  // Each turn saw every committed message, oldest first, plus the new one.
  assert_eq!(
    *advisor.seen.lock().unwrap(),
    vec![
      vec![WELCOME_MESSAGE.to_owned(), "用户描述：发烧两天".to_owned()],
      vec![
        WELCOME_MESSAGE.to_owned(),
        "用户描述：发烧两天".to_owned(),
        "注意休息".to_owned(),
        "还是头疼".to_owned(),
      ],
    ]
  );
  // Only the first exchange is titled, from the text after the marker.
  assert_eq!(*advisor.snippets.lock().unwrap(), vec!["发烧两天".to_owned()]);

  let (_, advice) = send(
    &state,
    "GET",
    &format!("/advice?member_id={self_id}"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(advice.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn advisor_failure_falls_back() {
  let (state, _) = make_state().await;
  let (token, self_id) = login(&state).await;
  let session = open_session(&state, &token, &self_id).await;

  let (status, turn) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/chat"),
    Some(&token),
    Some(json!({ "content": "最近总是失眠而且白天很困怎么办" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(turn["reply"]["content"], CONVERSE_FALLBACK);
  assert_eq!(turn["title"], "最近总是失眠而且白天...");
  assert_eq!(turn["advice"], json!([]));
}

#[tokio::test]
async fn title_failure_after_good_reply_falls_back() {
  let (state, advisor) = make_state().await;
  let (token, self_id) = login(&state).await;
  let session = open_session(&state, &token, &self_id).await;

  advisor.reply(json!({ "reply": "多休息", "new_advice": ["早睡"] }).to_string());
  let (status, turn) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/chat"),
    Some(&token),
    Some(json!({ "content": "用户描述：最近总是失眠而且白天很困怎么办" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(turn["reply"]["content"], "多休息");
  assert_eq!(turn["advice"][0]["title"], "早睡");
  assert_eq!(turn["title"], "最近总是失眠而且白天...");
  assert_eq!(
    *advisor.snippets.lock().unwrap(),
    vec!["最近总是失眠而且白天很困怎么办".to_owned()]
  );

  let (_, sessions) = send(&state, "GET", "/consult/sessions", Some(&token), None).await;
  assert_eq!(sessions[0]["title"], "最近总是失眠而且白天...");
  assert_eq!(sessions[0]["title_state"], "summarized");
}

#[tokio::test]
async fn concurrent_turns_on_one_session_are_serialised() {
  let (state, advisor) = make_state().await;
  let (token, self_id) = login(&state).await;
  let session = open_session(&state, &token, &self_id).await;
  let uri = format!("/consult/sessions/{session}/chat");

  advisor.reply("第一条回复");
  advisor.reply("第二条回复");
  advisor.title("咨询");

  let (a, b) = tokio::join!(
    send(&state, "POST", &uri, Some(&token), Some(json!({ "content": "甲" }))),
    send(&state, "POST", &uri, Some(&token), Some(json!({ "content": "乙" }))),
  );
  assert_eq!(a.0, StatusCode::OK);
  assert_eq!(b.0, StatusCode::OK);

  // The second turn waited for the first to commit.
  assert_eq!(advisor.seen_lengths(), vec![2, 4]);

  let (_, messages) = send(
    &state,
    "GET",
    &format!("/consult/sessions/{session}/messages"),
    Some(&token),
    None,
  )
  .await;
  let messages = messages.as_array().unwrap();
  assert_eq!(messages.len(), 5);
  for (i, m) in messages.iter().enumerate() {
    let expected = if i % 2 == 0 { "assistant" } else { "user" };
    assert_eq!(m["role"], expected);
  }
  assert_eq!(messages[2]["content"], "第一条回复");
  assert_eq!(messages[4]["content"], "第二条回复");

  // Exactly one of the two turns titled the session.
  assert_eq!(
    [&a.1, &b.1].iter().filter(|t| !t["title"].is_null()).count(),
    1
  );
}

#[tokio::test]
async fn plaintext_reply_is_stored_verbatim() {
  let (state, advisor) = make_state().await;
  let (token, self_id) = login(&state).await;
  let session = open_session(&state, &token, &self_id).await;

  advisor.reply("这不是 JSON");
  advisor.title("咨询");
  let (_, turn) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/chat"),
    Some(&token),
    Some(json!({ "content": "你好" })),
  )
  .await;
  assert_eq!(turn["reply"]["content"], "这不是 JSON");
  assert_eq!(turn["tasks"], json!([]));
}

#[tokio::test]
async fn empty_chat_content_is_rejected() {
  let (state, _) = make_state().await;
  let (token, self_id) = login(&state).await;
  let session = open_session(&state, &token, &self_id).await;
  let (status, _) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/chat"),
    Some(&token),
    Some(json!({ "content": "   " })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_on_session_of_deleted_member_conflicts() {
  let (state, _) = make_state().await;
  let (token, _) = login(&state).await;
  let member = add_member(&state, &token, json!({ "name": "乙", "relation": "父亲" })).await;
  let session = open_session(&state, &token, &member).await;
  send(&state, "DELETE", &format!("/members/{member}"), Some(&token), None).await;

  let (status, _) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/chat"),
    Some(&token),
    Some(json!({ "content": "头疼" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn plan_ingests_without_writing_messages() {
  let (state, advisor) = make_state().await;
  let (token, self_id) = login(&state).await;
  let session = open_session(&state, &token, &self_id).await;

  advisor.reply(
    json!({ "reply": "计划如下", "new_advice": ["早睡"], "new_tasks": ["散步", 7] }).to_string(),
  );
  let (status, plan) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/plan"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(plan, json!({ "reply": "计划如下", "advice_created": 1, "tasks_created": 2 }));

  let (_, tasks) =
    send(&state, "GET", &format!("/tasks?member_id={self_id}"), Some(&token), None).await;
  let titles: Vec<_> = tasks
    .as_array()
    .unwrap()
    .iter()
    .map(|t| t["title"].as_str().unwrap().to_owned())
    .collect();
  assert!(titles.contains(&"散步".to_owned()));
  assert!(titles.contains(&"健康任务".to_owned()));

  let (_, messages) = send(
    &state,
    "GET",
    &format!("/consult/sessions/{session}/messages"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(messages.as_array().unwrap().len(), 1);

  // With nothing scripted the plan falls back and stores nothing.
  let (_, plan) = send(
    &state,
    "POST",
    &format!("/consult/sessions/{session}/plan"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(plan["reply"], PLAN_FALLBACK);
  assert_eq!(plan["advice_created"], 0);
}

#[tokio::test]
async fn deleting_session_removes_history() {
  let (state, _) = make_state().await;
  let (token, self_id) = login(&state).await;
  let session = open_session(&state, &token, &self_id).await;
  let uri = format!("/consult/sessions/{session}");

  let intruder = other_user(&state).await;
  let (status, _) = send(&state, "DELETE", &uri, Some(&intruder), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = send(&state, "DELETE", &uri, Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "ok": true }));

  let (status, _) =
    send(&state, "GET", &format!("{uri}/messages"), Some(&token), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(&state, "DELETE", &uri, Some(&token), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
