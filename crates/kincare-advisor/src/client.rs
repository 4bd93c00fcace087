//! Async HTTP client for an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use kincare_core::{
  advisor::{Advisor, AdvisorReply},
  consult::ChatTurn,
  member::Persona,
};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, prompt};

/// Connection settings for the advisory endpoint.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
  /// Endpoint root, e.g. `https://dashscope.aliyuncs.com/compatible-mode/v1`.
  pub base_url: String,
  api_key:      Secret<String>,
  pub model:    String,
  /// Client-side timeout for a single HTTP request.
  pub timeout:  Duration,
}

impl AdvisorConfig {
  pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      api_key:  Secret::new(api_key.into()),
      model:    "qwen-plus".to_owned(),
      timeout:  Duration::from_secs(60),
    }
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
  model:           &'a str,
  messages:        Vec<WireMessage<'a>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
  role:    &'a str,
  content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
  #[serde(default)]
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
  content: Option<String>,
}

/// Whether the endpoint should be held to a JSON object reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyMode {
  Json,
  Text,
}

fn build_request<'a>(
  model: &'a str,
  system: &'a str,
  history: &'a [ChatTurn],
  mode: ReplyMode,
) -> CompletionRequest<'a> {
  let mut messages = Vec::with_capacity(history.len() + 1);
  messages.push(WireMessage { role: "system", content: system });
  messages.extend(history.iter().map(|turn| WireMessage {
    role:    turn.role.as_str(),
    content: &turn.content,
  }));

  CompletionRequest {
    model,
    messages,
    response_format: match mode {
      ReplyMode::Json => Some(ResponseFormat { kind: "json_object" }),
      ReplyMode::Text => None,
    },
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// [`Advisor`] backed by a chat-completions endpoint.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpAdvisor {
  client: Client,
  config: AdvisorConfig,
}

impl HttpAdvisor {
  pub fn new(config: AdvisorConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn completions_url(&self) -> String {
    format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
  }

  /// Send one completion request and return the first choice's content.
  async fn complete(
    &self,
    system: &str,
    history: &[ChatTurn],
    mode: ReplyMode,
  ) -> Result<String> {
    let body = build_request(&self.config.model, system, history, mode);

    let resp = self
      .client
      .post(self.completions_url())
      .bearer_auth(self.config.api_key.expose_secret())
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
      return Err(Error::Status { status: status.as_u16(), body: text });
    }

    let parsed: CompletionResponse = serde_json::from_str(&text)?;
    let content = parsed
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .filter(|c| !c.trim().is_empty())
      .ok_or(Error::EmptyReply)?;

    tracing::debug!(model = %self.config.model, chars = content.chars().count(), "advisor replied");
    Ok(content)
  }
}

impl Advisor for HttpAdvisor {
  type Error = Error;

  async fn converse<'a>(
    &'a self,
    history: &'a [ChatTurn],
    persona: &'a Persona,
  ) -> Result<AdvisorReply> {
    let system = prompt::consult_prompt(persona);
    let raw = self.complete(&system, history, ReplyMode::Json).await?;
    Ok(AdvisorReply::decode(&raw))
  }

  async fn summarize_title<'a>(&'a self, snippet: &'a str) -> Result<String> {
    let history = [ChatTurn::user(snippet)];
    self.complete(prompt::TITLE_PROMPT, &history, ReplyMode::Text).await
  }

  async fn generate_plan<'a>(
    &'a self,
    history: &'a [ChatTurn],
    persona: &'a Persona,
  ) -> Result<AdvisorReply> {
    let system = prompt::plan_prompt(persona);
    let raw = self.complete(&system, history, ReplyMode::Json).await?;
    Ok(AdvisorReply::decode(&raw))
  }
}
