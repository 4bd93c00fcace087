//! Kincare HTTP server assembly.
//!
//! Turns a [`ServerConfig`] into a running application: opens the SQLite
//! store, constructs the advisory client, and wraps the JSON API in CORS and
//! request-tracing layers.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::{Router, http::HeaderValue};
use kincare_advisor::{AdvisorConfig, HttpAdvisor};
use kincare_api::{AppState, TokenKeys};
use kincare_core::{
  advisor::Advisor, orchestrator::OrchestratorConfig, store::CareStore,
};
use kincare_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::{
  cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
  trace::TraceLayer,
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `KINCARE_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:            String,
  #[serde(default = "default_port")]
  pub port:            u16,
  #[serde(default = "default_store_path")]
  pub store_path:      PathBuf,
  pub jwt_secret:      String,
  #[serde(default = "default_token_ttl_hours")]
  pub token_ttl_hours: i64,
  #[serde(default = "default_cors_origins")]
  pub cors_origins:    Vec<String>,
  #[serde(default = "default_true")]
  pub dev_login:       bool,
  pub advisor:         AdvisorSettings,
}

/// The `[advisor]` table.
#[derive(Deserialize, Clone)]
pub struct AdvisorSettings {
  #[serde(default = "default_advisor_base_url")]
  pub base_url:             String,
  pub api_key:              String,
  #[serde(default = "default_advisor_model")]
  pub model:                String,
  /// Per HTTP request.
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
  /// Upper bound on each advisor call made while handling a request.
  #[serde(default = "default_turn_timeout_secs")]
  pub turn_timeout_secs:    u64,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8000 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/kincare/kincare.db") }
fn default_token_ttl_hours() -> i64 { 72 }
fn default_true() -> bool { true }

fn default_cors_origins() -> Vec<String> {
  vec!["http://localhost:5173".to_owned(), "http://127.0.0.1:5173".to_owned()]
}

fn default_advisor_base_url() -> String {
  "https://dashscope.aliyuncs.com/compatible-mode/v1".to_owned()
}
fn default_advisor_model() -> String { "qwen-plus".to_owned() }
fn default_request_timeout_secs() -> u64 { 60 }
fn default_turn_timeout_secs() -> u64 { 90 }

/// Load configuration from `path` (optional) overlaid with environment
/// variables such as `KINCARE_PORT` or `KINCARE_ADVISOR__API_KEY`.
pub fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("KINCARE")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("cors_origins")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

/// Open the store and construct every collaborator named by `cfg`.
pub async fn build_state(
  cfg: &ServerConfig,
) -> anyhow::Result<AppState<SqliteStore, HttpAdvisor>> {
  let store_path = expand_tilde(&cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let advisor = HttpAdvisor::new(
    AdvisorConfig::new(&cfg.advisor.base_url, &cfg.advisor.api_key)
      .with_model(&cfg.advisor.model)
      .with_timeout(Duration::from_secs(cfg.advisor.request_timeout_secs)),
  )
  .context("failed to build advisor client")?;

  let orchestrator = OrchestratorConfig {
    advisor_timeout: Duration::from_secs(cfg.advisor.turn_timeout_secs),
  };
  let tokens = TokenKeys::new(
    cfg.jwt_secret.as_bytes(),
    chrono::Duration::hours(cfg.token_ttl_hours),
    cfg.dev_login,
  );

  tracing::info!(path = ?store_path, model = %cfg.advisor.model, "store and advisor ready");
  Ok(AppState::new(Arc::new(store), Arc::new(advisor), orchestrator, tokens))
}

/// Mount the API under `/api` with CORS for `cors_origins` and request
/// tracing.
pub fn router<S, A>(state: AppState<S, A>, cors_origins: &[String]) -> anyhow::Result<Router>
where
  S: CareStore + 'static,
  A: Advisor + 'static,
{
  let origins = cors_origins
    .iter()
    .map(|o| {
      o.parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS origin {o:?}"))
    })
    .collect::<anyhow::Result<Vec<_>>>()?;

  let cors = CorsLayer::new()
    .allow_origin(AllowOrigin::list(origins))
    .allow_methods(AllowMethods::mirror_request())
    .allow_headers(AllowHeaders::mirror_request())
    .allow_credentials(true);

  Ok(
    Router::new()
      .nest("/api", kincare_api::api_router(state))
      .layer(cors)
      .layer(TraceLayer::new_for_http()),
  )
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use tower::ServiceExt as _;

  const MINIMAL: &str = r#"
    jwt_secret = "s3cret"

    [advisor]
    api_key = "sk-test"
  "#;

  fn parse(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  async fn app() -> Router {
    let mut cfg = parse(MINIMAL);
    cfg.store_path = PathBuf::from(":memory:");
    cfg.advisor.base_url = "http://127.0.0.1:9".into();
    let state = build_state(&cfg).await.unwrap();
    router(state, &cfg.cors_origins).unwrap()
  }

  #[test]
  fn minimal_config_takes_defaults() {
    let cfg = parse(MINIMAL);
    assert_eq!(cfg.port, 8000);
    assert_eq!(cfg.token_ttl_hours, 72);
    assert!(cfg.dev_login);
    assert_eq!(cfg.cors_origins, default_cors_origins());
    assert_eq!(cfg.advisor.model, "qwen-plus");
    assert_eq!(cfg.advisor.turn_timeout_secs, 90);
  }

  #[test]
  fn tilde_is_expanded() {
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(
        expand_tilde(Path::new("~/kincare.db")),
        PathBuf::from(home).join("kincare.db")
      );
    }
    assert_eq!(expand_tilde(Path::new("/tmp/k.db")), PathBuf::from("/tmp/k.db"));
  }

  #[tokio::test]
  async fn bad_cors_origin_is_rejected() {
    let mut cfg = parse(MINIMAL);
    cfg.store_path = PathBuf::from(":memory:");
    let state = build_state(&cfg).await.unwrap();
    assert!(router(state, &["bad\norigin".to_owned()]).is_err());
  }

  #[tokio::test]
  async fn health_is_served_under_api() {
    let resp = app()
      .await
      .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn cors_preflight_allows_dev_origin() {
    let req = Request::builder()
      .method("OPTIONS")
      .uri("/api/members")
      .header(header::ORIGIN, "http://localhost:5173")
      .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
      .body(Body::empty())
      .unwrap();
    let resp = app().await.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
      "http://localhost:5173"
    );
  }

  #[tokio::test]
  async fn cors_ignores_unknown_origin() {
    let req = Request::get("/api/health")
      .header(header::ORIGIN, "http://evil.example")
      .body(Body::empty())
      .unwrap();
    let resp = app().await.oneshot(req).await.unwrap();
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
  }
}
