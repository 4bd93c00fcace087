//! JSON REST API for Kincare.
//!
//! Exposes an axum [`Router`] backed by any
//! [`CareStore`](kincare_core::store::CareStore) and
//! [`Advisor`](kincare_core::advisor::Advisor). TLS, CORS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", kincare_api::api_router(state))
//! ```

pub mod account;
pub mod advice;
pub mod auth;
pub mod consult;
pub mod error;
pub mod members;
pub mod tasks;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use kincare_core::{
  advisor::Advisor,
  orchestrator::{ConsultOrchestrator, OrchestratorConfig},
  store::CareStore,
};

pub use auth::{CurrentUser, TokenKeys};
pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, A> {
  pub store:   Arc<S>,
  pub consult: Arc<ConsultOrchestrator<S, A>>,
  pub tokens:  Arc<TokenKeys>,
}

impl<S, A> Clone for AppState<S, A> {
  fn clone(&self) -> Self {
    Self {
      store:   self.store.clone(),
      consult: self.consult.clone(),
      tokens:  self.tokens.clone(),
    }
  }
}

impl<S, A> AppState<S, A>
where
  S: CareStore,
  A: Advisor,
{
  pub fn new(
    store: Arc<S>,
    advisor: Arc<A>,
    config: OrchestratorConfig,
    tokens: TokenKeys,
  ) -> Self {
    let consult = ConsultOrchestrator::new(store.clone(), advisor, config);
    Self { store, consult: Arc::new(consult), tokens: Arc::new(tokens) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, A>(state: AppState<S, A>) -> Router<()>
where
  S: CareStore + 'static,
  A: Advisor + 'static,
{
  Router::new()
    // Account
    .route("/health", get(account::health))
    .route("/auth/dev", post(account::dev_login::<S, A>))
    .route("/me", get(account::me::<S, A>).put(account::update_me::<S, A>))
    // Members
    .route("/members", get(members::list::<S, A>).post(members::create::<S, A>))
    .route(
      "/members/{id}",
      put(members::update::<S, A>).delete(members::delete_one::<S, A>),
    )
    // Advice
    .route("/advice", get(advice::list::<S, A>).post(advice::create::<S, A>))
    .route("/advice/{id}", get(advice::get_one::<S, A>))
    // Tasks
    .route("/tasks", get(tasks::list::<S, A>).post(tasks::create::<S, A>))
    .route("/tasks/{id}", get(tasks::get_one::<S, A>))
    .route("/tasks/{id}/complete", post(tasks::complete::<S, A>))
    // Consultations
    .route(
      "/consult/sessions",
      get(consult::list::<S, A>).post(consult::create::<S, A>),
    )
    .route("/consult/sessions/{id}", delete(consult::delete_one::<S, A>))
    .route("/consult/sessions/{id}/messages", get(consult::messages::<S, A>))
    .route("/consult/sessions/{id}/chat", post(consult::chat::<S, A>))
    .route("/consult/sessions/{id}/plan", post(consult::plan::<S, A>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
