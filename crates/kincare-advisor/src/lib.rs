//! `HttpAdvisor` — the [`Advisor`](kincare_core::advisor::Advisor)
//! implementation that talks to an OpenAI-compatible chat-completions
//! endpoint.
//!
//! The system prompts live in [`prompt`]; everything about the wire format
//! lives in [`client`].

pub mod client;
pub mod error;
pub mod prompt;

pub use client::{AdvisorConfig, HttpAdvisor};
pub use error::{Error, Result};
