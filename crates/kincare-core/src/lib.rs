//! Core types and trait definitions for Kincare.
//!
//! This crate has no HTTP or database dependencies. It holds
//! the care domain (members, tag profiles, advice, tasks, consultations), the
//! risk engine, and the consultation orchestrator. Storage and the advisory
//! service are reached through the [`store::CareStore`] and
//! [`advisor::Advisor`] traits.

pub mod account;
pub mod advisor;
pub mod care;
pub mod completion;
pub mod consult;
pub mod error;
pub mod ingest;
pub mod member;
pub mod orchestrator;
pub mod profile;
pub mod risk;
pub mod store;
pub mod title;

pub use error::{Error, Result};
