//! Error type for `kincare-advisor`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Transport failure, including the client-side request timeout.
  #[error("advisor request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("advisor returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("could not decode advisor response: {0}")]
  Decode(#[from] serde_json::Error),

  /// The response carried no choice, or a choice with no content.
  #[error("advisor returned an empty reply")]
  EmptyReply,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
